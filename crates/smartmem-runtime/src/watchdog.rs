//! Watchdog: tears the server down when the host that launched it is gone.
//!
//! Runs as its own OS process (the hidden `smartmem watchdog` subcommand) so
//! it keeps working after the host crashes or is force-quit. The loop checks
//! the parent first, then the server:
//!
//! - parent gone: terminate the server, clear its PID entry, exit
//! - server gone: nothing left to guard, exit
//! - SIGTERM/SIGINT to the watchdog itself: same cleanup as parent loss

use std::sync::Arc;

use anyhow::Context;
use smartmem_core::config::{SERVER_PID_FILE, WATCHDOG_PID_FILE};
use smartmem_core::{ReasonCode, WatchdogHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::launch::WatchdogSpec;
use crate::os::{ProcessControl, platform_control};
use crate::pidfile::PidRegistry;
use crate::reconcile::{ListenerSource, PortReconciler, platform_listeners};
use crate::server_signals::{ServerSignals, SignalEvent};
use crate::shutdown::{Termination, TerminationEscalator};

/// Why the watchdog loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Parent vanished; the server was torn down.
    ParentLost(Termination),
    /// Server exited on its own or was stopped by someone else.
    ServerGone,
    /// Asked to stop; the server was torn down if still alive.
    Cancelled(Option<Termination>),
}

#[derive(Debug)]
pub struct Watchdog {
    spec: WatchdogSpec,
    control: Arc<dyn ProcessControl>,
    escalator: TerminationEscalator,
    server_registry: PidRegistry,
}

impl Watchdog {
    pub fn new(
        spec: WatchdogSpec,
        control: Arc<dyn ProcessControl>,
        listeners: Arc<dyn ListenerSource>,
    ) -> Self {
        let reconciler = PortReconciler::new(listeners, Arc::clone(&control));
        let escalator = TerminationEscalator::new(
            Arc::clone(&control),
            reconciler,
            spec.host.clone(),
            spec.port,
            spec.server_binary_name.clone(),
        );
        let server_registry =
            PidRegistry::new(spec.data_dir.join(SERVER_PID_FILE), Arc::clone(&control));

        Self {
            spec,
            control,
            escalator,
            server_registry,
        }
    }

    pub const fn spec(&self) -> &WatchdogSpec {
        &self.spec
    }

    /// Poll until the parent or the server disappears, or `cancel` fires.
    ///
    /// The first check runs immediately, so a parent that died during
    /// startup is noticed within one poll interval.
    pub async fn run(&self, cancel: CancellationToken) -> WatchdogExit {
        let WatchdogSpec {
            parent_pid,
            server_pid,
            poll_interval,
            ..
        } = self.spec;
        info!(parent_pid, server_pid, "Watchdog monitoring every {poll_interval:?}");

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(server_pid, "Watchdog asked to stop");
                    let outcome = if self.control.is_alive(server_pid) {
                        Some(self.teardown().await)
                    } else {
                        None
                    };
                    return WatchdogExit::Cancelled(outcome);
                }
                _ = ticker.tick() => {}
            }

            if !self.control.is_alive(parent_pid) {
                warn!(
                    reason = %ReasonCode::WatchdogParentLost,
                    parent_pid,
                    server_pid,
                    "Parent process gone, tearing down server"
                );
                return WatchdogExit::ParentLost(self.teardown().await);
            }

            if !self.control.is_alive(server_pid) {
                info!(server_pid, "Server no longer running, watchdog exiting");
                self.clear_server_entry();
                return WatchdogExit::ServerGone;
            }

            debug!(parent_pid, server_pid, "Parent and server alive");
        }
    }

    /// Terminate the server and drop its PID entry if it is still ours.
    pub async fn teardown(&self) -> Termination {
        let outcome = self
            .escalator
            .terminate(
                self.spec.server_pid,
                self.spec.grace_period,
                self.spec.force_timeout,
            )
            .await;

        match &outcome {
            Termination::Terminated { forced } => {
                info!(server_pid = self.spec.server_pid, forced, "Server terminated");
            }
            Termination::Failed(failure) => {
                error!(
                    reason = %ReasonCode::KillFailed,
                    server_pid = self.spec.server_pid,
                    "Teardown failed: {failure}"
                );
            }
        }
        if !self.control.is_alive(self.spec.server_pid) {
            self.clear_server_entry();
        }
        outcome
    }

    fn clear_server_entry(&self) {
        match self.server_registry.clear_if(self.spec.server_pid) {
            Ok(true) => debug!(server_pid = self.spec.server_pid, "Server PID entry cleared"),
            Ok(false) => {}
            Err(e) => warn!("Failed to clear server PID file: {e}"),
        }
    }
}

/// Entry point of the watchdog process.
///
/// Installs signal handlers, runs the loop and removes its own PID entry on
/// the way out.
pub async fn run_watchdog_process(spec: WatchdogSpec) -> anyhow::Result<WatchdogExit> {
    let control = platform_control();
    let own_registry = PidRegistry::new(spec.data_dir.join(WATCHDOG_PID_FILE), control.clone());
    let handle = WatchdogHandle {
        watchdog_pid: std::process::id(),
        monitored_parent_pid: spec.parent_pid,
        monitored_server_pid: spec.server_pid,
    };

    let mut signals = ServerSignals::install().context("Failed to install signal handlers")?;
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        loop {
            match signals.recv().await {
                SignalEvent::Shutdown => {
                    signal_cancel.cancel();
                    return;
                }
                // Detached from any terminal; nothing to reload.
                event => debug!(?event, "Watchdog ignoring signal"),
            }
        }
    });

    let watchdog = Watchdog::new(spec, control, platform_listeners());
    let exit = watchdog.run(cancel).await;
    signal_task.abort();

    if let Err(e) = own_registry.clear_if(handle.watchdog_pid) {
        warn!("Failed to clear watchdog PID file: {e}");
    }
    info!(?handle, ?exit, "Watchdog finished");
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::Delivery;
    use std::collections::HashSet;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct SimControl {
        alive: Mutex<HashSet<u32>>,
        stops: Mutex<Vec<u32>>,
    }

    impl SimControl {
        fn with(pids: &[u32]) -> Arc<Self> {
            Arc::new(Self {
                alive: Mutex::new(pids.iter().copied().collect()),
                stops: Mutex::default(),
            })
        }
        fn exit(&self, pid: u32) {
            self.alive.lock().unwrap().remove(&pid);
        }
    }

    impl ProcessControl for SimControl {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }
        fn request_stop(&self, pid: u32) -> io::Result<Delivery> {
            self.stops.lock().unwrap().push(pid);
            Ok(if self.alive.lock().unwrap().remove(&pid) {
                Delivery::Sent
            } else {
                Delivery::NoSuchProcess
            })
        }
        fn force_kill(&self, pid: u32) -> io::Result<Delivery> {
            self.request_stop(pid)
        }
        fn command_line(&self, _pid: u32) -> Option<String> {
            None
        }
    }

    #[derive(Debug)]
    struct NoListeners;

    impl ListenerSource for NoListeners {
        fn listening_pids(&self, _port: u16) -> io::Result<Vec<u32>> {
            Ok(Vec::new())
        }
    }

    const PARENT: u32 = 100;
    const SERVER: u32 = 200;

    fn spec(data_dir: &Path, port: u16) -> WatchdogSpec {
        WatchdogSpec {
            parent_pid: PARENT,
            server_pid: SERVER,
            host: "127.0.0.1".to_string(),
            port,
            poll_interval: Duration::from_millis(50),
            grace_period: Duration::from_millis(200),
            force_timeout: Duration::from_millis(200),
            data_dir: data_dir.to_path_buf(),
            server_binary_name: "smart-memory-server".to_string(),
        }
    }

    async fn free_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        listener.local_addr().expect("addr").port()
    }

    #[tokio::test]
    async fn parent_loss_tears_down_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = SimControl::with(&[PARENT, SERVER]);
        let watchdog = Watchdog::new(
            spec(dir.path(), free_port().await),
            control.clone(),
            Arc::new(NoListeners),
        );
        std::fs::write(dir.path().join(SERVER_PID_FILE), format!("{SERVER}\n")).expect("write");

        let started = Instant::now();
        let cancel = CancellationToken::new();
        let killer = {
            let control = control.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                control.exit(PARENT);
            })
        };

        let exit = watchdog.run(cancel).await;
        killer.await.expect("join");

        assert_eq!(
            exit,
            WatchdogExit::ParentLost(Termination::Terminated { forced: false })
        );
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!control.is_alive(SERVER));
        assert!(!dir.path().join(SERVER_PID_FILE).exists());
    }

    #[tokio::test]
    async fn server_exit_ends_watch_without_signals() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = SimControl::with(&[PARENT]);
        let watchdog = Watchdog::new(
            spec(dir.path(), free_port().await),
            control.clone(),
            Arc::new(NoListeners),
        );

        let exit = watchdog.run(CancellationToken::new()).await;
        assert_eq!(exit, WatchdogExit::ServerGone);
        assert!(control.stops.lock().unwrap().is_empty());
        assert!(control.is_alive(PARENT));
    }

    #[tokio::test]
    async fn cancellation_performs_cleanup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = SimControl::with(&[PARENT, SERVER]);
        let watchdog = Watchdog::new(
            spec(dir.path(), free_port().await),
            control.clone(),
            Arc::new(NoListeners),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let exit = watchdog.run(cancel).await;

        assert_eq!(
            exit,
            WatchdogExit::Cancelled(Some(Termination::Terminated { forced: false }))
        );
        assert_eq!(*control.stops.lock().unwrap(), vec![SERVER]);
    }

    #[tokio::test]
    async fn newer_server_entry_is_left_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = SimControl::with(&[PARENT, SERVER, 300]);
        let watchdog = Watchdog::new(
            spec(dir.path(), free_port().await),
            control.clone(),
            Arc::new(NoListeners),
        );
        std::fs::write(dir.path().join(SERVER_PID_FILE), "300\n").expect("write");

        control.exit(PARENT);
        let exit = watchdog.run(CancellationToken::new()).await;

        assert!(matches!(exit, WatchdogExit::ParentLost(_)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(SERVER_PID_FILE)).expect("read"),
            "300\n"
        );
    }
}
