//! SIGTERM -> grace period -> SIGKILL -> port release confirmation.

use std::sync::Arc;
use std::time::Duration;

use smartmem_core::{Liveness, PortBinding};
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::liveness;
use crate::os::{Delivery, ProcessControl};
use crate::reconcile::PortReconciler;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of [`TerminationEscalator::terminate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process is gone and the port is released.
    Terminated {
        /// Whether SIGKILL (or the platform equivalent) was needed.
        forced: bool,
    },
    Failed(EscalationFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationFailure {
    /// The OS refused the kill request.
    #[error("could not signal pid {pid}: {message}")]
    Signal { pid: u32, message: String },
    /// Still in the process table after the forced kill.
    #[error("pid {pid} still alive {waited:?} after forced kill")]
    StillAlive { pid: u32, waited: Duration },
    /// The process is gone but something unrecognized now owns the port.
    #[error("port taken over by unrelated {0}")]
    PortHeldByForeign(PortBinding),
    /// The port stayed bound after the extra forced kill.
    #[error("port {port} still bound{}", by_owner(.owner))]
    PortStillBound { port: u16, owner: Option<PortBinding> },
}

fn by_owner(owner: &Option<PortBinding>) -> String {
    owner
        .as_ref()
        .map(|owner| format!(" by {owner}"))
        .unwrap_or_default()
}

/// Drives termination of one PID and confirms the configured port is free.
#[derive(Debug, Clone)]
pub struct TerminationEscalator {
    control: Arc<dyn ProcessControl>,
    reconciler: PortReconciler,
    host: String,
    port: u16,
    expected_binary_name: String,
}

impl TerminationEscalator {
    pub fn new(
        control: Arc<dyn ProcessControl>,
        reconciler: PortReconciler,
        host: impl Into<String>,
        port: u16,
        expected_binary_name: impl Into<String>,
    ) -> Self {
        Self {
            control,
            reconciler,
            host: host.into(),
            port,
            expected_binary_name: expected_binary_name.into(),
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Terminate `pid`.
    ///
    /// # Strategy
    /// 1. Polite stop request, then poll for exit up to `grace`
    /// 2. Forced kill, then poll for exit up to `force_timeout`
    /// 3. Whatever happened above, re-check the port. A managed owner (or
    ///    `pid` itself) gets one more forced kill; a foreign owner is never
    ///    touched and fails the termination.
    ///
    /// Waits are plain timeouts. A sent signal cannot be taken back.
    pub async fn terminate(&self, pid: u32, grace: Duration, force_timeout: Duration) -> Termination {
        let mut forced = false;

        if self.control.is_alive(pid) {
            forced = match self.stop_process(pid, grace, force_timeout).await {
                Ok(forced) => forced,
                Err(failure) => return Termination::Failed(failure),
            };
        } else {
            debug!(pid, "Process already gone, checking port only");
        }

        match self.confirm_port_released(pid, force_timeout).await {
            Ok(extra_kill) => Termination::Terminated {
                forced: forced || extra_kill,
            },
            Err(failure) => Termination::Failed(failure),
        }
    }

    /// Phases 1 and 2 only: `pid` is gone afterwards, whoever holds the port.
    /// Returns whether the forced kill was needed.
    pub async fn stop_process(
        &self,
        pid: u32,
        grace: Duration,
        force_timeout: Duration,
    ) -> Result<bool, EscalationFailure> {
        match self.control.request_stop(pid) {
            Ok(Delivery::NoSuchProcess) => return Ok(false),
            Ok(Delivery::Sent) => {
                debug!(pid, "Stop requested, waiting up to {grace:?}");
                if self.wait_for_exit(pid, grace).await {
                    info!(pid, "Process exited gracefully");
                    return Ok(false);
                }
                warn!(pid, "Process ignored stop request for {grace:?}, forcing");
            }
            // Fall through to the forced kill rather than give up
            Err(e) => warn!(pid, "Stop request failed: {e}"),
        }

        match self.control.force_kill(pid) {
            Ok(Delivery::NoSuchProcess) => return Ok(true),
            Ok(Delivery::Sent) => {}
            Err(e) => {
                return Err(EscalationFailure::Signal {
                    pid,
                    message: e.to_string(),
                });
            }
        }

        if self.wait_for_exit(pid, force_timeout).await {
            info!(pid, "Process exited after forced kill");
            Ok(true)
        } else {
            Err(EscalationFailure::StillAlive {
                pid,
                waited: force_timeout,
            })
        }
    }

    /// Phase 3. Returns whether an extra forced kill was sent.
    async fn confirm_port_released(
        &self,
        pid: u32,
        window: Duration,
    ) -> Result<bool, EscalationFailure> {
        if self.port_is_free().await {
            return Ok(false);
        }

        let extra_kill = self.force_release_port(Some(pid))?;

        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            if self.port_is_free().await {
                return Ok(extra_kill);
            }
            sleep(POLL_INTERVAL).await;
        }

        if self.port_is_free().await {
            return Ok(extra_kill);
        }
        Err(EscalationFailure::PortStillBound {
            port: self.port,
            owner: self.reconciler.find_owners(self.port).into_iter().next(),
        })
    }

    /// Force-kill every current listener that is `pid` or a managed server.
    ///
    /// A foreign owner aborts before anything is signalled. Returns whether a
    /// kill was sent.
    pub fn force_release_port(&self, pid: Option<u32>) -> Result<bool, EscalationFailure> {
        let owners = self.reconciler.find_owners(self.port);
        if let Some(foreign) = owners.iter().find(|owner| {
            Some(owner.owner_pid) != pid
                && !PortReconciler::is_managed_server(owner, &self.expected_binary_name)
        }) {
            warn!(port = self.port, owner = %foreign, "Port owned by an unrelated process");
            return Err(EscalationFailure::PortHeldByForeign(foreign.clone()));
        }

        for owner in &owners {
            info!(port = self.port, %owner, "Port still held by managed server, forcing");
            if let Err(e) = self.control.force_kill(owner.owner_pid) {
                warn!(pid = owner.owner_pid, "Forced kill of port owner failed: {e}");
            }
        }
        Ok(!owners.is_empty())
    }

    /// Nothing listens: the probe is refused and no LISTEN entry remains.
    pub async fn port_is_free(&self) -> bool {
        liveness::probe(&self.host, self.port, Duration::from_millis(250)).await
            == Liveness::Unbound
            && self.reconciler.find_owners(self.port).is_empty()
    }

    async fn wait_for_exit(&self, pid: u32, window: Duration) -> bool {
        let deadline = Instant::now() + window;
        loop {
            if !self.control.is_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}
