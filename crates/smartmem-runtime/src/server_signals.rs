//! Signal contract of long-running smartmem processes.
//!
//! | Signal            | Event             |
//! |-------------------|-------------------|
//! | SIGINT, SIGTERM   | `Shutdown`        |
//! | SIGHUP            | `Reload`          |
//! | SIGQUIT           | `DumpDiagnostics` |
//! | Windows console events (Ctrl-C, Ctrl-Break, close, shutdown) | `Shutdown` |
//!
//! The server and the watchdog both listen through [`ServerSignals`]. The
//! server additionally watches the PID in `SMARTMEM_PARENT_PID` through
//! [`ParentMonitor`]; that monitor and the external watchdog act
//! independently, and either may win.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::launch::PARENT_PID_ENV;
use crate::os::ProcessControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    /// Re-read configuration, keep serving.
    Reload,
    /// Log internal state, keep serving.
    DumpDiagnostics,
}

#[cfg(unix)]
pub struct ServerSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ServerSignals {
    /// Install handlers. Must be called inside a tokio runtime.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Next delivered signal.
    pub async fn recv(&mut self) -> SignalEvent {
        let event = tokio::select! {
            _ = self.interrupt.recv() => SignalEvent::Shutdown,
            _ = self.terminate.recv() => SignalEvent::Shutdown,
            _ = self.hangup.recv() => SignalEvent::Reload,
            _ = self.quit.recv() => SignalEvent::DumpDiagnostics,
        };
        debug!(?event, "Signal received");
        event
    }
}

#[cfg(windows)]
pub struct ServerSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
    ctrl_break: tokio::signal::windows::CtrlBreak,
    ctrl_close: tokio::signal::windows::CtrlClose,
    ctrl_shutdown: tokio::signal::windows::CtrlShutdown,
}

#[cfg(windows)]
impl ServerSignals {
    /// Install handlers. Must be called inside a tokio runtime.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::windows;

        Ok(Self {
            ctrl_c: windows::ctrl_c()?,
            ctrl_break: windows::ctrl_break()?,
            ctrl_close: windows::ctrl_close()?,
            ctrl_shutdown: windows::ctrl_shutdown()?,
        })
    }

    /// Next delivered console event. Every event means shutdown.
    pub async fn recv(&mut self) -> SignalEvent {
        tokio::select! {
            _ = self.ctrl_c.recv() => {}
            _ = self.ctrl_break.recv() => {}
            _ = self.ctrl_close.recv() => {}
            _ = self.ctrl_shutdown.recv() => {}
        }
        debug!("Console control event received");
        SignalEvent::Shutdown
    }
}

/// Watches the host process named by `SMARTMEM_PARENT_PID`.
#[derive(Debug, Clone)]
pub struct ParentMonitor {
    parent_pid: u32,
    control: Arc<dyn ProcessControl>,
    interval: Duration,
}

impl ParentMonitor {
    pub fn new(parent_pid: u32, control: Arc<dyn ProcessControl>, interval: Duration) -> Self {
        Self {
            parent_pid,
            control,
            interval,
        }
    }

    /// Monitor from the environment; `None` when the variable is unset or invalid.
    pub fn from_env(control: Arc<dyn ProcessControl>, interval: Duration) -> Option<Self> {
        let raw = std::env::var(PARENT_PID_ENV).ok()?;
        let pid = raw.trim().parse::<u32>().ok().filter(|pid| *pid != 0)?;
        Some(Self::new(pid, control, interval))
    }

    pub const fn parent_pid(&self) -> u32 {
        self.parent_pid
    }

    /// Resolves once the parent is no longer in the process table.
    pub async fn parent_exited(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if !self.control.is_alive(self.parent_pid) {
                info!(parent_pid = self.parent_pid, "Parent process exited");
                return;
            }
        }
    }
}
