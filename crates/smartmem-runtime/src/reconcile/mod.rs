//! Port reconciliation: who is listening on the configured port?
//!
//! Listener enumeration differs per platform and sits behind
//! [`ListenerSource`]. [`PortReconciler`] turns raw PIDs into
//! [`PortBinding`]s and decides whether an owner is our server.

mod lsof;
mod netstat;
mod procfs;

use std::fmt;
use std::io;
use std::sync::Arc;

use smartmem_core::PortBinding;
use tracing::{debug, warn};

use crate::os::ProcessControl;

pub use lsof::LsofListeners;
pub use netstat::NetstatListeners;
pub use procfs::ProcfsListeners;

/// Enumerates PIDs holding a TCP listener on a port.
pub trait ListenerSource: Send + Sync + fmt::Debug {
    fn listening_pids(&self, port: u16) -> io::Result<Vec<u32>>;
}

/// The listener source for the platform this binary was built for.
pub fn platform_listeners() -> Arc<dyn ListenerSource> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(ProcfsListeners)
    }

    #[cfg(windows)]
    {
        Arc::new(NetstatListeners)
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    {
        Arc::new(LsofListeners)
    }
}

#[derive(Debug, Clone)]
pub struct PortReconciler {
    listeners: Arc<dyn ListenerSource>,
    control: Arc<dyn ProcessControl>,
}

impl PortReconciler {
    pub fn new(listeners: Arc<dyn ListenerSource>, control: Arc<dyn ProcessControl>) -> Self {
        Self { listeners, control }
    }

    /// Current listeners on `port`, one binding per distinct PID.
    ///
    /// Enumeration failures are logged and reported as "no owners"; callers
    /// always pair this with a liveness probe, which still sees the port.
    pub fn find_owners(&self, port: u16) -> Vec<PortBinding> {
        let mut pids = match self.listeners.listening_pids(port) {
            Ok(pids) => pids,
            Err(e) => {
                warn!(port, "Failed to enumerate listeners: {e}");
                return Vec::new();
            }
        };
        pids.sort_unstable();
        pids.dedup();

        let owners: Vec<PortBinding> = pids
            .into_iter()
            .map(|pid| PortBinding {
                port,
                owner_pid: pid,
                command_line: self.control.command_line(pid).unwrap_or_default(),
            })
            .collect();

        debug!(port, owners = owners.len(), "Port owners resolved");
        owners
    }

    /// Whether `binding` looks like our server.
    ///
    /// This is a heuristic: the owner's command line is searched for
    /// `expected_binary_name`. An unrelated process with a coincidentally
    /// matching name is misclassified, and an owner whose command line is
    /// unreadable is never recognized.
    pub fn is_managed_server(binding: &PortBinding, expected_binary_name: &str) -> bool {
        !expected_binary_name.is_empty() && binding.command_line.contains(expected_binary_name)
    }
}
