//! Results reported by supervisor operations.

use std::fmt;

use serde::Serialize;
use smartmem_core::{Liveness, PortBinding, ProcessRecord, SupervisionState};

/// Snapshot produced by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub state: SupervisionState,
    /// PID of the managed server, when one exists.
    pub pid: Option<u32>,
    pub liveness: Liveness,
    pub port: u16,
    pub record: Option<ProcessRecord>,
    /// Listener on the port that is not ours.
    pub foreign_owner: Option<PortBinding>,
}

impl ServerStatus {
    pub const fn is_running(&self) -> bool {
        matches!(self.state, SupervisionState::Running)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.state, self.pid) {
            (SupervisionState::Running, Some(pid)) => {
                write!(f, "running (pid {pid}, port {}, {})", self.port, self.liveness)
            }
            (state, _) => {
                write!(f, "{state}")?;
                if let Some(owner) = &self.foreign_owner {
                    write!(f, "; port held by {owner}")?;
                } else if self.liveness.is_bound() {
                    write!(f, "; port {} held by an unknown process", self.port)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new server was spawned and confirmed responsive.
    Started(ProcessRecord),
    /// A responsive managed server already existed; nothing was spawned.
    AlreadyRunning(ProcessRecord),
}

impl StartOutcome {
    pub const fn record(&self) -> &ProcessRecord {
        match self {
            Self::Started(record) | Self::AlreadyRunning(record) => record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32, forced: bool },
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub previous_pid: Option<u32>,
    pub record: ProcessRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Nothing crashed, or recovery is disabled.
    Idle(ServerStatus),
    /// An automatic restart brought the server back.
    Recovered { attempt: u32, record: ProcessRecord },
}
