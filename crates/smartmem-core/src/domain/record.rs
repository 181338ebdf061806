//! Records describing a managed server instance and the OS facts around it.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed server instance.
///
/// Created only by a successful start (or by adopting a recognised server
/// already bound to the configured port). Never mutated: a different PID
/// means a different record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// OS process id of the server.
    pub pid: u32,
    /// Port the server answered on when the record was committed.
    pub bound_port: u16,
    /// Server executable.
    pub binary_path: PathBuf,
    /// Config file handed to the server via `CONFIG_PATH`.
    pub config_path: PathBuf,
    /// Data location handed to the server via `DB_PATH`.
    pub data_path: PathBuf,
    /// When the supervisor first confirmed the server.
    pub started_at: DateTime<Utc>,
}

impl ProcessRecord {
    pub fn new(
        pid: u32,
        bound_port: u16,
        binary_path: PathBuf,
        config_path: PathBuf,
        data_path: PathBuf,
    ) -> Self {
        Self {
            pid,
            bound_port,
            binary_path,
            config_path,
            data_path,
            started_at: Utc::now(),
        }
    }

    /// Seconds since the record was committed.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

/// A listener found on a port, derived from OS queries. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub port: u16,
    pub owner_pid: u32,
    /// Full command line of the owner, empty when the OS refused to tell us.
    pub command_line: String,
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.command_line.is_empty() {
            write!(f, "pid {} on port {}", self.owner_pid, self.port)
        } else {
            write!(
                f,
                "pid {} ({}) on port {}",
                self.owner_pid, self.command_line, self.port
            )
        }
    }
}

/// Identifies the watchdog paired with a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogHandle {
    pub watchdog_pid: u32,
    pub monitored_parent_pid: u32,
    pub monitored_server_pid: u32,
}
