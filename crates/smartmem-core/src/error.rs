//! Supervisor error taxonomy and stable reason codes.
//!
//! Every failure the supervisor surfaces, and every informational event it
//! logs, carries a [`ReasonCode`]. Codes are stable strings so hosts can match
//! on them without parsing messages.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{InvalidTransition, PortBinding};
use crate::ports::LocateError;

/// Stable identifiers for errors and informational events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    BinaryNotFound,
    PortInUseByOther,
    ProcessUnresponsive,
    KillFailed,
    /// Informational: a PID file pointed at a dead process and was removed.
    StalePidFileRepaired,
    /// Informational: the watchdog saw its parent vanish and tore down.
    WatchdogParentLost,
    /// Informational: a server the supervisor believed alive disappeared.
    CrashDetected,
    RecoveryExhausted,
    Internal,
}

impl ReasonCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BinaryNotFound => "BINARY_NOT_FOUND",
            Self::PortInUseByOther => "PORT_IN_USE_BY_OTHER",
            Self::ProcessUnresponsive => "PROCESS_UNRESPONSIVE",
            Self::KillFailed => "KILL_FAILED",
            Self::StalePidFileRepaired => "STALE_PID_FILE_REPAIRED",
            Self::WatchdogParentLost => "WATCHDOG_PARENT_LOST",
            Self::CrashDetected => "CRASH_DETECTED",
            Self::RecoveryExhausted => "RECOVERY_EXHAUSTED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Informational codes are logged, never returned as failures.
    pub const fn is_informational(self) -> bool {
        matches!(
            self,
            Self::StalePidFileRepaired | Self::WatchdogParentLost | Self::CrashDetected
        )
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures surfaced by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The located server binary does not exist. Nothing was spawned.
    #[error("Server binary not found at {}", .path.display())]
    BinaryNotFound { path: PathBuf },

    /// A process we do not recognise owns the configured port.
    #[error(
        "Port {port} is in use by another process{}; stop it or change server.port",
        owner_suffix(.owner)
    )]
    PortInUseByOther {
        port: u16,
        owner: Option<PortBinding>,
    },

    /// The server did not answer on its port within the allowed window.
    #[error("Server (pid {pid}) did not become responsive on port {port} within {waited_ms}ms")]
    ProcessUnresponsive { pid: u32, port: u16, waited_ms: u64 },

    /// Escalation ran out of options without confirmed exit and port release.
    #[error("Failed to terminate server (pid {pid}): {reason}")]
    KillFailed { pid: u32, reason: String },

    /// Automatic restarts hit the configured bound. Needs an explicit start.
    #[error(
        "Server crashed and {attempts} automatic restart attempt(s) failed; run start to retry"
    )]
    RecoveryExhausted { attempts: u32 },

    #[error("Failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn owner_suffix(owner: &Option<PortBinding>) -> String {
    owner
        .as_ref()
        .map(|binding| format!(" (pid {}: {})", binding.owner_pid, binding.command_line))
        .unwrap_or_default()
}

impl SupervisorError {
    pub fn code(&self) -> ReasonCode {
        match self {
            Self::BinaryNotFound { .. } => ReasonCode::BinaryNotFound,
            Self::Locate(LocateError::BinaryNotFound { .. }) => ReasonCode::BinaryNotFound,
            Self::PortInUseByOther { .. } => ReasonCode::PortInUseByOther,
            Self::ProcessUnresponsive { .. } => ReasonCode::ProcessUnresponsive,
            Self::KillFailed { .. } => ReasonCode::KillFailed,
            Self::RecoveryExhausted { .. } => ReasonCode::RecoveryExhausted,
            Self::Spawn { .. }
            | Self::Locate(_)
            | Self::Config(_)
            | Self::Transition(_)
            | Self::Io(_) => ReasonCode::Internal,
        }
    }
}
