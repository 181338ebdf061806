//! CLI error type and exit-code mapping.
//!
//! Supervisor failures keep their stable reason code so scripts can match on
//! `error[CODE]` in stderr as well as on the exit code.

use smartmem_core::{ReasonCode, SupervisorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// A supervisor operation failed.
    #[error("error[{code}]: {message}")]
    Supervisor { code: ReasonCode, message: String },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Exit codes follow sysexits.h where one fits:
    /// - 1: General failure (unresponsive server, exhausted recovery)
    /// - 69: Port held by another program (`EX_UNAVAILABLE`)
    /// - 70: Internal failure, including a failed spawn (`EX_SOFTWARE`)
    /// - 71: Could not terminate the server (`EX_OSERR`)
    /// - 72: Server binary missing (`EX_OSFILE`)
    /// - 74: IO error (`EX_IOERR`)
    /// - 78: Bad configuration (`EX_CONFIG`)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Supervisor { code, .. } => match code {
                ReasonCode::BinaryNotFound => 72,
                ReasonCode::PortInUseByOther => 69,
                ReasonCode::KillFailed => 71,
                ReasonCode::Internal => 70,
                _ => 1,
            },
            Self::Config(_) => 78,
            Self::Io(_) => 74,
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Config(e) => Self::Config(e.to_string()),
            other => Self::Supervisor {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
