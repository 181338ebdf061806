//! Locator port: where the server binary, its config and its data live.
//!
//! The supervisor never guesses paths itself. Hosts inject a locator; the
//! CLI uses [`crate::paths::DefaultLocator`].

use std::path::PathBuf;

use thiserror::Error;

use crate::paths::PathError;

/// Failure to resolve one of the server paths.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No candidate location held an executable server binary.
    #[error("Server binary not found (searched: {})", display_paths(.searched))]
    BinaryNotFound { searched: Vec<PathBuf> },

    #[error(transparent)]
    Path(#[from] PathError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves server paths on demand.
///
/// Implementations may touch the filesystem (e.g. create the data directory)
/// but must not spawn anything.
#[cfg_attr(test, mockall::automock)]
pub trait Locator: Send + Sync {
    /// Server executable. Existence is checked again before every spawn.
    fn binary_path(&self) -> Result<PathBuf, LocateError>;

    /// Config file shared by server and supervisor.
    fn config_path(&self) -> Result<PathBuf, LocateError>;

    /// Directory for PID files, ledger, logs and the database.
    fn data_dir(&self) -> Result<PathBuf, LocateError>;

    /// Database handed to the server via `DB_PATH`.
    fn database_path(&self) -> Result<PathBuf, LocateError> {
        Ok(self.data_dir()?.join("memories.db"))
    }
}
