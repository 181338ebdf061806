//! Self-healing PID registry.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use smartmem_core::ReasonCode;
use tracing::{debug, info, warn};

use super::io::{delete_pid, parse_pid, read_raw, write_pid};
use crate::os::ProcessControl;

/// What the file on disk says, cross-checked against the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidLookup {
    /// File names a process that exists.
    Live(u32),
    /// File exists but names a dead process, or could not be parsed (`None`).
    Stale(Option<u32>),
    /// No file.
    Absent,
}

/// Result of a healing read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Healed {
    Live(u32),
    /// A stale entry was removed; carries the dead PID when it was readable.
    Repaired(Option<u32>),
    Absent,
}

impl Healed {
    pub const fn live(self) -> Option<u32> {
        match self {
            Self::Live(pid) => Some(pid),
            Self::Repaired(_) | Self::Absent => None,
        }
    }
}

/// A single-PID file that never reports a dead PID as trusted.
///
/// The file carries no lock. Concurrent writers (the supervisor, a watchdog,
/// a second host) converge through idempotent reads and compare-and-clear,
/// not through mutual exclusion.
#[derive(Debug, Clone)]
pub struct PidRegistry {
    path: PathBuf,
    control: Arc<dyn ProcessControl>,
}

impl PidRegistry {
    pub fn new(path: impl Into<PathBuf>, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            path: path.into(),
            control,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look without touching anything.
    pub fn inspect(&self) -> PidLookup {
        let raw = match read_raw(&self.path) {
            Ok(Some(raw)) => raw,
            Ok(None) => return PidLookup::Absent,
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read PID file: {e}");
                return PidLookup::Absent;
            }
        };

        match parse_pid(&raw) {
            Some(pid) if self.control.is_alive(pid) => PidLookup::Live(pid),
            Some(pid) => PidLookup::Stale(Some(pid)),
            None => PidLookup::Stale(None),
        }
    }

    /// Inspect and remove a stale entry.
    pub fn heal(&self) -> Healed {
        match self.inspect() {
            PidLookup::Live(pid) => Healed::Live(pid),
            PidLookup::Absent => Healed::Absent,
            PidLookup::Stale(stale) => {
                if let Err(e) = delete_pid(&self.path) {
                    warn!(path = %self.path.display(), "Failed to remove stale PID file: {e}");
                }
                info!(
                    reason = %ReasonCode::StalePidFileRepaired,
                    stale_pid = ?stale,
                    path = %self.path.display(),
                    "Removed stale PID file"
                );
                Healed::Repaired(stale)
            }
        }
    }

    /// The live PID, if any. Stale entries are cleared on the way.
    pub fn read(&self) -> Option<u32> {
        self.heal().live()
    }

    pub fn write(&self, pid: u32) -> io::Result<()> {
        write_pid(&self.path, pid)?;
        debug!(pid, path = %self.path.display(), "PID file written");
        Ok(())
    }

    pub fn clear(&self) -> io::Result<()> {
        delete_pid(&self.path)
    }

    /// Clear only if the file still names `pid`. Returns whether it did.
    pub fn clear_if(&self, pid: u32) -> io::Result<bool> {
        let current = read_raw(&self.path)?.as_deref().and_then(parse_pid);
        if current == Some(pid) {
            delete_pid(&self.path)?;
            return Ok(true);
        }
        debug!(
            pid,
            current = ?current,
            "PID file belongs to a different process, leaving it"
        );
        Ok(false)
    }
}
