//! PID file management for the supervised server and its watchdog.
//!
//! # Guarantees
//! - Atomic writes via temp file + rename
//! - Every read is cross-checked against the OS process table
//! - Stale or malformed entries are removed by the read that finds them

mod io;
mod registry;

pub use io::{delete_pid, parse_pid, write_pid};
pub use registry::{Healed, PidLookup, PidRegistry};
