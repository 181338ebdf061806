//! Graceful-then-forceful termination of the supervised server.
//!
//! The escalator works from a bare PID: the server usually outlives the
//! process that spawned it, so no `Child` handle is available for reaping.

mod escalator;

pub use escalator::{EscalationFailure, Termination, TerminationEscalator};
