//! Command handlers.
//!
//! Handlers are thin: call the supervisor, format the outcome for the
//! terminal, map failures to [`crate::CliError`]. Progress and diagnostics go
//! to stderr through `tracing`; results go to stdout.

pub mod monitor;
pub mod paths;
pub mod restart;
pub mod start;
pub mod status;
pub mod stop;
pub mod watchdog;
