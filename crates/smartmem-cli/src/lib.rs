//! `smartmem`: command-line supervisor for the smart-memory server.
//!
//! The binary is a thin adapter over [`smartmem_runtime::ProcessSupervisor`].
//! It also hosts the hidden `watchdog` subcommand that the supervisor
//! launches next to every server it starts on behalf of a host process.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

// Used by the binary entry points only.
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, WatchdogArgs};
pub use error::CliError;
pub use parser::Cli;
