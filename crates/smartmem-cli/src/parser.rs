//! Root CLI parser and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Supervise the local smart-memory server.
///
/// Global options override the locator's environment lookup
/// (`SMARTMEM_DATA_DIR`, `SMARTMEM_CONFIG`, `SMARTMEM_SERVER_BIN`).
#[derive(Parser)]
#[command(name = "smartmem")]
#[command(about = "Start, stop and inspect the smart-memory server")]
#[command(version)]
pub struct Cli {
    /// Directory holding PID files, logs and the recovery ledger
    #[arg(long = "data-dir", global = true, env = "SMARTMEM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Config file shared with the server
    #[arg(long = "config", global = true, env = "SMARTMEM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server executable to launch
    #[arg(long = "server-bin", global = true, env = "SMARTMEM_SERVER_BIN")]
    pub server_bin: Option<PathBuf>,

    /// Host process the server must not outlive; enables the watchdog
    #[arg(long = "host-pid", global = true, env = "SMARTMEM_HOST_PID")]
    pub host_pid: Option<u32>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
