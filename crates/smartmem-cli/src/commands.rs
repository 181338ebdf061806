//! Subcommands of the `smartmem` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use smartmem_runtime::WatchdogSpec;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the server, or confirm the one already running
    Start,

    /// Stop the server and its watchdog
    Stop,

    /// Stop the server, wait for the port, start it again
    Restart,

    /// Report server state; exits 0 when running, 1 when stopped, 2 when crashed
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the server up, restarting it after crashes when recovery is enabled
    Monitor {
        /// Seconds between health checks
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },

    /// Show resolved paths for the binary, config, data directory and database
    Paths,

    /// Internal: run the orphan watchdog (spawned by `start`)
    #[command(hide = true)]
    Watchdog(WatchdogArgs),
}

/// Argument contract of the watchdog process.
///
/// Must stay in step with [`WatchdogSpec::to_args`].
#[derive(Debug, Clone, Args)]
pub struct WatchdogArgs {
    #[arg(long)]
    pub parent_pid: u32,
    #[arg(long)]
    pub server_pid: u32,
    #[arg(long)]
    pub host: String,
    #[arg(long)]
    pub port: u16,
    #[arg(long)]
    pub poll_interval_ms: u64,
    #[arg(long)]
    pub grace_ms: u64,
    #[arg(long)]
    pub force_timeout_ms: u64,
    #[arg(long = "state-dir")]
    pub data_dir: PathBuf,
    #[arg(long)]
    pub server_binary_name: String,
}

impl WatchdogArgs {
    pub fn into_spec(self) -> WatchdogSpec {
        WatchdogSpec {
            parent_pid: self.parent_pid,
            server_pid: self.server_pid,
            host: self.host,
            port: self.port,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            grace_period: Duration::from_millis(self.grace_ms),
            force_timeout: Duration::from_millis(self.force_timeout_ms),
            data_dir: self.data_dir,
            server_binary_name: self.server_binary_name,
        }
    }
}
