//! Hidden `watchdog` subcommand.
//!
//! Runs in its own detached process, spawned by the supervisor after a
//! successful start. Never bootstraps a supervisor: everything it needs is
//! on its command line.

use smartmem_core::ReasonCode;
use smartmem_runtime::{WatchdogExit, run_watchdog_process};
use tracing::info;

use crate::commands::WatchdogArgs;
use crate::error::CliError;

pub async fn execute(args: WatchdogArgs) -> Result<(), CliError> {
    let exit = run_watchdog_process(args.into_spec())
        .await
        .map_err(|e| CliError::Supervisor {
            code: ReasonCode::Internal,
            message: format!("{e:#}"),
        })?;

    match exit {
        WatchdogExit::ParentLost(termination) => {
            info!(?termination, "Watchdog exiting after parent loss");
        }
        WatchdogExit::ServerGone => info!("Watchdog exiting; server is gone"),
        WatchdogExit::Cancelled(_) => info!("Watchdog cancelled"),
    }
    Ok(())
}
