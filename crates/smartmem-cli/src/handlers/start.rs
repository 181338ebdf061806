//! Start command handler.

use smartmem_runtime::StartOutcome;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    match ctx.supervisor.start().await? {
        StartOutcome::Started(record) => {
            println!(
                "Server started (pid {}, port {})",
                record.pid,
                ctx.supervisor.config().server.port
            );
            if let Some(handle) = ctx.supervisor.watchdog().await {
                println!(
                    "Watchdog {} is tied to host pid {}",
                    handle.watchdog_pid, handle.monitored_parent_pid
                );
            }
        }
        StartOutcome::AlreadyRunning(record) => {
            println!("Server already running (pid {})", record.pid);
        }
    }
    Ok(())
}
