//! Stop command handler.

use smartmem_runtime::StopOutcome;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    match ctx.supervisor.stop().await? {
        StopOutcome::Stopped { pid, forced: false } => println!("Server stopped (pid {pid})"),
        StopOutcome::Stopped { pid, forced: true } => {
            println!("Server stopped (pid {pid}, killed after the grace period)");
        }
        StopOutcome::NotRunning => println!("Server is not running"),
    }
    Ok(())
}
