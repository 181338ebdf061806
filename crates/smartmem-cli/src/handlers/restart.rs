//! Restart command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let outcome = ctx.supervisor.restart().await?;
    match outcome.previous_pid {
        Some(old) => println!("Server restarted (pid {old} -> {})", outcome.record.pid),
        None => println!("Server started (pid {})", outcome.record.pid),
    }
    Ok(())
}
