//! Status command handler.
//!
//! Exit status mirrors the supervision state so scripts can branch on it
//! without parsing output.

use smartmem_core::SupervisionState;
use smartmem_runtime::ServerStatus;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Exit code for a status snapshot: 0 running, 2 crashed, 1 otherwise.
pub const fn exit_code(status: &ServerStatus) -> i32 {
    match status.state {
        SupervisionState::Running => 0,
        SupervisionState::Crashed => 2,
        _ => 1,
    }
}

/// Print the status and return the exit code for it.
pub async fn execute(ctx: &CliContext, json: bool) -> Result<i32, CliError> {
    let status = ctx.supervisor.status().await;

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| CliError::Io(format!("Failed to encode status: {e}")))?;
        println!("{rendered}");
    } else {
        println!("Server {status}");
        if let Some(record) = &status.record {
            println!("  started: {}", record.started_at.to_rfc3339());
        }
    }

    Ok(exit_code(&status))
}
