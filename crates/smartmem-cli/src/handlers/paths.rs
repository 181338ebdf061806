//! Paths command handler.
//!
//! Prints every path the supervisor would use, in `key = value` form. A path
//! that cannot be resolved is shown with the reason instead of aborting, so
//! this works as a diagnostic when `start` fails with `BINARY_NOT_FOUND`.

use std::fmt::Write as _;
use std::path::PathBuf;

use smartmem_core::{LocateError, Locator, SupervisorConfig};

use crate::error::CliError;

pub fn execute(locator: &dyn Locator) -> Result<(), CliError> {
    print!("{}", render(locator));
    Ok(())
}

fn render(locator: &dyn Locator) -> String {
    let mut out = String::new();
    let mut line = |key: &str, value: Result<PathBuf, LocateError>| {
        let shown = match value {
            Ok(path) => path.display().to_string(),
            Err(e) => format!("<unresolved: {e}>"),
        };
        let _ = writeln!(out, "{key:<10} = {shown}");
    };

    line("binary", locator.binary_path());
    line("config", locator.config_path());
    line("database", locator.database_path());
    match locator.data_dir() {
        Ok(dir) => {
            let config = SupervisorConfig::new(dir.clone());
            line("data_dir", Ok(dir));
            line("pid_file", Ok(config.server_pid_file()));
            line("watchdog", Ok(config.watchdog_pid_file()));
            line("ledger", Ok(config.recovery_state_file()));
            line("log", Ok(config.server_log_file()));
        }
        Err(e) => line("data_dir", Err(e)),
    }
    out
}
