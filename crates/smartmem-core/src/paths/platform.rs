//! Platform-specific default locations.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::PathError;

/// Directory name under the home directory holding all server state.
pub const DATA_DIR_NAME: &str = ".smart-memory";

/// File name of the server executable (without platform suffix).
pub const SERVER_BINARY_NAME: &str = "smart-memory-server";

/// Get the root directory for server data.
///
/// Resolution order:
/// 1. `SMARTMEM_DATA_DIR` environment variable (highest priority)
/// 2. `~/.smart-memory`
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var("SMARTMEM_DATA_DIR") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Create `dir` if missing; fail if something else sits there.
pub fn ensure_dir(dir: &Path) -> Result<(), PathError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(PathError::NotADirectory(dir.to_path_buf()));
        }
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|e| PathError::CreateFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Platform file name of the server binary.
pub fn server_binary_file_name() -> String {
    format!("{SERVER_BINARY_NAME}{}", env::consts::EXE_SUFFIX)
}

/// `<dir of current exe>/<server binary>`.
pub fn sibling_server_binary() -> Result<PathBuf, PathError> {
    let exe = env::current_exe().map_err(|e| PathError::CurrentExe(e.to_string()))?;
    let dir = exe
        .parent()
        .ok_or_else(|| PathError::CurrentExe(format!("{} has no parent", exe.display())))?;
    Ok(dir.join(server_binary_file_name()))
}
