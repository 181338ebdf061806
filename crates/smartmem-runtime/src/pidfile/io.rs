//! Atomic PID file I/O.
//!
//! Format: a single decimal integer, optionally followed by a newline.
//! No lock is taken; writes go through a temp file and a rename so readers
//! never observe a half-written value.

use std::fs;
use std::io;
use std::path::Path;

/// Write `pid` to `path` atomically using temp file + rename.
pub fn write_pid(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = Path::new(&temp);

    fs::write(temp, format!("{pid}\n"))?;
    fs::rename(temp, path)
}

/// Read the raw file. `Ok(None)` when the file does not exist.
pub fn read_raw(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse file content into a PID. Zero is never a valid entry.
pub fn parse_pid(content: &str) -> Option<u32> {
    content
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0)
}

/// Delete the file (idempotent - no error if missing).
pub fn delete_pid(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
