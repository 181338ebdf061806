//! macOS / BSD listener lookup through `lsof`.

use std::io;
use std::process::{Command, Stdio};

use super::ListenerSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct LsofListeners;

impl ListenerSource for LsofListeners {
    fn listening_pids(&self, port: u16) -> io::Result<Vec<u32>> {
        let output = Command::new("lsof")
            .args(["-nP", &format!("-iTCP:{port}"), "-sTCP:LISTEN", "-t"])
            .stderr(Stdio::null())
            .output()?;

        // lsof exits 1 with empty output when nothing matches
        if !output.status.success() && !output.stdout.is_empty() {
            return Err(io::Error::other(format!(
                "lsof exited with {}",
                output.status
            )));
        }
        Ok(parse_lsof_pids(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// `lsof -t` prints one PID per line.
pub(crate) fn parse_lsof_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
