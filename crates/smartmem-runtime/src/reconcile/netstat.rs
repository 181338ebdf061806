//! Windows listener lookup through `netstat -ano`.

use std::io;
use std::process::{Command, Stdio};

use super::ListenerSource;

#[derive(Debug, Clone, Copy, Default)]
pub struct NetstatListeners;

impl ListenerSource for NetstatListeners {
    fn listening_pids(&self, port: u16) -> io::Result<Vec<u32>> {
        let output = Command::new("netstat")
            .args(["-ano", "-p", "TCP"])
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "netstat exited with {}",
                output.status
            )));
        }
        Ok(parse_netstat_listeners(
            &String::from_utf8_lossy(&output.stdout),
            port,
        ))
    }
}

/// Rows look like `TCP  127.0.0.1:50051  0.0.0.0:0  LISTENING  1234`.
pub(crate) fn parse_netstat_listeners(stdout: &str, port: u16) -> Vec<u32> {
    let suffix = format!(":{port}");
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [proto, local, _remote, state, pid]
                    if proto.eq_ignore_ascii_case("TCP")
                        && state.eq_ignore_ascii_case("LISTENING")
                        && local.ends_with(&suffix) =>
                {
                    pid.parse().ok()
                }
                _ => None,
            }
        })
        .collect()
}
