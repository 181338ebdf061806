//! Windows process control: `sysinfo` for existence, `taskkill` for stops.

use std::io;
use std::process::{Command, Stdio};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::{Delivery, ProcessControl};

/// `taskkill` exit code for "process not found".
const TASKKILL_NOT_FOUND: i32 = 128;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProcessControl;

fn taskkill(pid: u32, force: bool) -> io::Result<Delivery> {
    let mut command = Command::new("taskkill");
    if force {
        command.arg("/F");
    }
    let status = command
        .args(["/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    match status.code() {
        Some(0) => Ok(Delivery::Sent),
        Some(TASKKILL_NOT_FOUND) => Ok(Delivery::NoSuchProcess),
        other => Err(io::Error::other(format!(
            "taskkill for pid {pid} exited with {other:?}"
        ))),
    }
}

impl ProcessControl for WindowsProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system.process(target).is_some()
    }

    fn request_stop(&self, pid: u32) -> io::Result<Delivery> {
        taskkill(pid, false)
    }

    fn force_kill(&self, pid: u32) -> io::Result<Delivery> {
        taskkill(pid, true)
    }
}
