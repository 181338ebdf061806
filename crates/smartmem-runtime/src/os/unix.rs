//! POSIX signal-based process control.

use std::io;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use super::{Delivery, ProcessControl};

#[derive(Debug, Clone, Copy, Default)]
pub struct PosixProcessControl;

/// Convert to a nix PID, refusing values `kill(2)` treats as groups.
fn target(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}

fn send(pid: u32, sig: Signal) -> io::Result<Delivery> {
    let Some(nix_pid) = target(pid) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    };

    match signal::kill(nix_pid, sig) {
        Ok(()) => Ok(Delivery::Sent),
        Err(Errno::ESRCH) => Ok(Delivery::NoSuchProcess),
        Err(e) => Err(io::Error::other(e)),
    }
}

/// `/proc/<pid>/stat` state is `Z` (zombie) or `X` (dead).
#[cfg(target_os = "linux")]
fn is_defunct(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The command name may contain spaces and parens; the state follows the last ')'.
    stat.rfind(')')
        .and_then(|idx| stat[idx + 1..].trim_start().chars().next())
        .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(not(target_os = "linux"))]
fn is_defunct(_pid: u32) -> bool {
    false
}

impl ProcessControl for PosixProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(nix_pid) = target(pid) else {
            return false;
        };

        // Signal None is the null signal: existence check only
        match signal::kill(nix_pid, None) {
            Ok(()) => !is_defunct(pid),
            Err(Errno::ESRCH) => false,
            Err(_) => true, // exists but we lack permission
        }
    }

    fn request_stop(&self, pid: u32) -> io::Result<Delivery> {
        send(pid, Signal::SIGTERM)
    }

    fn force_kill(&self, pid: u32) -> io::Result<Delivery> {
        send(pid, Signal::SIGKILL)
    }
}
