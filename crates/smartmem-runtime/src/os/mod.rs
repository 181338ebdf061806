//! OS process control.
//!
//! Everything that differs between platforms when talking to another process
//! (existence checks, polite stop, forced kill) sits behind [`ProcessControl`].
//! [`platform_control`] picks the implementation once at startup.

use std::fmt;
use std::io;
use std::sync::Arc;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::PosixProcessControl;
#[cfg(windows)]
pub use windows::WindowsProcessControl;

/// Outcome of delivering a stop/kill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The target was already gone.
    NoSuchProcess,
}

/// Platform process operations used by the registry, reconciler and escalator.
pub trait ProcessControl: Send + Sync + fmt::Debug {
    /// Whether `pid` is present in the OS process table. Zombies count as dead.
    fn is_alive(&self, pid: u32) -> bool;

    /// Polite stop: SIGTERM on Unix, a close request on Windows.
    fn request_stop(&self, pid: u32) -> io::Result<Delivery>;

    /// Forced termination: SIGKILL / `taskkill /F`.
    fn force_kill(&self, pid: u32) -> io::Result<Delivery>;

    /// Full command line of `pid`, if the OS lets us read it.
    fn command_line(&self, pid: u32) -> Option<String> {
        sysinfo_command_line(pid)
    }
}

/// The implementation for the platform this binary was built for.
pub fn platform_control() -> Arc<dyn ProcessControl> {
    #[cfg(unix)]
    {
        Arc::new(PosixProcessControl)
    }

    #[cfg(windows)]
    {
        Arc::new(WindowsProcessControl)
    }
}

/// Read a process command line through `sysinfo`.
///
/// Falls back to the executable path and then the process name when the
/// argument vector is not readable (other users' processes on macOS).
pub fn sysinfo_command_line(pid: u32) -> Option<String> {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::Always)
            .with_exe(UpdateKind::Always),
    );

    let process = system.process(target)?;
    let args: Vec<String> = process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    if !args.is_empty() {
        return Some(args.join(" "));
    }
    if let Some(exe) = process.exe() {
        return Some(exe.display().to_string());
    }
    Some(process.name().to_string_lossy().into_owned())
}
