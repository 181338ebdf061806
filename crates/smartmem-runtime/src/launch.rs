//! Spawning the server and its watchdog as detached processes.
//!
//! Both children are placed in their own process group (Unix) or a new
//! process group without a console (Windows), so a Ctrl-C delivered to the
//! host's terminal does not reach them and they can outlive the host.

use std::ffi::OsString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use smartmem_core::SupervisorError;
use tokio::process::Command;
use tracing::{debug, info};

/// Variable carrying the host PID into the server's own parent monitor.
pub const PARENT_PID_ENV: &str = "SMARTMEM_PARENT_PID";

/// Everything needed to start one server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
    /// stdout and stderr are appended here.
    pub log_file: PathBuf,
}

impl LaunchSpec {
    /// Server launch with the standard environment contract.
    pub fn server(
        binary: &Path,
        config_path: &Path,
        database_path: &Path,
        log_level: &str,
        parent_pid: Option<u32>,
        log_file: PathBuf,
    ) -> Self {
        let mut env = vec![
            ("DB_PATH".to_string(), database_path.as_os_str().to_owned()),
            ("CONFIG_PATH".to_string(), config_path.as_os_str().to_owned()),
            ("RUST_LOG".to_string(), OsString::from(log_level)),
        ];
        if let Some(pid) = parent_pid {
            env.push((PARENT_PID_ENV.to_string(), OsString::from(pid.to_string())));
        }

        Self {
            program: binary.to_path_buf(),
            args: Vec::new(),
            env,
            log_file,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Parameters of a watchdog process.
///
/// Serialized to command-line arguments for the hidden `watchdog`
/// subcommand of the `smartmem` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogSpec {
    pub parent_pid: u32,
    pub server_pid: u32,
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub grace_period: Duration,
    pub force_timeout: Duration,
    pub data_dir: PathBuf,
    /// Name used to recognize a managed server on the port.
    pub server_binary_name: String,
}

impl WatchdogSpec {
    /// Arguments after the program name.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["watchdog".into()];
        let mut push = |flag: &str, value: OsString| {
            args.push(flag.into());
            args.push(value);
        };
        push("--parent-pid", self.parent_pid.to_string().into());
        push("--server-pid", self.server_pid.to_string().into());
        push("--host", self.host.clone().into());
        push("--port", self.port.to_string().into());
        push(
            "--poll-interval-ms",
            millis(self.poll_interval).to_string().into(),
        );
        push("--grace-ms", millis(self.grace_period).to_string().into());
        push(
            "--force-timeout-ms",
            millis(self.force_timeout).to_string().into(),
        );
        push("--state-dir", self.data_dir.as_os_str().to_owned());
        push("--server-binary-name", self.server_binary_name.clone().into());
        args
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Starts processes for the supervisor.
pub trait Launcher: Send + Sync + fmt::Debug {
    /// Spawn the server; returns its PID.
    fn spawn_server(&self, spec: &LaunchSpec) -> Result<u32, SupervisorError>;

    /// Spawn the watchdog; returns its PID.
    fn spawn_watchdog(&self, spec: &WatchdogSpec) -> Result<u32, SupervisorError>;
}

/// Launches real detached OS processes.
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    /// Program hosting the `watchdog` subcommand.
    watchdog_program: PathBuf,
    watchdog_log: PathBuf,
}

impl DetachedLauncher {
    pub fn new(watchdog_program: impl Into<PathBuf>, watchdog_log: impl Into<PathBuf>) -> Self {
        Self {
            watchdog_program: watchdog_program.into(),
            watchdog_log: watchdog_log.into(),
        }
    }
}

impl Launcher for DetachedLauncher {
    fn spawn_server(&self, spec: &LaunchSpec) -> Result<u32, SupervisorError> {
        if !spec.program.is_file() {
            return Err(SupervisorError::BinaryNotFound {
                path: spec.program.clone(),
            });
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let pid = spawn_detached(cmd, &spec.program, &spec.log_file)?;
        info!(pid, program = %spec.program.display(), "Server spawned");
        Ok(pid)
    }

    fn spawn_watchdog(&self, spec: &WatchdogSpec) -> Result<u32, SupervisorError> {
        let mut cmd = Command::new(&self.watchdog_program);
        cmd.args(spec.to_args());
        // The watchdog must not inherit a parent marker meant for the server.
        cmd.env_remove(PARENT_PID_ENV);

        let pid = spawn_detached(cmd, &self.watchdog_program, &self.watchdog_log)?;
        info!(
            pid,
            parent_pid = spec.parent_pid,
            server_pid = spec.server_pid,
            "Watchdog spawned"
        );
        Ok(pid)
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Spawn `cmd` detached with output appended to `log`.
///
/// A background task waits on the child so that, while this process lives,
/// an exited child is reaped instead of lingering as a zombie.
fn spawn_detached(mut cmd: Command, program: &Path, log: &Path) -> Result<u32, SupervisorError> {
    let spawn_err = |source| SupervisorError::Spawn {
        program: program.to_path_buf(),
        source,
    };

    let stdout = open_log(log).map_err(spawn_err)?;
    let stderr = stdout.try_clone().map_err(spawn_err)?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(false);

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let mut child = cmd.spawn().map_err(spawn_err)?;
    let pid = child.id().ok_or_else(|| {
        spawn_err(std::io::Error::other("child exited before its pid was read"))
    })?;

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(pid, %status, "Detached child exited"),
            Err(e) => debug!(pid, "Waiting on detached child failed: {e}"),
        }
    });

    Ok(pid)
}
