//! Supervisor configuration.
//!
//! The supervisor reads the same JSON file the server reads. Only the
//! `server`, `recovery` and `supervisor` sections matter here; every other
//! key belongs to the server and is ignored. All keys are optional.
//!
//! ```json
//! {
//!   "server":   { "host": "127.0.0.1", "port": 50051,
//!                 "shutdown_timeout_seconds": 30, "force_kill_timeout_seconds": 10 },
//!   "recovery": { "enabled": false, "max_restart_attempts": 3, "restart_delay_seconds": 5 },
//!   "supervisor": { "startup_grace_ms": 2000, "watchdog_poll_interval_ms": 5000 }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default RPC port of the server.
pub const DEFAULT_SERVER_PORT: u16 = 50051;

/// Default bind host of the server.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// File name of the server PID registry inside the data directory.
pub const SERVER_PID_FILE: &str = "server.pid";

/// File name of the watchdog PID registry inside the data directory.
pub const WATCHDOG_PID_FILE: &str = "watchdog.pid";

/// File name of the crash-recovery ledger inside the data directory.
pub const RECOVERY_STATE_FILE: &str = "recovery.json";

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// The `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Grace period between the polite stop request and the forced kill.
    pub shutdown_timeout_seconds: u64,
    /// How long to wait for exit after the forced kill.
    pub force_kill_timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_seconds: 30,
            force_kill_timeout_seconds: 10,
        }
    }
}

impl ServerSettings {
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub const fn force_timeout(&self) -> Duration {
        Duration::from_secs(self.force_kill_timeout_seconds)
    }
}

/// The `recovery` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub enabled: bool,
    pub max_restart_attempts: u32,
    pub restart_delay_seconds: u64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_restart_attempts: 3,
            restart_delay_seconds: 5,
        }
    }
}

impl RecoverySettings {
    pub const fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_seconds)
    }
}

/// The `supervisor` section: knobs that only the supervisor reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorTuning {
    /// Window after spawn in which the server must become responsive.
    pub startup_grace_ms: u64,
    /// Probe timeout for interactive checks (`status`, idempotent `start`).
    pub probe_timeout_ms: u64,
    /// Probe timeout used while confirming a fresh spawn.
    pub confirm_probe_timeout_ms: u64,
    pub watchdog_enabled: bool,
    pub watchdog_poll_interval_ms: u64,
    /// Extra arguments appended to the server command line.
    pub server_args: Vec<String>,
}

impl Default for SupervisorTuning {
    fn default() -> Self {
        Self {
            startup_grace_ms: 2000,
            probe_timeout_ms: 1000,
            confirm_probe_timeout_ms: 5000,
            watchdog_enabled: true,
            watchdog_poll_interval_ms: 5000,
            server_args: Vec::new(),
        }
    }
}

/// On-disk shape of the config file (supervisor-relevant part only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub recovery: RecoverySettings,
    pub supervisor: SupervisorTuning,
}

impl ConfigFile {
    /// Load from disk. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file missing, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(contents)
    }
}

/// Everything the supervisor needs, injected at construction.
///
/// Two supervisors built from different configs never share state, which is
/// what lets tests run several side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub server: ServerSettings,
    pub recovery: RecoverySettings,
    pub tuning: SupervisorTuning,
    /// Directory holding PID files, the recovery ledger and logs.
    pub data_dir: PathBuf,
    /// PID the watchdog should monitor. `None` disables the watchdog.
    pub parent_pid: Option<u32>,
    /// Log filter handed to the server via `RUST_LOG`.
    pub server_log_level: String,
    /// Program used to run the watchdog; defaults to the current executable.
    pub watchdog_program: Option<PathBuf>,
}

impl SupervisorConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::from_file(ConfigFile::default(), data_dir)
    }

    pub fn from_file(file: ConfigFile, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: file.server,
            recovery: file.recovery,
            tuning: file.supervisor,
            data_dir: data_dir.into(),
            parent_pid: None,
            server_log_level: "info".to_string(),
            watchdog_program: None,
        }
    }

    /// Load `config_path` and bind the result to `data_dir`.
    pub fn load(config_path: &Path, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::from_file(ConfigFile::load(config_path)?, data_dir);
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn with_parent_pid(mut self, pid: Option<u32>) -> Self {
        self.parent_pid = pid;
        self
    }

    #[must_use]
    pub fn with_watchdog_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.watchdog_program = Some(program.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(
                "server.port must be a fixed port, not 0".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host is empty".to_string()));
        }
        if self.tuning.watchdog_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "supervisor.watchdog_poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_pid_file(&self) -> PathBuf {
        self.data_dir.join(SERVER_PID_FILE)
    }

    pub fn watchdog_pid_file(&self) -> PathBuf {
        self.data_dir.join(WATCHDOG_PID_FILE)
    }

    pub fn recovery_state_file(&self) -> PathBuf {
        self.data_dir.join(RECOVERY_STATE_FILE)
    }

    pub fn server_log_file(&self) -> PathBuf {
        self.data_dir.join("server.log")
    }

    pub fn watchdog_log_file(&self) -> PathBuf {
        self.data_dir.join("watchdog.log")
    }

    pub const fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.tuning.startup_grace_ms)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.tuning.probe_timeout_ms)
    }

    pub const fn confirm_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.tuning.confirm_probe_timeout_ms)
    }

    pub const fn watchdog_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tuning.watchdog_poll_interval_ms)
    }
}
