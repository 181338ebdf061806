//! CLI bootstrap - the composition root.
//!
//! The only place where the locator, the configuration file and the
//! supervisor are wired together. Handlers receive the composed
//! [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use smartmem_core::{DefaultLocator, Locator, SupervisorConfig, SupervisorError};
use smartmem_runtime::ProcessSupervisor;
use tracing::debug;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub locator: DefaultLocator,
    /// Host process the server is tied to. `None` runs without a watchdog.
    pub parent_pid: Option<u32>,
    /// Log filter handed to the server.
    pub server_log_level: Option<String>,
}

impl CliConfig {
    /// Command-line values over the locator's environment lookup.
    pub fn from_cli(cli: &Cli) -> Self {
        let env = DefaultLocator::from_env();
        Self {
            locator: DefaultLocator {
                data_dir: cli.data_dir.clone().or(env.data_dir),
                config_path: cli.config.clone().or(env.config_path),
                binary_path: cli.server_bin.clone().or(env.binary_path),
            },
            parent_pid: cli.host_pid,
            server_log_level: cli.verbose.then(|| "debug".to_string()),
        }
    }
}

/// Fully composed context for CLI commands.
#[derive(Debug)]
pub struct CliContext {
    pub supervisor: Arc<ProcessSupervisor>,
    pub locator: Arc<DefaultLocator>,
    pub config_path: PathBuf,
}

/// Resolve paths, load the config file and build the supervisor.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let locator = Arc::new(config.locator);

    let data_dir = locator.data_dir().map_err(SupervisorError::from)?;
    let config_path = locator.config_path().map_err(SupervisorError::from)?;
    debug!(data_dir = %data_dir.display(), config = %config_path.display(), "Bootstrapping supervisor");

    let mut supervisor_config = SupervisorConfig::load(&config_path, data_dir)
        .map_err(SupervisorError::from)?
        .with_parent_pid(config.parent_pid);
    if let Some(level) = config.server_log_level {
        supervisor_config.server_log_level = level;
    }

    let supervisor = ProcessSupervisor::new(supervisor_config, locator.clone())?;

    Ok(CliContext {
        supervisor: Arc::new(supervisor),
        locator,
        config_path,
    })
}
