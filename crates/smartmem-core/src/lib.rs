//! Core domain types, configuration and ports for the smartmem server supervisor.
//!
//! Nothing in this crate touches processes or sockets; see `smartmem-runtime`.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod error;
pub mod paths;
pub mod ports;

pub use config::{
    ConfigError, ConfigFile, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, RecoverySettings,
    ServerSettings, SupervisorConfig, SupervisorTuning,
};
pub use domain::{
    InvalidTransition, Liveness, PortBinding, ProcessRecord, SupervisionState, WatchdogHandle,
};
pub use error::{ReasonCode, SupervisorError};
pub use paths::{DefaultLocator, PathError, ResolvedPaths};
pub use ports::{LocateError, Locator};
