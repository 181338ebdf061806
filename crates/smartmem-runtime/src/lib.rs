//! OS-level supervision of the smartmem server process.
//!
//! Leaf components ([`liveness`], [`pidfile`], [`reconcile`], [`os`]) feed
//! the [`shutdown`] escalator and the [`watchdog`]; [`supervisor`] ties them
//! together behind `start` / `stop` / `restart` / `status`.
#![deny(unsafe_code)]

pub mod health_monitor;
pub mod launch;
pub mod liveness;
pub mod os;
pub mod pidfile;
pub mod reconcile;
pub mod recovery;
pub mod server_signals;
pub mod shutdown;
pub mod supervisor;
pub mod watchdog;

pub use health_monitor::{HealthEvent, HealthMonitor};
pub use launch::{DetachedLauncher, LaunchSpec, Launcher, WatchdogSpec};
pub use os::{Delivery, ProcessControl, platform_control};
pub use pidfile::{PidLookup, PidRegistry};
pub use reconcile::{ListenerSource, PortReconciler, platform_listeners};
pub use recovery::{RecoveryLedger, RecoveryState};
pub use server_signals::{ParentMonitor, ServerSignals, SignalEvent};
pub use shutdown::{EscalationFailure, Termination, TerminationEscalator};
pub use supervisor::{
    Components, ProcessSupervisor, RecoveryOutcome, RestartOutcome, ServerStatus, StartOutcome,
    StopOutcome,
};
pub use watchdog::{Watchdog, WatchdogExit, run_watchdog_process};
