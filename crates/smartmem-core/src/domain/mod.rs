//! Domain types for server supervision.
//!
//! Pure data: no process, socket or filesystem access happens here.

mod liveness;
mod record;
mod state;

pub use liveness::Liveness;
pub use record::{PortBinding, ProcessRecord, WatchdogHandle};
pub use state::{InvalidTransition, SupervisionState};
