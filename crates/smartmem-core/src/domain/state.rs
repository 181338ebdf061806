//! Supervision lifecycle states and the transitions allowed between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the managed server as seen by the supervisor.
///
/// ```text
/// Stopped -> Starting -> Running -> Stopping -> Stopped
///                          |
///                          +-> Crashed (server vanished without a stop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl SupervisionState {
    /// Whether a supervisor-driven move from `self` to `next` is legal.
    ///
    /// Failed operations fall back: a failed start returns to `Stopped`
    /// (or `Crashed` when recovery gave up), a failed stop returns to
    /// `Running` because the server is still there.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SupervisionState::{Crashed, Running, Starting, Stopped, Stopping};
        matches!(
            (self, next),
            (Stopped | Crashed, Starting)
                | (Starting, Running | Stopped | Crashed)
                | (Running, Stopping | Crashed)
                | (Stopping, Stopped | Running)
                | (Stopped | Crashed, Stopping)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for SupervisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted a transition the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal supervision transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SupervisionState,
    pub to: SupervisionState,
}

#[cfg(test)]
mod tests {
    use super::SupervisionState::*;
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(Stopped.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
    }

    #[test]
    fn crashed_only_reachable_from_running_or_failed_start() {
        assert!(Running.can_transition_to(Crashed));
        assert!(Starting.can_transition_to(Crashed));
        assert!(!Stopped.can_transition_to(Crashed));
        assert!(!Stopping.can_transition_to(Crashed));
    }

    #[test]
    fn cannot_skip_starting() {
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Crashed.can_transition_to(Running));
    }

    #[test]
    fn failed_stop_falls_back_to_running() {
        assert!(Stopping.can_transition_to(Running));
    }
}
