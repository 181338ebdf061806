//! Network-level liveness classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of a short TCP connect against the server endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Connection accepted.
    Responsive,
    /// Something holds the port but did not accept within the timeout.
    Unresponsive,
    /// Connection refused: nothing is listening.
    Unbound,
}

impl Liveness {
    pub const fn is_bound(self) -> bool {
        !matches!(self, Self::Unbound)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responsive => write!(f, "responsive"),
            Self::Unresponsive => write!(f, "not responsive"),
            Self::Unbound => write!(f, "unbound"),
        }
    }
}
