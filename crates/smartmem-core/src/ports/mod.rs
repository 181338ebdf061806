//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports contain no implementation details and use only domain types.

mod locator;

#[cfg(test)]
pub use locator::MockLocator;
pub use locator::{LocateError, Locator};
