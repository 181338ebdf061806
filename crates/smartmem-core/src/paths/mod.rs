//! Path utilities for the server's data directory and binaries.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O
//! - OS-specific logic is kept in `platform`

mod error;
mod platform;
mod resolver;

pub use error::PathError;
pub use platform::{
    DATA_DIR_NAME, SERVER_BINARY_NAME, data_root, ensure_dir, server_binary_file_name,
};
pub use resolver::{DefaultLocator, ResolvedPaths};
