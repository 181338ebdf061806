//! Default locator and the resolved-paths snapshot.

use std::env;
use std::path::PathBuf;

use tracing::debug;

use super::platform::{SERVER_BINARY_NAME, data_root, ensure_dir, sibling_server_binary};
use crate::ports::{LocateError, Locator};

/// Locator used by the CLI.
///
/// Each field, when set, wins over the built-in search. [`Self::from_env`]
/// fills them from `SMARTMEM_DATA_DIR`, `SMARTMEM_CONFIG` and
/// `SMARTMEM_SERVER_BIN`.
#[derive(Debug, Clone, Default)]
pub struct DefaultLocator {
    pub data_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub binary_path: Option<PathBuf>,
}

impl DefaultLocator {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var_os("SMARTMEM_DATA_DIR").map(PathBuf::from),
            config_path: env::var_os("SMARTMEM_CONFIG").map(PathBuf::from),
            binary_path: env::var_os("SMARTMEM_SERVER_BIN").map(PathBuf::from),
        }
    }
}

impl Locator for DefaultLocator {
    fn binary_path(&self) -> Result<PathBuf, LocateError> {
        if let Some(path) = &self.binary_path {
            return Ok(path.clone());
        }

        let mut searched = Vec::new();

        if let Ok(sibling) = sibling_server_binary() {
            if sibling.is_file() {
                return Ok(sibling);
            }
            searched.push(sibling);
        }

        match which::which(SERVER_BINARY_NAME) {
            Ok(found) => Ok(found),
            Err(e) => {
                debug!("{SERVER_BINARY_NAME} not on PATH: {e}");
                searched.push(PathBuf::from(format!("$PATH/{SERVER_BINARY_NAME}")));
                Err(LocateError::BinaryNotFound { searched })
            }
        }
    }

    fn config_path(&self) -> Result<PathBuf, LocateError> {
        if let Some(path) = &self.config_path {
            return Ok(path.clone());
        }
        Ok(self.data_dir()?.join("config.json"))
    }

    fn data_dir(&self) -> Result<PathBuf, LocateError> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => data_root()?,
        };
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

/// All server paths captured in one struct.
///
/// Doubles as a fixed [`Locator`] for hosts that already know their paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
}

impl ResolvedPaths {
    /// Resolve every path once from `locator`.
    pub fn from_locator(locator: &dyn Locator) -> Result<Self, LocateError> {
        Ok(Self {
            binary_path: locator.binary_path()?,
            config_path: locator.config_path()?,
            data_dir: locator.data_dir()?,
            database_path: locator.database_path()?,
        })
    }
}

impl Locator for ResolvedPaths {
    fn binary_path(&self) -> Result<PathBuf, LocateError> {
        Ok(self.binary_path.clone())
    }

    fn config_path(&self) -> Result<PathBuf, LocateError> {
        Ok(self.config_path.clone())
    }

    fn data_dir(&self) -> Result<PathBuf, LocateError> {
        Ok(self.data_dir.clone())
    }

    fn database_path(&self) -> Result<PathBuf, LocateError> {
        Ok(self.database_path.clone())
    }
}
