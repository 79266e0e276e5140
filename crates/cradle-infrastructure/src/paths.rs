//! Unified path management for cradle files.
//!
//! All persisted state lives under one platform config directory:
//!
//! ```text
//! ~/.config/cradle/            # Config directory
//! ├── config.toml              # Engine configuration
//! ├── save.toml                # The single session snapshot blob
//! └── save.toml.lock           # Advisory lock guarding the blob
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Path resolution for cradle.
pub struct CradlePaths;

impl CradlePaths {
    /// Returns the cradle configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("cradle"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the engine configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path of the single snapshot blob.
    pub fn save_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("save.toml"))
    }
}
