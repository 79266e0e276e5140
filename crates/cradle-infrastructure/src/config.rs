//! Engine configuration loading.
//!
//! Reads `~/.config/cradle/config.toml` when present; environment
//! variables override individual entries so a config file is never
//! required to get a session running.

use std::fs;

use serde::{Deserialize, Serialize};

use cradle_core::error::{CradleError, Result};
use cradle_core::session::model::DEFAULT_ENDING_AGE;

use crate::paths::CradlePaths;

/// Engine configuration file schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Base URL of the content-generation service.
    pub content_url: Option<String>,
    /// Bearer token for the content-generation service.
    pub api_token: Option<String>,
    /// Base URL of the credit ledger service.
    pub ledger_url: Option<String>,
    /// Child age at which the game ends.
    pub ending_age: Option<u8>,
    /// Reveal cadence overrides, all in milliseconds.
    pub reveal: Option<RevealConfig>,
}

/// Reveal timing overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RevealConfig {
    pub base_delay_ms: Option<u64>,
    pub sentence_delay_ms: Option<u64>,
    pub newline_delay_ms: Option<u64>,
}

impl EngineConfig {
    /// Loads the configuration file, then applies environment overrides.
    ///
    /// A missing or empty file yields defaults; a file that exists but
    /// cannot be parsed is an error, since silently ignoring a typo in a
    /// config the user wrote is worse than failing loudly at startup.
    pub fn load() -> Result<Self> {
        let mut config = match CradlePaths::config_file() {
            Ok(path) if path.exists() => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    CradleError::config(format!("failed to read {}: {e}", path.display()))
                })?;
                if content.trim().is_empty() {
                    Self::default()
                } else {
                    toml::from_str(&content).map_err(|e| {
                        CradleError::config(format!("failed to parse {}: {e}", path.display()))
                    })?
                }
            }
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var("CRADLE_CONTENT_URL") {
            config.content_url = Some(url);
        }
        if let Ok(token) = std::env::var("CRADLE_API_TOKEN") {
            config.api_token = Some(token);
        }
        if let Ok(url) = std::env::var("CRADLE_LEDGER_URL") {
            config.ledger_url = Some(url);
        }

        Ok(config)
    }

    /// Effective ending age.
    pub fn ending_age(&self) -> u8 {
        self.ending_age.unwrap_or(DEFAULT_ENDING_AGE)
    }
}
