//! Error types for the Cradle engine.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire Cradle engine.
///
/// This provides typed, structured error variants so that the embedding UI
/// can distinguish recoverable content failures from local validation
/// problems without string matching.
#[derive(Error, Debug, Clone, Serialize)]
pub enum CradleError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Content-generation service failure (network, timeout, bad document)
    #[error("Content generation error: {message}")]
    Generation { message: String, retryable: bool },

    /// The user picked an option id the active question does not contain
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Another phase-transition action is already in flight
    #[error("Action already in progress")]
    ActionInProgress,

    /// Optimistic-concurrency conflict in the credit ledger
    #[error("Credit ledger conflict after {attempts} attempts")]
    LedgerConflict { attempts: u32 },

    /// Not enough credits for a premium action
    #[error("Insufficient credits: have {available}, need {required}")]
    InsufficientCredits { available: u32, required: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CradleError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a non-retryable Generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a retryable Generation error
    pub fn generation_retryable(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a Generation error
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }

    /// Check if this error is worth retrying against the same service
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation { retryable: true, .. })
    }

    /// Check if this is a local validation error
    pub fn is_invalid_selection(&self) -> bool {
        matches!(self, Self::InvalidSelection(_))
    }
}

impl From<std::io::Error> for CradleError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for CradleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: e.to_string(),
        }
    }
}

/// Convenient Result alias used across the engine.
pub type Result<T> = std::result::Result<T, CradleError>;
