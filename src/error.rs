//! Error types for ImageFerry
//!
//! This module defines all error types used throughout the application,
//! providing detailed error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ImageFerry operations
#[derive(Error, Debug)]
pub enum FerryError {
    /// Transport-level failure from a store client call
    #[error("Store '{host}' unavailable: {message}")]
    StoreUnavailable {
        host: String,
        message: String,
    },

    /// Copy or metadata step failed after a successful existence check
    #[error("Item '{identifier}' could not be transferred: {message}")]
    ItemNotTransferable {
        identifier: String,
        message: String,
    },

    /// Listing the source store failed
    #[error("Listing source items failed on page {page}: {message}")]
    EnumerationFailure { page: u32, message: String },

    /// A store answered with a status code the client cannot act on
    #[error("Unexpected response from '{host}': HTTP {status}")]
    UnexpectedStatus { host: String, status: u16 },

    /// A store answered with a payload the client cannot decode
    #[error("Malformed response from '{host}': {message}")]
    MalformedResponse { host: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error with path context (config file handling)
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FerryError>,
    },
}

impl FerryError {
    /// Create a store-unavailable error
    pub fn store_unavailable(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an item-not-transferable error
    pub fn not_transferable(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ItemNotTransferable {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Create an enumeration-failure error
    pub fn enumeration(page: u32, message: impl Into<String>) -> Self {
        Self::EnumerationFailure {
            page,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error came from talking to a store
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::UnexpectedStatus { .. }
                | Self::MalformedResponse { .. }
        )
    }

    /// Get the item identifier associated with this error, if any
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::ItemNotTransferable { identifier, .. } => Some(identifier),
            Self::WithContext { source, .. } => source.identifier(),
            _ => None,
        }
    }
}

/// Result type alias for ImageFerry operations
pub type Result<T> = std::result::Result<T, FerryError>;

impl From<serde_json::Error> for FerryError {
    fn from(err: serde_json::Error) -> Self {
        FerryError::ConfigError(err.to_string())
    }
}
