//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`fred`] and [`serde_json`] errors and adds the gateway's own
//! validation and timeout failures.

use std::time::Duration;

use strata_types::RecordError;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record was rejected before any I/O.
    #[error("Validation error: {0}")]
    Validation(#[from] RecordError),

    /// A backend call did not finish within the gateway timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The backend operation (`connect`, `read`, `write`).
        operation: &'static str,
        /// The configured limit.
        timeout: Duration,
    },

    /// The backend is not reachable or not yet connected.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
