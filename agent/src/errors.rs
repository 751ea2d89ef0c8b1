//! Error types for the site synchronizer

use std::time::Duration;

use thiserror::Error;

/// Main error type for the site synchronizer
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid deployment request: {0}")]
    ValidationRejected(String),

    #[error("Command `{command}` failed ({status}): {output}")]
    ProcessFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("Command `{command}` timed out after {timeout:?}")]
    ProcessTimedOut { command: String, timeout: Duration },

    #[error("Malformed event payload: {0}")]
    TransportDecode(String),

    #[error("Event stream disconnected: {0}")]
    TransportDisconnected(String),

    #[error("Purge of {hostname} failed: {reason}")]
    PurgeFailed { hostname: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
