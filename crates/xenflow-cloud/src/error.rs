//! Provisioning engine error types

use thiserror::Error;

/// Provisioning engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Lookup failed: no single {kind} named '{name_label}' (found {matches} matches, expected exactly one)")]
    LookupNotFound {
        kind: String,
        name_label: String,
        matches: usize,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
