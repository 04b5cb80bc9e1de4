//! Xen Orchestra provider error types

use std::time::Duration;
use thiserror::Error;
use xenflow_cloud::CloudError;

#[derive(Error, Debug)]
pub enum XoError {
    #[error("Missing required value: {0}")]
    ConfigMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to reach Xen Orchestra: {0}")]
    Connect(String),

    #[error("Xen Orchestra rejected the token: {0}")]
    Auth(String),

    #[error("{method} failed: {message}")]
    RemoteCall { method: String, message: String },

    /// JSON-RPC error object returned by the server
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("No single {kind} named '{name_label}' (found {matches})")]
    LookupNotFound {
        kind: String,
        name_label: String,
        matches: usize,
    },

    #[error("Gave up after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] xenflow_config::ConfigError),
}

impl XoError {
    /// Map a JSON-RPC failure of `method` to a remote call error; transport
    /// errors pass through unchanged.
    pub(crate) fn remote(method: &str, err: XoError) -> XoError {
        match err {
            XoError::Rpc { code, message } => XoError::RemoteCall {
                method: method.to_string(),
                message: format!("{} (code {})", message, code),
            },
            other => other,
        }
    }
}

impl From<XoError> for CloudError {
    fn from(err: XoError) -> Self {
        match err {
            XoError::LookupNotFound {
                kind,
                name_label,
                matches,
            } => CloudError::LookupNotFound {
                kind,
                name_label,
                matches,
            },
            XoError::Auth(msg) => CloudError::AuthenticationFailed(msg),
            XoError::Timeout(after) => CloudError::Timeout(format!("{:?}", after)),
            XoError::ConfigMissing(msg) | XoError::InvalidConfig(msg) => {
                CloudError::InvalidConfig(msg)
            }
            XoError::Config(e) => CloudError::InvalidConfig(e.to_string()),
            XoError::Json(e) => CloudError::Json(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, XoError>;
