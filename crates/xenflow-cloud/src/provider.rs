//! Cloud provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output properties reported by a provider after create or update
pub type ResourceOutputs = serde_json::Map<String, serde_json::Value>;

/// Provider abstraction the [`Stack`](crate::Stack) converges resources through
///
/// Providers only implement primitive operations. Diffing, state and hook
/// dispatch are owned by the stack.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "xen-orchestra")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Resolve an existing object of `kind` by its name label to its identifier.
    ///
    /// Must fail with [`CloudError::LookupNotFound`](crate::CloudError::LookupNotFound)
    /// unless exactly one object matches.
    async fn lookup(&self, kind: &str, name_label: &str, scope: Option<&str>) -> Result<String>;

    /// Create a resource; the returned outputs must contain an `id`
    async fn create(&self, resource: &ResourceConfig) -> Result<ResourceOutputs>;

    /// Converge an existing resource in place
    async fn update(&self, id: &str, resource: &ResourceConfig) -> Result<ResourceOutputs>;

    /// Destroy a resource by provider id
    async fn destroy(&self, resource_type: &str, id: &str) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Desired configuration for one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "vm")
    pub resource_type: String,

    /// Logical resource name, stable across runs
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,

    /// Top-level config keys holding secret material
    #[serde(default)]
    pub secret_keys: Vec<String>,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
            secret_keys: Vec::new(),
        }
    }

    /// Mark a top-level config key as secret
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_keys.push(key.into());
        self
    }

    /// Get the state key (provider:type:id)
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.provider, self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Config with every secret key replaced by a `sha256:` fingerprint.
    ///
    /// This is the only form of the inputs that is ever persisted or logged.
    pub fn redacted_inputs(&self) -> serde_json::Value {
        let mut inputs = self.config.clone();
        if let Some(map) = inputs.as_object_mut() {
            for key in &self.secret_keys {
                if let Some(value) = map.get_mut(key) {
                    *value = serde_json::Value::String(fingerprint(value));
                }
            }
        }
        inputs
    }
}

fn fingerprint(value: &serde_json::Value) -> String {
    let bytes = match value {
        serde_json::Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    };
    format!("sha256:{}", hex::encode(Sha256::digest(&bytes)))
}
