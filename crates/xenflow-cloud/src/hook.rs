//! Resource lifecycle hooks

use crate::provider::ResourceOutputs;
use async_trait::async_trait;

/// Error type returned by hooks; the stack only needs its message
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Arguments passed to a hook once its resource has been created
#[derive(Debug, Clone)]
pub struct ResourceHookArgs {
    /// Logical resource name
    pub name: String,

    /// Resource type (e.g. "vm")
    pub resource_type: String,

    /// Inputs of the resource, secrets redacted
    pub new_inputs: serde_json::Value,

    /// Outputs reported by the provider
    pub new_outputs: Option<ResourceOutputs>,
}

/// A procedure run by the stack after the first successful creation of a resource.
///
/// Hooks never run on updates or no-op runs. A returned error is reported to
/// the operator as a failed provisioning step.
#[async_trait]
pub trait ResourceHook: Send + Sync {
    /// Name used in logs and apply results
    fn name(&self) -> &str;

    async fn after_create(&self, args: &ResourceHookArgs) -> Result<(), HookError>;
}
