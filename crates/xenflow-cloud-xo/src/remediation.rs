//! Post-create memory fix
//!
//! Xen Orchestra cannot set the static memory maximum when a VM is created
//! from a template. After creation the hook waits for the first boot to
//! settle, signs in with a token and calls `vm.setAndRestart` with every
//! memory field set to the VM's declared maximum.
//!
//! ```text
//! Created -> Waiting -> Authenticating -> Configuring -> Restarting -> Done
//!                            |                 |
//!                            +-----> Failed <--+   (also on connect errors)
//! ```
//!
//! A single attempt is made. Whatever happens, the session is closed.

use crate::api::XoApi;
use crate::error::{Result, XoError};
use crate::rpc::TransportFactory;
use crate::settings::XoSettings;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use xenflow_cloud::{HookError, ResourceHook, ResourceHookArgs, ResourceOutputs};
use xenflow_config::Secret;

pub const HOOK_NAME: &str = "set-memory-and-restart";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationStage {
    Waiting,
    Authenticating,
    Configuring,
    Restarting,
    Done,
}

impl std::fmt::Display for RemediationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            RemediationStage::Waiting => "waiting",
            RemediationStage::Authenticating => "authenticating",
            RemediationStage::Configuring => "configuring",
            RemediationStage::Restarting => "restarting",
            RemediationStage::Done => "done",
        };
        f.write_str(stage)
    }
}

/// What to fix on which VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationRequest {
    pub vm_id: String,
    /// Bytes; applied to every memory field
    pub memory: u64,
}

impl RemediationRequest {
    pub fn new(vm_id: impl Into<String>, memory: u64) -> Self {
        Self {
            vm_id: vm_id.into(),
            memory,
        }
    }

    /// Build from the outputs of a created VM; `id` and `memoryMax` are required
    pub fn from_outputs(outputs: Option<&ResourceOutputs>) -> Result<Self> {
        let outputs = outputs
            .ok_or_else(|| XoError::ConfigMissing("hook received no resource outputs".to_string()))?;

        let vm_id = outputs
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| XoError::ConfigMissing("VM outputs have no 'id'".to_string()))?;
        let memory = outputs
            .get("memoryMax")
            .and_then(Value::as_u64)
            .filter(|m| *m > 0)
            .ok_or_else(|| XoError::ConfigMissing("VM outputs have no 'memoryMax'".to_string()))?;

        Ok(Self::new(vm_id, memory))
    }

    /// Parameters of `vm.setAndRestart`
    pub fn params(&self) -> Value {
        json!({
            "id": self.vm_id,
            "memory": self.memory,
            "memoryMin": self.memory,
            "memoryMax": self.memory,
            "memoryStaticMax": self.memory,
        })
    }
}

/// After-create hook that fixes VM memory through the control API
pub struct MemoryFixHook {
    factory: Arc<dyn TransportFactory>,
    token: Secret,
    settle_delay: Duration,
    timeout: Duration,
}

impl MemoryFixHook {
    pub fn new(factory: Arc<dyn TransportFactory>, token: Secret) -> Self {
        Self {
            factory,
            token,
            settle_delay: crate::settings::DEFAULT_SETTLE_DELAY,
            timeout: crate::settings::DEFAULT_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &XoSettings) -> Result<Self> {
        let factory = Arc::new(settings.transport_factory()?);
        Ok(Self::new(factory, settings.token.clone())
            .with_settle_delay(settings.settle_delay)
            .with_timeout(settings.timeout))
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait, then apply the fix once
    #[tracing::instrument(skip(self, request), fields(vm_id = %request.vm_id))]
    pub async fn run(&self, request: &RemediationRequest) -> Result<()> {
        info!(stage = %RemediationStage::Waiting, delay = ?self.settle_delay, "Waiting for first boot");
        tokio::time::sleep(self.settle_delay).await;

        let mut api = XoApi::new(self.factory.create());
        let outcome = match tokio::time::timeout(self.timeout, self.apply(&mut api, request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(XoError::Timeout(self.timeout)),
        };

        if let Err(e) = api.close().await {
            warn!(error = %e, "Failed to close Xen Orchestra session");
        }

        match &outcome {
            Ok(()) => info!(stage = %RemediationStage::Done, memory = request.memory, "Memory fixed"),
            Err(e) => error!(error = %e, "Memory fix failed; fix the VM manually or re-run `xenflow fix-memory`"),
        }
        outcome
    }

    async fn apply(&self, api: &mut XoApi, request: &RemediationRequest) -> Result<()> {
        info!(stage = %RemediationStage::Authenticating, "Signing in");
        api.connect().await?;
        api.sign_in_with_token(&self.token).await?;

        info!(stage = %RemediationStage::Configuring, memory = request.memory, "Setting memory");
        info!(stage = %RemediationStage::Restarting, "Restarting VM");
        api.set_and_restart(request.params()).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceHook for MemoryFixHook {
    fn name(&self) -> &str {
        HOOK_NAME
    }

    async fn after_create(&self, args: &ResourceHookArgs) -> std::result::Result<(), HookError> {
        let request = RemediationRequest::from_outputs(args.new_outputs.as_ref())?;
        self.run(&request).await?;
        Ok(())
    }
}
