//! Typed Xen Orchestra API calls over an [`RpcTransport`]

use crate::error::{Result, XoError};
use crate::rpc::RpcTransport;
use crate::vm::VmIntent;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use xenflow_config::Secret;

/// One API session. Owns its transport; call [`XoApi::close`] on every path.
pub struct XoApi {
    transport: Box<dyn RpcTransport>,
}

impl XoApi {
    pub fn new(transport: Box<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// `session.signInWithToken`; returns the signed-in user object
    pub async fn sign_in_with_token(&mut self, token: &Secret) -> Result<Value> {
        self.transport
            .call("session.signInWithToken", json!({ "token": token.expose() }))
            .await
            .map_err(|e| match e {
                XoError::Rpc { message, .. } => XoError::Auth(message),
                other => other,
            })
    }

    /// `vm.setAndRestart`: set memory fields and restart the guest in one call
    pub async fn set_and_restart(&mut self, params: Value) -> Result<Value> {
        const METHOD: &str = "vm.setAndRestart";
        self.transport
            .call(METHOD, params)
            .await
            .map_err(|e| XoError::remote(METHOD, e))
    }

    /// `xo.getAllObjects` with a property filter; objects keyed by id
    pub async fn get_all_objects(&mut self, filter: Value) -> Result<Map<String, Value>> {
        const METHOD: &str = "xo.getAllObjects";
        let result = self
            .transport
            .call(METHOD, json!({ "filter": filter }))
            .await
            .map_err(|e| XoError::remote(METHOD, e))?;

        match result {
            Value::Object(objects) => Ok(objects),
            Value::Null => Ok(Map::new()),
            other => Err(XoError::Protocol(format!(
                "{} returned {}, expected an object",
                METHOD,
                kind_of(&other)
            ))),
        }
    }

    /// `vm.create`; returns the new VM id
    pub async fn vm_create(&mut self, intent: &VmIntent) -> Result<String> {
        const METHOD: &str = "vm.create";
        debug!(name_label = %intent.name_label, "Creating VM");
        let result = self
            .transport
            .call(METHOD, intent.create_params())
            .await
            .map_err(|e| XoError::remote(METHOD, e))?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| XoError::Protocol(format!("{} returned {}", METHOD, kind_of(&result))))
    }

    /// `vm.set` for the fields that can change after creation
    pub async fn vm_set(&mut self, id: &str, intent: &VmIntent) -> Result<()> {
        const METHOD: &str = "vm.set";
        self.transport
            .call(METHOD, intent.set_params(id))
            .await
            .map_err(|e| XoError::remote(METHOD, e))?;
        Ok(())
    }

    /// `vm.delete`
    pub async fn vm_delete(&mut self, id: &str) -> Result<()> {
        const METHOD: &str = "vm.delete";
        self.transport
            .call(METHOD, json!({ "id": id }))
            .await
            .map_err(|e| XoError::remote(METHOD, e))?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    /// Close, logging instead of returning a failure
    pub async fn close_quietly(&mut self) {
        if let Err(e) = self.close().await {
            warn!(error = %e, "Failed to close Xen Orchestra session");
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
