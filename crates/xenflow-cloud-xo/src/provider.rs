//! Xen Orchestra provider implementation

use crate::api::XoApi;
use crate::error::{Result, XoError};
use crate::rpc::TransportFactory;
use crate::vm::{VM_RESOURCE_TYPE, VmIntent};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use xenflow_cloud::{AuthStatus, CloudProvider, ResourceConfig, ResourceOutputs};
use xenflow_config::Secret;

pub const PROVIDER_NAME: &str = "xen-orchestra";

/// Lookup kinds and the XO object type they resolve against
const LOOKUP_KINDS: [(&str, &str); 4] = [
    ("pool", "pool"),
    ("template", "VM-template"),
    ("sr", "SR"),
    ("network", "network"),
];

/// Provider talking to one Xen Orchestra instance.
///
/// Every operation opens its own short session; nothing is shared between
/// calls.
pub struct XenOrchestraProvider {
    factory: Arc<dyn TransportFactory>,
    token: Secret,
}

impl XenOrchestraProvider {
    pub fn new(factory: Arc<dyn TransportFactory>, token: Secret) -> Self {
        Self { factory, token }
    }

    async fn open_session(&self) -> Result<XoApi> {
        let mut api = XoApi::new(self.factory.create());
        let signed_in = async {
            api.connect().await?;
            api.sign_in_with_token(&self.token).await
        }
        .await;

        match signed_in {
            Ok(_) => Ok(api),
            Err(e) => {
                api.close_quietly().await;
                Err(e)
            }
        }
    }

    /// Find the single object of `kind` with `name_label`
    pub async fn find_unique(
        &self,
        kind: &str,
        name_label: &str,
        scope: Option<&str>,
    ) -> Result<String> {
        let xo_type = LOOKUP_KINDS
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, t)| *t)
            .ok_or_else(|| XoError::InvalidConfig(format!("unknown lookup kind '{}'", kind)))?;

        let mut filter = Map::new();
        filter.insert("type".to_string(), json!(xo_type));
        filter.insert("name_label".to_string(), json!(name_label));
        if let Some(pool_id) = scope {
            filter.insert("$pool".to_string(), json!(pool_id));
        }

        let mut api = self.open_session().await?;
        let found = api.get_all_objects(Value::Object(filter)).await;
        api.close_quietly().await;
        let objects = found?;

        if objects.len() != 1 {
            return Err(XoError::LookupNotFound {
                kind: kind.to_string(),
                name_label: name_label.to_string(),
                matches: objects.len(),
            });
        }

        let (key, object) = objects
            .into_iter()
            .next()
            .ok_or_else(|| XoError::Protocol("lookup result vanished".to_string()))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(key);
        debug!(kind, name_label, id = %id, "Resolved lookup");
        Ok(id)
    }

    fn vm_intent(resource: &ResourceConfig) -> Result<VmIntent> {
        if resource.resource_type != VM_RESOURCE_TYPE {
            return Err(XoError::InvalidConfig(format!(
                "unsupported resource type: {}",
                resource.resource_type
            )));
        }
        VmIntent::from_resource(resource)
    }
}

#[async_trait]
impl CloudProvider for XenOrchestraProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Xen Orchestra"
    }

    async fn check_auth(&self) -> xenflow_cloud::Result<AuthStatus> {
        let mut api = XoApi::new(self.factory.create());
        let signed_in = async {
            api.connect().await?;
            api.sign_in_with_token(&self.token).await
        }
        .await;
        api.close_quietly().await;

        match signed_in {
            Ok(user) => {
                let account = user
                    .get("email")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown user")
                    .to_string();
                Ok(AuthStatus::ok(account))
            }
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn lookup(
        &self,
        kind: &str,
        name_label: &str,
        scope: Option<&str>,
    ) -> xenflow_cloud::Result<String> {
        Ok(self.find_unique(kind, name_label, scope).await?)
    }

    async fn create(&self, resource: &ResourceConfig) -> xenflow_cloud::Result<ResourceOutputs> {
        let intent = Self::vm_intent(resource)?;

        let mut api = self.open_session().await?;
        let created = api.vm_create(&intent).await;
        api.close_quietly().await;
        let id = created?;

        info!(resource = %resource.id, vm_id = %id, "VM created");
        Ok(intent.outputs(&id))
    }

    async fn update(
        &self,
        id: &str,
        resource: &ResourceConfig,
    ) -> xenflow_cloud::Result<ResourceOutputs> {
        let intent = Self::vm_intent(resource)?;
        warn!(
            resource = %resource.id,
            "Disks, networks and cloud-init changes only apply when the VM is recreated"
        );

        let mut api = self.open_session().await?;
        let updated = api.vm_set(id, &intent).await;
        api.close_quietly().await;
        updated?;

        info!(resource = %resource.id, vm_id = %id, "VM updated");
        Ok(intent.outputs(id))
    }

    async fn destroy(&self, resource_type: &str, id: &str) -> xenflow_cloud::Result<()> {
        if resource_type != VM_RESOURCE_TYPE {
            return Err(XoError::InvalidConfig(format!(
                "unsupported resource type: {}",
                resource_type
            ))
            .into());
        }

        let mut api = self.open_session().await?;
        let deleted = api.vm_delete(id).await;
        api.close_quietly().await;
        deleted?;

        info!(vm_id = %id, "VM deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::vm::{PowerState, VmDisk, VmNetwork};
    use xenflow_cloud::CloudError;

    fn scripted_provider(builder: crate::testing::ScriptBuilder) -> (XenOrchestraProvider, crate::testing::CallLog) {
        let (factory, log) = builder
            .reply("session.signInWithToken", json!({ "email": "admin@lab" }))
            .factory();
        (XenOrchestraProvider::new(factory, Secret::new("tok")), log)
    }

    fn intent() -> VmIntent {
        VmIntent {
            name_label: "pulumi-ubuntu2404.internal.domain".to_string(),
            name_description: String::new(),
            tags: vec![],
            cpus: 2,
            memory_min: 4 << 30,
            memory_max: 4 << 30,
            template: "tmpl".to_string(),
            disks: vec![VmDisk {
                name_label: "disk1".to_string(),
                size: 20 << 30,
                sr_id: "sr".to_string(),
            }],
            networks: vec![VmNetwork {
                network_id: "net".to_string(),
                mac_address: None,
            }],
            cloud_config: "#cloud-config\n".to_string(),
            cloud_network_config: "#cloud-config\n".to_string(),
            power_state: PowerState::Running,
            hvm_boot_firmware: "uefi".to_string(),
            destroy_cloud_config_vdi_after_boot: true,
        }
    }

    #[tokio::test]
    async fn test_lookup_exactly_one() {
        let (provider, log) = scripted_provider(
            ScriptedTransport::new().reply("xo.getAllObjects", json!({ "sr-1": { "id": "sr-1" } })),
        );

        let id = provider.lookup("sr", "SR-PROD-1", None).await.unwrap();
        assert_eq!(id, "sr-1");
        assert_eq!(log.params(1)["filter"], json!({ "type": "SR", "name_label": "SR-PROD-1" }));
        assert_eq!(log.closes(), 1);
    }

    #[tokio::test]
    async fn test_template_lookup_scoped_by_pool() {
        let (provider, log) = scripted_provider(
            ScriptedTransport::new().reply("xo.getAllObjects", json!({ "t-1": { "id": "t-1" } })),
        );

        provider
            .lookup("template", "ubuntu-24.04.2-packer-gold", Some("pool-1"))
            .await
            .unwrap();
        assert_eq!(log.params(1)["filter"]["type"], "VM-template");
        assert_eq!(log.params(1)["filter"]["$pool"], "pool-1");
    }

    #[tokio::test]
    async fn test_lookup_none_or_many_is_not_found() {
        let (none, _) = scripted_provider(ScriptedTransport::new().reply("xo.getAllObjects", json!({})));
        assert!(matches!(
            none.lookup("network", "vlan100/admin", None).await,
            Err(CloudError::LookupNotFound { matches: 0, .. })
        ));

        let (many, _) = scripted_provider(ScriptedTransport::new().reply(
            "xo.getAllObjects",
            json!({ "a": { "id": "a" }, "b": { "id": "b" } }),
        ));
        assert!(matches!(
            many.lookup("pool", "XCP-Pool-1", None).await,
            Err(CloudError::LookupNotFound { matches: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_lookup_kind() {
        let (provider, log) = scripted_provider(ScriptedTransport::new());
        assert!(matches!(
            provider.lookup("host", "xcp-1", None).await,
            Err(CloudError::InvalidConfig(_))
        ));
        assert_eq!(log.connects(), 0);
    }

    #[tokio::test]
    async fn test_create_returns_outputs() {
        let (provider, log) =
            scripted_provider(ScriptedTransport::new().reply("vm.create", json!("vm-uuid")));
        let resource = intent().into_resource("ubuntu2404", PROVIDER_NAME).unwrap();

        let outputs = provider.create(&resource).await.unwrap();
        assert_eq!(outputs["id"], "vm-uuid");
        assert_eq!(outputs["memoryMax"], 4u64 << 30);
        assert_eq!(log.methods(), vec!["session.signInWithToken", "vm.create"]);
        assert_eq!(log.closes(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_closes_session() {
        let (provider, log) =
            scripted_provider(ScriptedTransport::new().fail("vm.create", 5, "template not found"));
        let resource = intent().into_resource("ubuntu2404", PROVIDER_NAME).unwrap();

        let err = provider.create(&resource).await.unwrap_err();
        assert!(err.to_string().contains("template not found"));
        assert_eq!(log.closes(), 1);
    }

    #[tokio::test]
    async fn test_destroy_deletes_vm() {
        let (provider, log) = scripted_provider(ScriptedTransport::new().reply("vm.delete", json!(true)));
        provider.destroy("vm", "vm-uuid").await.unwrap();
        assert_eq!(log.params(1), json!({ "id": "vm-uuid" }));
    }

    #[tokio::test]
    async fn test_check_auth() {
        let (provider, _) = scripted_provider(ScriptedTransport::new());
        let status = provider.check_auth().await.unwrap();
        assert!(status.authenticated);
        assert_eq!(status.account_info.as_deref(), Some("admin@lab"));

        let (factory, _) = ScriptedTransport::new()
            .fail("session.signInWithToken", 1, "invalid credentials")
            .factory();
        let rejected = XenOrchestraProvider::new(factory, Secret::new("bad"));
        let status = rejected.check_auth().await.unwrap();
        assert!(!status.authenticated);
    }
}
