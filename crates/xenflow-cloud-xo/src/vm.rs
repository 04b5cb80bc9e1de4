//! Desired shape of one VM

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use xenflow_cloud::{ResourceConfig, ResourceOutputs};

pub const VM_RESOURCE_TYPE: &str = "vm";

/// Input keys holding secret material
pub const SECRET_INPUTS: [&str; 1] = ["cloudConfig"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Running,
    Halted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDisk {
    pub name_label: String,
    pub size: u64,
    pub sr_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmNetwork {
    pub network_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

/// Everything needed to create (or converge) one VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmIntent {
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cpus: u32,
    pub memory_min: u64,
    pub memory_max: u64,
    /// Template id
    pub template: String,
    pub disks: Vec<VmDisk>,
    pub networks: Vec<VmNetwork>,
    /// Rendered userdata; may carry passwords
    pub cloud_config: String,
    /// Rendered metadata (network configuration)
    pub cloud_network_config: String,
    #[serde(default)]
    pub power_state: PowerState,
    pub hvm_boot_firmware: String,
    #[serde(default = "default_true")]
    pub destroy_cloud_config_vdi_after_boot: bool,
}

fn default_true() -> bool {
    true
}

impl VmIntent {
    /// Wrap as an engine resource with the secret inputs tagged
    pub fn into_resource(self, name: &str, provider: &str) -> Result<ResourceConfig> {
        let config = serde_json::to_value(&self)?;
        let resource = SECRET_INPUTS.iter().fold(
            ResourceConfig::new(VM_RESOURCE_TYPE, name, provider, config),
            |resource, key| resource.with_secret_key(*key),
        );
        Ok(resource)
    }

    pub fn from_resource(resource: &ResourceConfig) -> Result<Self> {
        Ok(serde_json::from_value(resource.config.clone())?)
    }

    /// Parameters of `vm.create`
    pub fn create_params(&self) -> Value {
        let vifs: Vec<Value> = self
            .networks
            .iter()
            .map(|n| match &n.mac_address {
                Some(mac) => json!({ "network": n.network_id, "mac": mac }),
                None => json!({ "network": n.network_id }),
            })
            .collect();
        let vdis: Vec<Value> = self
            .disks
            .iter()
            .map(|d| json!({ "name_label": d.name_label, "size": d.size, "SR": d.sr_id, "type": "user" }))
            .collect();

        json!({
            "name_label": self.name_label,
            "name_description": self.name_description,
            "template": self.template,
            "CPUs": self.cpus,
            "memoryMin": self.memory_min,
            "memoryMax": self.memory_max,
            "VIFs": vifs,
            "VDIs": vdis,
            "cloudConfig": self.cloud_config,
            "networkConfig": self.cloud_network_config,
            "destroyCloudConfigVdiAfterBoot": self.destroy_cloud_config_vdi_after_boot,
            "hvmBootFirmware": self.hvm_boot_firmware,
            "bootAfterCreate": self.power_state == PowerState::Running,
            "tags": self.tags,
        })
    }

    /// Parameters of `vm.set`. Disks, networks and cloud-init documents are
    /// only applied at creation.
    pub fn set_params(&self, id: &str) -> Value {
        json!({
            "id": id,
            "name_label": self.name_label,
            "name_description": self.name_description,
            "CPUs": self.cpus,
            "memoryMin": self.memory_min,
            "memoryMax": self.memory_max,
            "tags": self.tags,
        })
    }

    /// Outputs recorded in state and handed to post-create hooks
    pub fn outputs(&self, id: &str) -> ResourceOutputs {
        let mut outputs = ResourceOutputs::new();
        outputs.insert("id".to_string(), json!(id));
        outputs.insert("nameLabel".to_string(), json!(self.name_label));
        outputs.insert("cpus".to_string(), json!(self.cpus));
        outputs.insert("memoryMin".to_string(), json!(self.memory_min));
        outputs.insert("memoryMax".to_string(), json!(self.memory_max));
        outputs.insert("powerState".to_string(), json!(self.power_state));
        let macs: Vec<&str> = self
            .networks
            .iter()
            .filter_map(|n| n.mac_address.as_deref())
            .collect();
        if !macs.is_empty() {
            outputs.insert("macAddresses".to_string(), json!(macs));
        }
        outputs
    }
}
