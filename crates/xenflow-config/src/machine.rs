//! Machine declarations in the stack file

use crate::size::ByteSize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    Windows,
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Ubuntu => write!(f, "ubuntu"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Firmware {
    Bios,
    #[default]
    Uefi,
}

impl Firmware {
    pub fn as_str(&self) -> &'static str {
        match self {
            Firmware::Bios => "bios",
            Firmware::Uefi => "uefi",
        }
    }
}

/// Memory bounds. `min` defaults to `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<ByteSize>,
    pub max: ByteSize,
}

impl MemorySpec {
    pub fn min_or_max(&self) -> ByteSize {
        self.min.unwrap_or(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub name: String,
    pub size: ByteSize,
    /// Storage repository; the machine's `sr` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network name label in Xen Orchestra
    pub name: String,
    /// Attach a generated, persisted 00:16:3e MAC to the VIF
    #[serde(default)]
    pub generate_mac: bool,
    /// Guest interface name (Ubuntu netplan); `enX0` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addressing {
    /// CIDR address, e.g. `10.10.20.2/24`
    pub address: String,
    pub gateway: String,
    #[serde(default)]
    pub nameservers: Vec<String>,
}

fn default_timezone() -> String {
    "Europe/Paris".to_string()
}

fn default_username() -> String {
    "initialuser".to_string()
}

/// One VM as declared by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    pub os: OsFamily,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// VM name label in Xen Orchestra when it differs from the guest hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_label: Option<String>,
    pub pool: String,
    pub template: String,
    pub sr: String,
    pub cpus: u32,
    pub memory: MemorySpec,
    #[serde(default)]
    pub disks: Vec<DiskSpec>,
    pub network: NetworkSpec,
    pub addressing: Addressing,
    /// Stack config key of the guest password secret
    pub password_key: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Initial sudo user (Ubuntu only)
    #[serde(default = "default_username")]
    pub username: String,
    /// Attach the post-create memory fix hook
    #[serde(default)]
    pub fix_memory_after_create: bool,
    #[serde(default)]
    pub firmware: Firmware,
}

impl MachineSpec {
    /// VM name label: the explicit `name_label`, else `hostname.domain`,
    /// else the hostname alone. Also the cloud-init instance-id.
    pub fn name_label(&self) -> String {
        if let Some(label) = &self.name_label {
            return label.clone();
        }
        match &self.domain {
            Some(domain) => format!("{}.{}", self.hostname, domain),
            None => self.hostname.clone(),
        }
    }

    pub fn interface_name(&self) -> &str {
        self.network.interface.as_deref().unwrap_or("enX0")
    }

    /// Key of the persisted random bytes backing the VIF MAC
    pub fn mac_seed(&self) -> String {
        format!("{}-vif-{}", self.name_label(), self.network.name.replace('/', "-"))
    }
}
