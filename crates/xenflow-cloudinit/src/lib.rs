//! Cloud-init documents for xenflow guests
//!
//! Every document is built as a typed struct and serialized with
//! `serde_yaml`, so hostnames and passwords are always quoted as needed and
//! the same input renders to the same bytes.
//!
//! - [`ubuntu`]: netplan v2 metadata keyed by interface name, userdata with a
//!   hashed sudo user
//! - [`windows`]: metadata keyed by MAC address, userdata for the
//!   Administrator account

pub mod error;
pub mod network;
pub mod ubuntu;
pub mod windows;

pub use error::{CloudInitError, Result};
pub use network::{Ethernet, NetworkConfig, StaticAddressing};

use serde::Serialize;

/// First line of every rendered document
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// Serialize a document behind the `#cloud-config` header
pub fn to_cloud_config<T: Serialize>(document: &T) -> Result<String> {
    let body = serde_yaml::to_string(document)?;
    let mut out = String::with_capacity(CLOUD_CONFIG_HEADER.len() + body.len());
    out.push_str(CLOUD_CONFIG_HEADER);
    out.push_str(&body);
    Ok(out)
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CloudInitError::EmptyField(field));
    }
    Ok(())
}
