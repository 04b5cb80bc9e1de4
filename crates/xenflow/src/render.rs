//! Cloud-init documents for a declared machine

use anyhow::{Context, bail};
use xenflow_cloud_xo::MacAddress;
use xenflow_cloudinit::{StaticAddressing, ubuntu, windows};
use xenflow_config::{MachineSpec, OsFamily, Secret, StackConfig};

/// Key of the Windows ethernet entry; the guest matches it by MAC
const WINDOWS_INTERFACE_KEY: &str = "admin";

fn addressing(machine: &MachineSpec) -> StaticAddressing {
    StaticAddressing {
        address: machine.addressing.address.clone(),
        gateway: machine.addressing.gateway.clone(),
        nameservers: machine.addressing.nameservers.clone(),
    }
}

/// Network metadata. Windows guests need the generated MAC.
pub fn render_metadata(machine: &MachineSpec, mac: Option<MacAddress>) -> anyhow::Result<String> {
    let instance_id = machine.name_label();
    let rendered = match machine.os {
        OsFamily::Ubuntu => ubuntu::render_metadata(&ubuntu::UbuntuMetadata {
            instance_id,
            hostname: machine.hostname.clone(),
            interface: machine.interface_name().to_string(),
            addressing: addressing(machine),
        }),
        OsFamily::Windows => {
            let Some(mac) = mac else {
                bail!(
                    "machine '{}' is a Windows guest and needs network.generate_mac: true",
                    machine.name
                );
            };
            windows::render_metadata(&windows::WindowsMetadata {
                instance_id,
                interface: WINDOWS_INTERFACE_KEY.to_string(),
                mac_address: mac.octets(),
                addressing: addressing(machine),
            })
        }
    };
    rendered.with_context(|| format!("failed to render metadata for '{}'", machine.name))
}

/// Userdata. The result embeds the guest password (a crypt hash for Ubuntu,
/// plaintext for Windows), so it only ever leaves here as a [`Secret`].
pub fn render_userdata(machine: &MachineSpec, config: &StackConfig) -> anyhow::Result<Secret> {
    let password = config.require_secret(&machine.password_key)?;
    let rendered = match machine.os {
        OsFamily::Ubuntu => ubuntu::render_userdata(&ubuntu::UbuntuUserdata {
            hostname: machine.hostname.clone(),
            domain: machine.domain.clone(),
            username: machine.username.clone(),
            hashed_password: password.expose().to_string(),
            timezone: machine.timezone.clone(),
        }),
        OsFamily::Windows => windows::render_userdata(&windows::WindowsUserdata {
            hostname: machine.hostname.clone(),
            timezone: machine.timezone.clone(),
            password: password.expose().to_string(),
        }),
    };
    let rendered =
        rendered.with_context(|| format!("failed to render userdata for '{}'", machine.name))?;
    Ok(Secret::new(rendered))
}
