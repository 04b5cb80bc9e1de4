//! Windows guests (cloudbase-init)
//!
//! Interface names inside a Windows guest are not known ahead of time, so
//! the network entry is selected by MAC address instead.

use crate::error::{CloudInitError, Result};
use crate::network::{Ethernet, NetworkConfig, StaticAddressing};
use crate::{require_non_empty, to_cloud_config};
use serde::Serialize;

/// NetBIOS computer name limit
pub const MAX_HOSTNAME_LEN: usize = 15;

#[derive(Debug, Clone)]
pub struct WindowsMetadata {
    pub instance_id: String,
    /// Key of the ethernet entry, e.g. `admin`
    pub interface: String,
    /// Octets of the VIF MAC; rendered lowercase, colon separated
    pub mac_address: [u8; 6],
    pub addressing: StaticAddressing,
}

#[derive(Debug, Clone)]
pub struct WindowsUserdata {
    pub hostname: String,
    pub timezone: String,
    /// Plaintext Administrator password; cloudbase-init cannot take a hash
    pub password: String,
}

#[derive(Serialize)]
struct MetadataDocument<'a> {
    #[serde(rename = "instance-id")]
    instance_id: &'a str,
    network: NetworkConfig,
}

#[derive(Serialize)]
struct UserdataDocument<'a> {
    set_hostname: &'a str,
    set_timezone: &'a str,
    users: [Administrator<'a>; 1],
}

#[derive(Serialize)]
struct Administrator<'a> {
    name: &'static str,
    passwd: &'a str,
}

pub fn render_metadata(input: &WindowsMetadata) -> Result<String> {
    require_non_empty("instance_id", &input.instance_id)?;
    require_non_empty("interface", &input.interface)?;
    input.addressing.validate()?;

    let mac = input
        .mac_address
        .iter()
        .map(|octet| format!("{:02x}", octet))
        .collect::<Vec<_>>()
        .join(":");
    let ethernet = Ethernet::fixed(&input.addressing, "0.0.0.0/0").matching_mac(&mac);
    let document = MetadataDocument {
        instance_id: &input.instance_id,
        network: NetworkConfig::single(None, &input.interface, ethernet),
    };
    to_cloud_config(&document)
}

pub fn render_userdata(input: &WindowsUserdata) -> Result<String> {
    require_non_empty("hostname", &input.hostname)?;
    require_non_empty("timezone", &input.timezone)?;
    require_non_empty("password", &input.password)?;
    if input.hostname.chars().count() > MAX_HOSTNAME_LEN {
        return Err(CloudInitError::HostnameTooLong {
            hostname: input.hostname.clone(),
            max: MAX_HOSTNAME_LEN,
        });
    }

    let document = UserdataDocument {
        set_hostname: &input.hostname,
        set_timezone: &input.timezone,
        users: [Administrator {
            name: "Administrator",
            passwd: &input.password,
        }],
    };
    to_cloud_config(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn metadata() -> WindowsMetadata {
        WindowsMetadata {
            instance_id: "pulumi-win2022.internal.domain".to_string(),
            interface: "admin".to_string(),
            mac_address: [0x00, 0x16, 0x3e, 0x1a, 0x2b, 0x3c],
            addressing: StaticAddressing {
                address: "10.10.20.1/24".to_string(),
                gateway: "10.10.20.254".to_string(),
                nameservers: vec!["10.10.20.200".to_string(), "1.1.1.1".to_string()],
            },
        }
    }

    fn userdata(hostname: &str, password: &str) -> WindowsUserdata {
        WindowsUserdata {
            hostname: hostname.to_string(),
            timezone: "Europe/Paris".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_metadata_matches_by_mac() {
        let doc = render_metadata(&metadata()).unwrap();
        let value: Value = serde_yaml::from_str(&doc).unwrap();

        assert_eq!(value["instance-id"].as_str(), Some("pulumi-win2022.internal.domain"));
        assert!(value["network"].get("renderer").is_none());
        let admin = &value["network"]["ethernets"]["admin"];
        assert_eq!(admin["match"]["macaddress"].as_str(), Some("00:16:3e:1a:2b:3c"));
        assert_eq!(admin["routes"][0]["to"].as_str(), Some("0.0.0.0/0"));
        assert_eq!(admin["nameservers"]["addresses"][0].as_str(), Some("10.10.20.200"));
    }

    #[test]
    fn test_userdata_administrator() {
        let doc = render_userdata(&userdata("pulumi-w2022", "s3cret")).unwrap();
        let value: Value = serde_yaml::from_str(&doc).unwrap();

        assert!(doc.starts_with("#cloud-config\n"));
        assert_eq!(value["set_hostname"].as_str(), Some("pulumi-w2022"));
        assert_eq!(value["set_timezone"].as_str(), Some("Europe/Paris"));
        assert_eq!(value["users"][0]["name"].as_str(), Some("Administrator"));
        assert_eq!(value["users"][0]["passwd"].as_str(), Some("s3cret"));
    }

    #[test]
    fn test_password_with_special_characters() {
        let password = "p\"w: #1\n- evil";
        let doc = render_userdata(&userdata("win", password)).unwrap();
        let value: Value = serde_yaml::from_str(&doc).unwrap();

        assert_eq!(value["users"][0]["passwd"].as_str(), Some(password));
        assert_eq!(value["users"].as_sequence().map(Vec::len), Some(1));
    }

    #[test]
    fn test_long_hostname_rejected() {
        let result = render_userdata(&userdata("pulumi-win2022-long", "pw"));
        assert!(matches!(
            result,
            Err(CloudInitError::HostnameTooLong { max: 15, .. })
        ));
    }

    #[test]
    fn test_mac_rendered_lowercase_and_padded() {
        let mut input = metadata();
        input.mac_address = [0x00, 0x16, 0x3e, 0x0a, 0xBC, 0x01];
        let value: Value = serde_yaml::from_str(&render_metadata(&input).unwrap()).unwrap();
        assert_eq!(
            value["network"]["ethernets"]["admin"]["match"]["macaddress"].as_str(),
            Some("00:16:3e:0a:bc:01")
        );
    }
}
