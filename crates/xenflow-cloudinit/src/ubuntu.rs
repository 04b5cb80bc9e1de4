//! Ubuntu guests: netplan metadata and userdata with a hashed sudo user

use crate::error::{CloudInitError, Result};
use crate::network::{Ethernet, NetworkConfig, StaticAddressing};
use crate::{require_non_empty, to_cloud_config};
use serde::Serialize;

const SUDO_GROUPS: &str = "sudo,adm,dip,lxd,plugdev,cdrom";
const ENTROPY_COMMAND: [&str; 2] = ["pollinate", "--server=https://entropy.ubuntu.com/"];

#[derive(Debug, Clone)]
pub struct UbuntuMetadata {
    pub instance_id: String,
    pub hostname: String,
    /// Guest interface name, e.g. `enX0`
    pub interface: String,
    pub addressing: StaticAddressing,
}

#[derive(Debug, Clone)]
pub struct UbuntuUserdata {
    pub hostname: String,
    pub domain: Option<String>,
    pub username: String,
    /// crypt(3) hash; plaintext is rejected
    pub hashed_password: String,
    pub timezone: String,
}

#[derive(Serialize)]
struct MetadataDocument<'a> {
    #[serde(rename = "instance-id")]
    instance_id: &'a str,
    #[serde(rename = "local-hostname")]
    local_hostname: &'a str,
    network: NetworkConfig,
}

#[derive(Serialize)]
struct UserdataDocument<'a> {
    hostname: &'a str,
    fqdn: String,
    create_hostname_file: bool,
    manage_etc_hosts: &'static str,
    disable_root: bool,
    ssh_pwauth: bool,
    ssh_deletekeys: bool,
    users: Vec<User<'a>>,
    keyboard: Keyboard,
    package_update: bool,
    package_upgrade: bool,
    random_seed: RandomSeed,
    timezone: &'a str,
}

#[derive(Serialize)]
struct User<'a> {
    name: &'a str,
    groups: &'static str,
    shell: &'static str,
    hashed_passwd: &'a str,
    lock_passwd: bool,
}

#[derive(Serialize)]
struct Keyboard {
    layout: &'static str,
}

#[derive(Serialize)]
struct RandomSeed {
    file: &'static str,
    command: [&'static str; 2],
    command_required: bool,
}

pub fn render_metadata(input: &UbuntuMetadata) -> Result<String> {
    require_non_empty("instance_id", &input.instance_id)?;
    require_non_empty("hostname", &input.hostname)?;
    require_non_empty("interface", &input.interface)?;
    input.addressing.validate()?;

    let document = MetadataDocument {
        instance_id: &input.instance_id,
        local_hostname: &input.hostname,
        network: NetworkConfig::single(
            Some("networkd"),
            &input.interface,
            Ethernet::fixed(&input.addressing, "default"),
        ),
    };
    to_cloud_config(&document)
}

pub fn render_userdata(input: &UbuntuUserdata) -> Result<String> {
    require_non_empty("hostname", &input.hostname)?;
    require_non_empty("username", &input.username)?;
    require_non_empty("timezone", &input.timezone)?;
    if !is_crypt_hash(&input.hashed_password) {
        return Err(CloudInitError::PlaintextPassword);
    }

    let fqdn = match input.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(domain) => format!("{}.{}", input.hostname, domain),
        None => input.hostname.clone(),
    };

    let document = UserdataDocument {
        hostname: &input.hostname,
        fqdn,
        create_hostname_file: true,
        manage_etc_hosts: "localhost",
        disable_root: true,
        ssh_pwauth: false,
        ssh_deletekeys: true,
        users: vec![User {
            name: &input.username,
            groups: SUDO_GROUPS,
            shell: "/bin/bash",
            hashed_passwd: &input.hashed_password,
            lock_passwd: false,
        }],
        keyboard: Keyboard { layout: "us" },
        package_update: true,
        package_upgrade: true,
        random_seed: RandomSeed {
            file: "/dev/urandom",
            command: ENTROPY_COMMAND,
            command_required: false,
        },
        timezone: &input.timezone,
    };
    to_cloud_config(&document)
}

/// `$id$...$hash` as produced by mkpasswd/crypt(3)
fn is_crypt_hash(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('$') else {
        return false;
    };
    let parts: Vec<&str> = rest.split('$').collect();
    parts.len() >= 3
        && !parts[0].is_empty()
        && parts.last().is_some_and(|hash| !hash.is_empty())
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    const HASH: &str = "$y$j9T$0cJk3XnzKQ9e$R3mA5mQ2b0fFQ7x1YkQ1x3oQ0eZz9R1m5mN8o2p3q4.";

    fn metadata(hostname: &str) -> UbuntuMetadata {
        UbuntuMetadata {
            instance_id: format!("{}.internal.domain", hostname),
            hostname: hostname.to_string(),
            interface: "enX0".to_string(),
            addressing: StaticAddressing {
                address: "10.10.20.2/24".to_string(),
                gateway: "10.10.20.254".to_string(),
                nameservers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            },
        }
    }

    fn userdata(hostname: &str) -> UbuntuUserdata {
        UbuntuUserdata {
            hostname: hostname.to_string(),
            domain: Some("internal.domain".to_string()),
            username: "initialuser".to_string(),
            hashed_password: HASH.to_string(),
            timezone: "Europe/Paris".to_string(),
        }
    }

    fn parse(doc: &str) -> Value {
        assert!(doc.starts_with("#cloud-config\n"));
        serde_yaml::from_str(doc).unwrap()
    }

    #[test]
    fn test_metadata_contains_identity_and_network() {
        let doc = render_metadata(&metadata("pulumi-ubuntu2404")).unwrap();
        let value = parse(&doc);

        assert_eq!(value["instance-id"].as_str(), Some("pulumi-ubuntu2404.internal.domain"));
        assert_eq!(value["local-hostname"].as_str(), Some("pulumi-ubuntu2404"));
        assert_eq!(value["network"]["version"].as_u64(), Some(2));
        assert_eq!(value["network"]["renderer"].as_str(), Some("networkd"));

        let eth = &value["network"]["ethernets"]["enX0"];
        assert_eq!(eth["addresses"][0].as_str(), Some("10.10.20.2/24"));
        assert_eq!(eth["routes"][0]["to"].as_str(), Some("default"));
        assert_eq!(eth["nameservers"]["addresses"][1].as_str(), Some("1.1.1.1"));
    }

    #[test]
    fn test_userdata_fields() {
        let doc = render_userdata(&userdata("pulumi-ubuntu2404")).unwrap();
        let value = parse(&doc);

        assert_eq!(value["fqdn"].as_str(), Some("pulumi-ubuntu2404.internal.domain"));
        assert_eq!(value["manage_etc_hosts"].as_str(), Some("localhost"));
        assert_eq!(value["ssh_pwauth"].as_bool(), Some(false));
        assert_eq!(value["users"][0]["name"].as_str(), Some("initialuser"));
        assert_eq!(value["users"][0]["hashed_passwd"].as_str(), Some(HASH));
        assert_eq!(value["users"][0]["lock_passwd"].as_bool(), Some(false));
        assert_eq!(value["random_seed"]["command_required"].as_bool(), Some(false));
        assert_eq!(value["random_seed"]["command"][0].as_str(), Some("pollinate"));
        assert_eq!(value["timezone"].as_str(), Some("Europe/Paris"));
    }

    #[test]
    fn test_hostile_hostname_stays_structural() {
        let hostile = "web\": 01\nruncmd: [reboot]";
        let meta = parse(&render_metadata(&metadata(hostile)).unwrap());
        let user = parse(&render_userdata(&userdata(hostile)).unwrap());

        assert_eq!(meta["local-hostname"].as_str(), Some(hostile));
        assert_eq!(user["hostname"].as_str(), Some(hostile));
        assert!(user.get("runcmd").is_none());
        assert!(meta.get("runcmd").is_none());
    }

    #[test]
    fn test_hostname_with_colon() {
        let user = parse(&render_userdata(&userdata("db: primary")).unwrap());
        assert_eq!(user["hostname"].as_str(), Some("db: primary"));
        assert_eq!(user["fqdn"].as_str(), Some("db: primary.internal.domain"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let first = render_userdata(&userdata("a")).unwrap();
        let second = render_userdata(&userdata("a")).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            render_metadata(&metadata("a")).unwrap(),
            render_metadata(&metadata("a")).unwrap()
        );
    }

    #[test]
    fn test_plaintext_password_rejected() {
        let mut input = userdata("host");
        input.hashed_password = "correct horse battery staple".to_string();
        assert!(matches!(render_userdata(&input), Err(CloudInitError::PlaintextPassword)));

        input.hashed_password = "$6$".to_string();
        assert!(matches!(render_userdata(&input), Err(CloudInitError::PlaintextPassword)));
    }

    #[test]
    fn test_fqdn_without_domain() {
        let mut input = userdata("solo");
        input.domain = None;
        let user = parse(&render_userdata(&input).unwrap());
        assert_eq!(user["fqdn"].as_str(), Some("solo"));
    }

    #[test]
    fn test_empty_instance_id_rejected() {
        let mut input = metadata("host");
        input.instance_id = " ".to_string();
        assert!(matches!(
            render_metadata(&input),
            Err(CloudInitError::EmptyField("instance_id"))
        ));
    }
}
