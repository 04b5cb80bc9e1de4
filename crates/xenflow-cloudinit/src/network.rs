//! Netplan v2 network configuration

use crate::error::{CloudInitError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Static addressing for a single interface
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAddressing {
    /// CIDR, e.g. `10.10.20.2/24`
    pub address: String,
    pub gateway: String,
    pub nameservers: Vec<String>,
}

impl StaticAddressing {
    pub fn validate(&self) -> Result<()> {
        let (ip, prefix) = self
            .address
            .split_once('/')
            .ok_or_else(|| invalid("address", &self.address))?;
        let ip: IpAddr = ip.parse().map_err(|_| invalid("address", &self.address))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("address", &self.address))?;
        let max_prefix = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > max_prefix {
            return Err(invalid("address", &self.address));
        }

        self.gateway
            .parse::<IpAddr>()
            .map_err(|_| invalid("gateway", &self.gateway))?;
        for ns in &self.nameservers {
            ns.parse::<IpAddr>().map_err(|_| invalid("nameserver", ns))?;
        }
        Ok(())
    }
}

fn invalid(field: &'static str, value: &str) -> CloudInitError {
    CloudInitError::InvalidAddress {
        field,
        value: value.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkConfig {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    pub ethernets: BTreeMap<String, Ethernet>,
}

impl NetworkConfig {
    pub fn single(renderer: Option<&str>, id: &str, ethernet: Ethernet) -> Self {
        let mut ethernets = BTreeMap::new();
        ethernets.insert(id.to_string(), ethernet);
        Self {
            version: 2,
            renderer: renderer.map(str::to_string),
            ethernets,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ethernet {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<MatchSpec>,
    pub dhcp4: bool,
    pub dhcp6: bool,
    pub addresses: Vec<String>,
    pub routes: Vec<Route>,
    pub nameservers: Nameservers,
}

impl Ethernet {
    /// Static interface with a default route. `default_to` is the route
    /// destination: `default` for netplan, `0.0.0.0/0` for cloudbase-init.
    pub fn fixed(addressing: &StaticAddressing, default_to: &str) -> Self {
        Self {
            match_: None,
            dhcp4: false,
            dhcp6: false,
            addresses: vec![addressing.address.clone()],
            routes: vec![Route {
                to: default_to.to_string(),
                via: addressing.gateway.clone(),
            }],
            nameservers: Nameservers {
                addresses: addressing.nameservers.clone(),
            },
        }
    }

    pub fn matching_mac(mut self, mac: &str) -> Self {
        self.match_ = Some(MatchSpec {
            macaddress: mac.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSpec {
    pub macaddress: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub to: String,
    pub via: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Nameservers {
    pub addresses: Vec<String>,
}
