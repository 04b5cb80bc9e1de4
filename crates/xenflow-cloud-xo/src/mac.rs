//! MAC addresses under the XenSource OUI

use crate::error::{Result, XoError};
use std::str::FromStr;
use xenflow_cloud::RandomSource;

/// XenSource, Inc. organizationally unique identifier
pub const XEN_OUI: [u8; 3] = [0x00, 0x16, 0x3e];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn has_xen_oui(&self) -> bool {
        self.0[..3] == XEN_OUI
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = XoError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || XoError::InvalidConfig(format!("invalid MAC address: {}", s));
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

/// MAC for the VIF seeded by `name`: the Xen OUI followed by three random
/// bytes that are persisted under that name, so re-runs keep the address.
pub fn generate_xen_mac(random: &mut impl RandomSource, name: &str) -> Result<MacAddress> {
    let bytes = random
        .random_bytes(name, 3)
        .map_err(|e| XoError::InvalidConfig(format!("random bytes for '{}': {}", name, e)))?;
    let [d, e, f] = <[u8; 3]>::try_from(bytes.as_slice())
        .map_err(|_| XoError::InvalidConfig(format!("expected 3 random bytes for '{}'", name)))?;

    let [a, b, c] = XEN_OUI;
    Ok(MacAddress([a, b, c, d, e, f]))
}
