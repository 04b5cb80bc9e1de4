//! Name-keyed random values persisted in the state file

use crate::error::{CloudError, Result};
use crate::state::{GlobalState, ResourceState, ResourceStatus};
use rand::RngCore;

const RANDOM_RESOURCE_TYPE: &str = "random-bytes";
const HEX_ATTRIBUTE: &str = "hex";

/// Source of random bytes that are stable for a given name.
///
/// The first request for a name generates fresh bytes; every later request
/// for the same name and length returns the same bytes.
pub trait RandomSource {
    fn random_bytes(&mut self, name: &str, len: usize) -> Result<Vec<u8>>;
}

/// State key of the random value stored for `name`
pub fn random_key(name: &str) -> String {
    format!("random:bytes:{}", name)
}

impl RandomSource for GlobalState {
    fn random_bytes(&mut self, name: &str, len: usize) -> Result<Vec<u8>> {
        let key = random_key(name);

        if let Some(existing) = self.get_resource(&key) {
            let stored: Option<String> = existing.get_attribute(HEX_ATTRIBUTE);
            if let Some(hex_value) = stored {
                let bytes = hex::decode(&hex_value).map_err(|e| {
                    CloudError::StateError(format!("corrupt random value '{}': {}", name, e))
                })?;
                if bytes.len() == len {
                    return Ok(bytes);
                }
                tracing::info!(name = %name, "Random length changed, regenerating");
            }
        }

        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);

        let resource = ResourceState::new(name, RANDOM_RESOURCE_TYPE)
            .with_status(ResourceStatus::Ready)
            .with_attribute(HEX_ATTRIBUTE, serde_json::json!(hex::encode(&bytes)));
        self.set_resource(key, resource);
        tracing::debug!(name = %name, len, "Generated random bytes");

        Ok(bytes)
    }
}
