//! The stack file: configuration values plus machine declarations

use crate::error::{ConfigError, Result};
use crate::machine::MachineSpec;
use crate::secret::SecretsCipher;
use crate::values::{ConfigValue, StackConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFile {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
    #[serde(default)]
    pub machines: Vec<MachineSpec>,
}

impl StackFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let stack: StackFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        stack.validate()?;
        tracing::debug!(path = %path.display(), machines = stack.machines.len(), "Loaded stack file");
        Ok(stack)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let stack: StackFile = serde_yaml::from_str(content)?;
        stack.validate()?;
        Ok(stack)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for machine in &self.machines {
            if !seen.insert(machine.name.as_str()) {
                return Err(ConfigError::DuplicateMachine(machine.name.clone()));
            }
        }
        Ok(())
    }

    pub fn machine(&self, name: &str) -> Result<&MachineSpec> {
        self.machines
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ConfigError::UnknownMachine(name.to_string()))
    }

    /// Machines to act on: one by name, or all of them
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&MachineSpec>> {
        match name {
            Some(name) => Ok(vec![self.machine(name)?]),
            None => Ok(self.machines.iter().collect()),
        }
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.config.insert(key.into(), value);
    }

    /// Build the read accessor. `cipher` is only needed to read secrets.
    pub fn config(&self, cipher: Option<SecretsCipher>) -> StackConfig {
        StackConfig::new(self.config.clone(), cipher)
    }
}
