//! Plain and secret-tagged configuration values
//!
//! Keys are namespaced with a colon (`xenorchestra:url`). A key without a
//! namespace belongs to the stack itself.

use crate::error::{ConfigError, Result};
use crate::secret::{Secret, SecretsCipher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value as it is written in the stack file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Encrypted value, stored as `{ secure: <base64> }`
    Secure { secure: String },
    Plain(serde_yaml::Value),
}

impl ConfigValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(serde_yaml::Value::String(value.into()))
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secure { .. })
    }

    fn as_plain_string(&self) -> Option<String> {
        match self {
            Self::Plain(serde_yaml::Value::String(s)) => Some(s.clone()),
            Self::Plain(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
            Self::Plain(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Read access to the stack's configuration values
pub struct StackConfig {
    values: BTreeMap<String, ConfigValue>,
    cipher: Option<SecretsCipher>,
}

impl StackConfig {
    pub fn new(values: BTreeMap<String, ConfigValue>, cipher: Option<SecretsCipher>) -> Self {
        Self { values, cipher }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(ConfigValue::is_secret)
    }

    /// Get a plain value. Secret values are never returned here.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ConfigValue::Secure { .. }) => {
                Err(ConfigError::SecretAccessedAsPlain(key.to_string()))
            }
            Some(value) => value.as_plain_string().map(Some).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "expected a string, number or boolean".to_string(),
                }
            }),
        }
    }

    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)?
            .map(|raw| {
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected true or false, got '{}'", raw),
                })
            })
            .transpose()
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)?
            .map(|raw| {
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected a non-negative integer, got '{}'", raw),
                })
            })
            .transpose()
    }

    /// Decrypt a secret value.
    ///
    /// A plain value under a secret key is rejected so that a token pasted
    /// in clear is noticed instead of silently used.
    pub fn require_secret(&self, key: &str) -> Result<Secret> {
        match self.values.get(key) {
            None => Err(ConfigError::MissingKey(key.to_string())),
            Some(ConfigValue::Secure { secure }) => {
                let cipher = self.cipher.as_ref().ok_or(ConfigError::SecretsKeyMissing)?;
                cipher.decrypt(key, secure)
            }
            Some(_) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "stored in clear; set it with `xenflow config set --secret`".to_string(),
            }),
        }
    }

    pub fn namespace<'a>(&'a self, name: &'a str) -> Namespace<'a> {
        Namespace { config: self, name }
    }
}

/// View over the keys of one namespace
pub struct Namespace<'a> {
    config: &'a StackConfig,
    name: &'a str,
}

impl Namespace<'_> {
    pub fn key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.config.get(&self.key(key))
    }

    pub fn require(&self, key: &str) -> Result<String> {
        self.config.require(&self.key(key))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.config.get_bool(&self.key(key))
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.config.get_u64(&self.key(key))
    }

    pub fn require_secret(&self, key: &str) -> Result<Secret> {
        self.config.require_secret(&self.key(key))
    }
}
