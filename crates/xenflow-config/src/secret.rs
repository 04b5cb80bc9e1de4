//! Secret values and their encryption at rest
//!
//! Secret-tagged stack values are stored as `{ secure: <base64> }` where the
//! payload is a 12-byte AES-GCM nonce followed by the ciphertext. The key is
//! 32 random bytes, base64 encoded, read from `XENFLOW_SECRETS_KEY`.
//!
//! Decrypted values only ever live inside [`Secret`], whose `Debug` and
//! `Display` never print the value.

use crate::error::{ConfigError, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Environment variable holding the base64 encoded secrets key
pub const SECRETS_KEY_ENV: &str = "XENFLOW_SECRETS_KEY";

const NONCE_LEN: usize = 12;

/// An opaque secret string
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the plaintext. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([secret])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[secret]")
    }
}

/// AES-256-GCM cipher for secret stack values
pub struct SecretsCipher {
    cipher: Aes256Gcm,
}

impl SecretsCipher {
    pub fn from_base64_key(key: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(key.trim())
            .map_err(|e| ConfigError::InvalidSecretsKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|_| {
            ConfigError::InvalidSecretsKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { cipher })
    }

    /// Build the cipher from `XENFLOW_SECRETS_KEY`
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(SECRETS_KEY_ENV).map_err(|_| ConfigError::SecretsKeyMissing)?;
        Self::from_base64_key(&key)
    }

    /// Generate a fresh base64 encoded key
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(OsRng))
    }

    pub fn encrypt(&self, secret: &Secret) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, secret.expose().as_bytes())
            .map_err(|_| ConfigError::Encrypt)?;

        let mut payload = nonce.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Decrypt a stored value; `key` only names the value in errors
    pub fn decrypt(&self, key: &str, encoded: &str) -> Result<Secret> {
        let payload = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ConfigError::Decrypt(key.to_string()))?;
        if payload.len() <= NONCE_LEN {
            return Err(ConfigError::Decrypt(key.to_string()));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ConfigError::Decrypt(key.to_string()))?;

        String::from_utf8(plaintext)
            .map(Secret)
            .map_err(|_| ConfigError::Decrypt(key.to_string()))
    }
}
