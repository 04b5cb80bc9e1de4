use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Stack file not found. Looked in:\n\
        - current directory: xenflow.local.yaml, xenflow.yaml\n\
        - ./.xenflow/ directory\n\
        - ~/.config/xenflow/xenflow.yaml\n\
        Set XENFLOW_STACK_PATH to point at a stack file directly"
    )]
    StackFileNotFound,

    #[error("Failed to parse stack file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required configuration value: {0}")]
    MissingKey(String),

    #[error("Configuration value '{0}' is secret; read it with require_secret")]
    SecretAccessedAsPlain(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid byte size '{0}' (expected bytes or a KiB/MiB/GiB/TiB suffix)")]
    InvalidByteSize(String),

    #[error("Machine not found in stack: {0}")]
    UnknownMachine(String),

    #[error("Machine '{0}' is declared more than once")]
    DuplicateMachine(String),

    #[error("Secrets key not set; export XENFLOW_SECRETS_KEY (see `xenflow config gen-key`)")]
    SecretsKeyMissing,

    #[error("Invalid secrets key: {0}")]
    InvalidSecretsKey(String),

    #[error("Failed to decrypt '{0}': wrong key or corrupted value")]
    Decrypt(String),

    #[error("Failed to encrypt secret value")]
    Encrypt,

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
