use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudInitError {
    #[error("Required field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("Linux password must be a crypt(3) hash (e.g. `mkpasswd --method=yescrypt`), not plaintext")]
    PlaintextPassword,

    #[error("Windows hostname '{hostname}' is longer than {max} characters")]
    HostnameTooLong { hostname: String, max: usize },

    #[error("Invalid {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CloudInitError>;
