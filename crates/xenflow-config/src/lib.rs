pub mod error;
pub mod machine;
pub mod secret;
pub mod size;
pub mod stack;
pub mod values;

pub use error::*;
pub use machine::{Addressing, DiskSpec, Firmware, MachineSpec, MemorySpec, NetworkSpec, OsFamily};
pub use secret::{SECRETS_KEY_ENV, Secret, SecretsCipher};
pub use size::ByteSize;
pub use stack::StackFile;
pub use values::{ConfigValue, Namespace, StackConfig};

use std::path::PathBuf;

/// Environment variable pointing directly at a stack file
pub const STACK_PATH_ENV: &str = "XENFLOW_STACK_PATH";

const STACK_FILE_CANDIDATES: [&str; 4] = [
    "xenflow.local.yaml",
    ".xenflow.local.yaml",
    "xenflow.yaml",
    ".xenflow.yaml",
];

/// Get the xenflow config directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("xenflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the stack file for the current project
///
/// Search order:
/// 1. `XENFLOW_STACK_PATH` (direct path)
/// 2. current directory: xenflow.local.yaml, .xenflow.local.yaml, xenflow.yaml, .xenflow.yaml
/// 3. `./.xenflow/` with the same order
/// 4. `~/.config/xenflow/xenflow.yaml`
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(stack_path) = std::env::var(STACK_PATH_ENV) {
        let path = PathBuf::from(stack_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "XENFLOW_STACK_PATH does not exist, searching instead");
    }

    let current_dir = std::env::current_dir()?;

    for filename in &STACK_FILE_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".xenflow");
    if project_dir.is_dir() {
        for filename in &STACK_FILE_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("xenflow").join("xenflow.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("xenflow.yaml"), "name: lab\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("xenflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("xenflow.yaml"), "name: shared\n").unwrap();
        fs::write(temp_dir.path().join("xenflow.local.yaml"), "name: mine\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("xenflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".xenflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("xenflow.yaml"), "name: lab\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_stack_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".xenflow/xenflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stack_path = temp_dir.path().join("custom.yaml");
        fs::write(&stack_path, "name: custom\n").unwrap();

        unsafe {
            std::env::set_var(STACK_PATH_ENV, stack_path.to_str().unwrap());
        }

        let result = find_stack_file();

        unsafe {
            std::env::remove_var(STACK_PATH_ENV);
        }

        assert_eq!(result.unwrap(), stack_path);
    }
}
