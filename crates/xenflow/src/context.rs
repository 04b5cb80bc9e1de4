//! Stack file, config and state locations for the current project

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xenflow_cloud::{CloudProvider, Stack, StateManager};
use xenflow_cloud_xo::{XenOrchestraProvider, XoSettings};
use xenflow_config::{SecretsCipher, StackConfig, StackFile};

pub struct Project {
    /// The stack file that was loaded
    pub path: PathBuf,
    /// Directory holding `.xenflow/state.json`
    pub root: PathBuf,
    pub stack: StackFile,
}

impl Project {
    pub fn load() -> anyhow::Result<Self> {
        let path = xenflow_config::find_stack_file()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let stack = StackFile::load(path)?;
        let root = project_root(path);
        tracing::debug!(stack = %stack.name, root = %root.display(), "Loaded project");
        Ok(Self {
            path: path.to_path_buf(),
            root,
            stack,
        })
    }

    /// Config accessor able to read plain values only
    pub fn plain_config(&self) -> StackConfig {
        self.stack.config(None)
    }

    /// Config accessor able to decrypt secrets; needs `XENFLOW_SECRETS_KEY`
    pub fn secret_config(&self) -> anyhow::Result<StackConfig> {
        let cipher = SecretsCipher::from_env()?;
        Ok(self.stack.config(Some(cipher)))
    }

    pub fn state_manager(&self) -> StateManager {
        StateManager::new(&self.root)
    }

    /// Xen Orchestra settings plus a stack backed by the provider
    pub async fn open_stack(&self, config: &StackConfig) -> anyhow::Result<(Stack, XoSettings)> {
        let settings = XoSettings::from_config(config)?;
        let factory = Arc::new(settings.transport_factory()?);
        let provider: Arc<dyn CloudProvider> =
            Arc::new(XenOrchestraProvider::new(factory, settings.token.clone()));

        let stack = Stack::open(&self.stack.name, provider, self.state_manager())
            .await
            .with_context(|| format!("failed to open stack '{}'", self.stack.name))?;
        Ok((stack, settings))
    }
}

/// The state directory lives next to the stack file, or next to the
/// `.xenflow/` directory holding it
fn project_root(stack_path: &Path) -> PathBuf {
    let parent = stack_path.parent().unwrap_or_else(|| Path::new("."));
    match parent.file_name() {
        Some(name) if name == ".xenflow" => parent.parent().unwrap_or(parent).to_path_buf(),
        _ => parent.to_path_buf(),
    }
}
