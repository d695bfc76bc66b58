//! The module-loading seam.
//!
//! Resolving a file or reference to a live unit is the only place the
//! registry touches plugin-provided code. Everything above this trait works
//! with paths and cached metadata.

use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, bail},
    async_trait::async_trait,
    tendril_common::hooks::{Hook, HookRef},
    tendril_config::Dialect,
};

use crate::{
    command::Command,
    dialect,
    entry::{ExecPluginsEntry, MarkdownPluginsEntry, PluginsEntry},
    manifest::ManifestCommand,
    shell_hook::ShellHook,
};

/// Loads commands, hooks, and programmatic entry points.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load the command module at `path`. The identifier is assigned by the
    /// caller.
    async fn load_command(&self, path: &Path) -> anyhow::Result<Box<dyn Command>>;

    /// Load the hook module named by `hook`.
    async fn load_hook(&self, hook: &HookRef) -> anyhow::Result<Arc<dyn Hook>>;

    /// Load the programmatic sub-plugin entry point at `path`.
    async fn load_plugins_entry(&self, path: &Path) -> anyhow::Result<Arc<dyn PluginsEntry>>;
}

/// Loads TOML and Markdown sources from disk.
///
/// Markdown sources are refused until the dialect has been registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModuleLoader;

fn ensure_dialect(path: &Path) -> anyhow::Result<Dialect> {
    let Some(dialect) = Dialect::from_path(path) else {
        bail!("unsupported command source {}", path.display());
    };
    if dialect.is_secondary() && !dialect::is_registered() {
        bail!(
            "{} is in the {dialect} dialect, which is not registered",
            path.display()
        );
    }
    Ok(dialect)
}

#[async_trait]
impl ModuleLoader for FsModuleLoader {
    async fn load_command(&self, path: &Path) -> anyhow::Result<Box<dyn Command>> {
        let dialect = ensure_dialect(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read command {}", path.display()))?;
        Ok(Box::new(ManifestCommand::parse(&content, path, dialect)?))
    }

    async fn load_hook(&self, hook: &HookRef) -> anyhow::Result<Arc<dyn Hook>> {
        Ok(Arc::new(ShellHook::resolve(hook).await?))
    }

    async fn load_plugins_entry(&self, path: &Path) -> anyhow::Result<Arc<dyn PluginsEntry>> {
        match Dialect::from_path(path) {
            Some(Dialect::Markdown) => {
                ensure_dialect(path)?;
                let content = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read entry point {}", path.display()))?;
                Ok(Arc::new(MarkdownPluginsEntry::parse(&content, path)?))
            },
            _ => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    bail!("entry point {} does not exist", path.display());
                }
                Ok(Arc::new(ExecPluginsEntry::new(path)))
            },
        }
    }
}
