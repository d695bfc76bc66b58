use std::path::{Path, PathBuf};

use {async_trait::async_trait, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::{Descriptor, PluginType},
};

/// Standard descriptor file names, checked in order.
const DESCRIPTOR_FILENAMES: &[&str] = &["plugin.toml", "plugin.yaml", "plugin.yml", "plugin.json"];

/// Reads plugin descriptors. The engine treats this as a black box.
#[async_trait]
pub trait DescriptorReader: Send + Sync {
    async fn read(&self, root: &Path, plugin_type: PluginType) -> anyhow::Result<Descriptor>;
}

/// Reads `plugin.{toml,yaml,yml,json}` from the plugin root.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDescriptorReader;

#[async_trait]
impl DescriptorReader for FsDescriptorReader {
    async fn read(&self, root: &Path, plugin_type: PluginType) -> anyhow::Result<Descriptor> {
        let root = root.to_path_buf();
        let descriptor =
            tokio::task::spawn_blocking(move || load_descriptor(&root)).await??;
        debug!(
            plugin = %descriptor.name,
            version = %descriptor.version,
            r#type = %plugin_type,
            "read plugin descriptor"
        );
        Ok(descriptor)
    }
}

/// Find the first descriptor file in `root`.
pub fn find_descriptor(root: &Path) -> Option<PathBuf> {
    DESCRIPTOR_FILENAMES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.is_file())
}

/// Load the descriptor at `root` (any supported format).
///
/// The returned descriptor's `root` is the canonical form of `root` when it
/// can be resolved, `root` as given otherwise.
pub fn load_descriptor(root: &Path) -> Result<Descriptor> {
    let path = find_descriptor(root).ok_or_else(|| Error::DescriptorNotFound {
        root: root.to_path_buf(),
    })?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut descriptor = parse_descriptor(&raw, &path)?;
    descriptor.root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    Ok(descriptor)
}

fn parse_descriptor(raw: &str, path: &Path) -> Result<Descriptor> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::invalid_descriptor(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::invalid_descriptor(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::invalid_descriptor(path, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
