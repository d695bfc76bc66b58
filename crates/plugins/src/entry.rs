//! Programmatic sub-plugin entry points.
//!
//! An entry point lists child plugin roots at load time. Each child is then
//! loaded through the tree loader, so children get the full treatment
//! (descriptor, dialect registration, their own sub-plugins).

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use {
    anyhow::{Context, bail},
    async_trait::async_trait,
    futures::future::join_all,
    serde::{Deserialize, Serialize},
    tendril_config::{Descriptor, PluginType},
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::{debug, warn},
};

use crate::{frontmatter, plugin::Plugin};

/// One child listed by an entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub root: PathBuf,
    #[serde(default, rename = "type")]
    pub plugin_type: Option<PluginType>,
}

/// Callback into the tree loader for one child root.
#[async_trait]
pub trait ChildLoader: Send + Sync {
    async fn load_child(
        &self,
        root: PathBuf,
        plugin_type: PluginType,
    ) -> crate::Result<Arc<Plugin>>;
}

/// A loaded programmatic entry point.
#[async_trait]
pub trait PluginsEntry: Send + Sync {
    /// The children this entry point contributes for the plugin described by
    /// `descriptor`.
    async fn plugins(
        &self,
        descriptor: &Descriptor,
        plugin_type: PluginType,
        loader: &dyn ChildLoader,
    ) -> anyhow::Result<Vec<Arc<Plugin>>>;
}

/// Load every listed child concurrently. Failures are logged and dropped.
pub async fn load_children(
    specs: Vec<ChildSpec>,
    descriptor: &Descriptor,
    parent_type: PluginType,
    loader: &dyn ChildLoader,
) -> Vec<Arc<Plugin>> {
    let tasks = specs.into_iter().map(|spec| {
        let root = descriptor.root.join(&spec.root);
        let plugin_type = spec.plugin_type.unwrap_or(parent_type);
        async move {
            let result = loader.load_child(root.clone(), plugin_type).await;
            (root, result)
        }
    });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|(root, result)| match result {
            Ok(plugin) => Some(plugin),
            Err(e) => {
                warn!(
                    parent = %descriptor.name,
                    root = %root.display(),
                    error = %e,
                    "failed to load child plugin"
                );
                None
            },
        })
        .collect()
}

// ── Executable entry ────────────────────────────────────────────────────────

/// An executable that receives the descriptor as JSON on stdin and prints a
/// JSON array of [`ChildSpec`].
#[derive(Debug, Clone)]
pub struct ExecPluginsEntry {
    path: PathBuf,
}

impl ExecPluginsEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn list(&self, descriptor: &Descriptor) -> anyhow::Result<Vec<ChildSpec>> {
        let input = serde_json::to_vec(descriptor)?;

        let mut child = Command::new(&self.path)
            .current_dir(&descriptor.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn entry point {}", self.path.display()))?;

        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(&input).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(e.into());
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("entry point {} failed", self.path.display()))?;

        if !output.status.success() {
            bail!(
                "entry point {} exited with code {}: {}",
                self.path.display(),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout).with_context(|| {
            format!(
                "entry point {} did not print a JSON plugin list",
                self.path.display()
            )
        })
    }
}

#[async_trait]
impl PluginsEntry for ExecPluginsEntry {
    async fn plugins(
        &self,
        descriptor: &Descriptor,
        plugin_type: PluginType,
        loader: &dyn ChildLoader,
    ) -> anyhow::Result<Vec<Arc<Plugin>>> {
        let specs = self.list(descriptor).await?;
        debug!(plugin = %descriptor.name, count = specs.len(), "entry point listed children");
        Ok(load_children(specs, descriptor, plugin_type, loader).await)
    }
}

// ── Markdown entry ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct EntryFrontmatter {
    #[serde(default)]
    plugins: Vec<ChildSpec>,
}

/// A Markdown file whose frontmatter lists children under `plugins`.
#[derive(Debug, Clone)]
pub struct MarkdownPluginsEntry {
    specs: Vec<ChildSpec>,
}

impl MarkdownPluginsEntry {
    pub fn parse(content: &str, path: &Path) -> crate::Result<Self> {
        let parsed = frontmatter::parse::<EntryFrontmatter>(content, path)?;
        Ok(Self {
            specs: parsed.metadata.plugins,
        })
    }

    pub fn specs(&self) -> &[ChildSpec] {
        &self.specs
    }
}

#[async_trait]
impl PluginsEntry for MarkdownPluginsEntry {
    async fn plugins(
        &self,
        descriptor: &Descriptor,
        plugin_type: PluginType,
        loader: &dyn ChildLoader,
    ) -> anyhow::Result<Vec<Arc<Plugin>>> {
        Ok(load_children(self.specs.clone(), descriptor, plugin_type, loader).await)
    }
}
