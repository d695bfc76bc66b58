//! Command discovery: file paths to identifiers to cached metadata.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use {
    futures::future::join_all,
    serde::{Deserialize, Serialize},
    tendril_cache::{CacheKey, DiscoveryCache, command_sources, compute_freshness},
    tendril_config::{Config, Dialect},
    tracing::{debug, warn},
};

use crate::{
    command::{CachedCommand, CommandMetadata},
    loader::ModuleLoader,
    plugin::Plugin,
};

/// Cache namespace for command discovery.
pub const COMMANDS_NAMESPACE: &str = "commands";

/// Base name that stands for its directory.
const INDEX: &str = "index";

/// Derive a command identifier from a source path relative to `dir`.
///
/// `foo/bar.toml` → `foo:bar`, `foo/index.toml` → `foo`, `index.toml` → ``.
pub fn command_id(dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dir).unwrap_or(path);
    let mut segments: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = segments.pop() {
        let stem = Path::new(&last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(last);
        if stem != INDEX {
            segments.push(stem);
        }
    }

    segments.retain(|s| !s.is_empty());
    segments.join(":")
}

/// Locate the source file for `id` under `dir`: `<dir>/a/b.<ext>` first, then
/// `<dir>/a/b/index.<ext>`.
pub fn resolve_command_path(dir: &Path, dialect: Dialect, id: &str) -> Option<PathBuf> {
    let ext = dialect.extension();
    let base = id
        .split(':')
        .filter(|s| !s.is_empty())
        .fold(dir.to_path_buf(), |acc, seg| acc.join(seg));

    if !id.is_empty() {
        let mut direct = base.clone().into_os_string();
        direct.push(format!(".{ext}"));
        let direct = PathBuf::from(direct);
        if direct.is_file() {
            return Some(direct);
        }
    }
    let index = base.join(format!("{INDEX}.{ext}"));
    index.is_file().then_some(index)
}

/// The cached form of one discovered command.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiscoveredCommand {
    dialect: Dialect,
    /// Source file relative to the dialect's command directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<PathBuf>,
    #[serde(flatten)]
    metadata: CommandMetadata,
}

/// Discovers a plugin's commands through the discovery cache.
pub struct CommandDiscoverer {
    loader: Arc<dyn ModuleLoader>,
    config: Arc<Config>,
    reset_cache: bool,
}

impl CommandDiscoverer {
    pub fn new(loader: Arc<dyn ModuleLoader>, config: Arc<Config>, reset_cache: bool) -> Self {
        Self {
            loader,
            config,
            reset_cache,
        }
    }

    /// Discover `plugin`'s commands in every declared dialect.
    ///
    /// The scan runs only on a cache miss. Deferred loaders are attached
    /// afterwards on every call.
    pub async fn discover(&self, plugin: &Plugin) -> anyhow::Result<Vec<CachedCommand>> {
        let dirs: Vec<(PathBuf, Dialect)> = Dialect::ALL
            .iter()
            .filter_map(|d| plugin.descriptor.commands_dir(*d).map(|dir| (dir, *d)))
            .collect();
        if dirs.is_empty() {
            return Ok(Vec::new());
        }

        let freshness = compute_freshness(&plugin.root, dirs.clone(), self.reset_cache).await;
        let key = CacheKey::new(&self.config.version, &plugin.version, freshness).to_string();
        let cache = DiscoveryCache::new(&self.config.cache_dir, plugin.plugin_type, &plugin.name);

        let discovered: Vec<DiscoveredCommand> = cache
            .fetch(COMMANDS_NAMESPACE, &key, || self.scan(plugin, &dirs))
            .await?;

        Ok(discovered
            .into_iter()
            .filter_map(|entry| {
                let dir = dirs
                    .iter()
                    .find(|(_, d)| *d == entry.dialect)
                    .map(|(dir, _)| dir.clone())?;
                Some(
                    CachedCommand::new(
                        entry.metadata,
                        dir,
                        entry.dialect,
                        Arc::clone(&self.loader),
                    )
                    .with_source(entry.source),
                )
            })
            .collect())
    }

    async fn scan(
        &self,
        plugin: &Plugin,
        dirs: &[(PathBuf, Dialect)],
    ) -> anyhow::Result<Vec<DiscoveredCommand>> {
        let mut all = Vec::new();
        for (dir, dialect) in dirs {
            match self.scan_dir(plugin, dir, *dialect).await {
                Ok(found) => all.extend(found),
                Err(e) if dialect.is_secondary() => {
                    warn!(
                        plugin = %plugin.name,
                        dir = %dir.display(),
                        %dialect,
                        error = %e,
                        "failed to discover commands, skipping dialect"
                    );
                },
                Err(e) => return Err(e),
            }
        }
        debug!(plugin = %plugin.name, count = all.len(), "discovered commands");
        Ok(all)
    }

    async fn scan_dir(
        &self,
        plugin: &Plugin,
        dir: &Path,
        dialect: Dialect,
    ) -> anyhow::Result<Vec<DiscoveredCommand>> {
        let owned = dir.to_path_buf();
        let paths =
            tokio::task::spawn_blocking(move || command_sources(&owned, dialect)).await??;

        let loads = paths.into_iter().map(|path| {
            let id = command_id(dir, &path);
            async move {
                let result = self.loader.load_command(&path).await;
                (id, path, result)
            }
        });

        Ok(join_all(loads)
            .await
            .into_iter()
            .filter_map(|(id, path, result)| match result {
                Ok(mut command) => {
                    command.set_id(id);
                    let mut metadata = command.to_cached();
                    metadata.plugin_name = Some(plugin.name.clone());
                    metadata.plugin_type = Some(plugin.plugin_type);
                    Some(DiscoveredCommand {
                        dialect,
                        source: path.strip_prefix(dir).ok().map(Path::to_path_buf),
                        metadata,
                    })
                },
                Err(e) => {
                    warn!(
                        plugin = %plugin.name,
                        path = %path.display(),
                        error = %e,
                        "failed to load command"
                    );
                    None
                },
            })
            .collect())
    }
}
