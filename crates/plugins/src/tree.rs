//! Plugin tree loading.
//!
//! The root plugin is read first, then every static and programmatic
//! sub-plugin is resolved recursively into one flat registry. Once the tree
//! is complete, hooks and topics are merged, commands are discovered for
//! every plugin, and the post-load event is dispatched.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    futures::{
        FutureExt,
        future::{BoxFuture, join_all},
    },
    serde_json::json,
    tendril_common::hooks::POST_LOAD_EVENT,
    tendril_config::{Config, Descriptor, DescriptorReader, Dialect, PluginType, find_descriptor},
    tracing::{debug, info, warn},
};

use crate::{
    command::CachedCommand,
    dialect,
    discovery::CommandDiscoverer,
    entry::ChildLoader,
    error::{Error, Result},
    hooks::HookDispatcher,
    loader::ModuleLoader,
    plugin::{Plugin, Topic},
};

/// What to load and how.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub root: PathBuf,
    pub plugin_type: PluginType,
    /// Force every plugin's command discovery to miss the cache.
    pub reset_cache: bool,
    /// Overrides the configured cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plugin_type: PluginType::Core,
            reset_cache: false,
            cache_dir: None,
        }
    }

    #[must_use]
    pub fn reset_cache(mut self, reset: bool) -> Self {
        self.reset_cache = reset;
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// Everything a fully loaded tree produces.
pub struct LoadResult {
    pub config: Arc<Config>,
    /// Flat registry, in registration order.
    pub plugins: Vec<Arc<Plugin>>,
    pub commands: Vec<CachedCommand>,
    pub topics: Vec<Topic>,
    pub hooks: HookDispatcher,
}

// ── TreeLoader ──────────────────────────────────────────────────────────────

/// Resolves plugins into a flat registry.
///
/// Plugins are registered by name as soon as their descriptor is read. A
/// plugin reached a second time through another parent (a diamond) is
/// shared, not reloaded. A plugin that is its own ancestor is rejected.
pub struct TreeLoader {
    reader: Arc<dyn DescriptorReader>,
    loader: Arc<dyn ModuleLoader>,
    registry: Mutex<Vec<Arc<Plugin>>>,
}

impl TreeLoader {
    pub fn new(reader: Arc<dyn DescriptorReader>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            reader,
            loader,
            registry: Mutex::new(Vec::new()),
        }
    }

    /// Load the plugin at `root` and everything below it.
    ///
    /// `descriptor` skips the read when the caller already has it.
    /// `ancestry` holds the roots of the plugins on the path from the tree
    /// root down to this one.
    pub fn load_plugin(
        &self,
        root: PathBuf,
        plugin_type: PluginType,
        descriptor: Option<Descriptor>,
        ancestry: Vec<PathBuf>,
    ) -> BoxFuture<'_, Result<Arc<Plugin>>> {
        async move {
            let descriptor = match descriptor {
                Some(d) => d,
                None => self
                    .reader
                    .read(&root, plugin_type)
                    .await
                    .map_err(|e| Error::descriptor(&root, e))?,
            };

            if ancestry.contains(&descriptor.root) {
                return Err(Error::Cycle {
                    root: descriptor.root,
                });
            }

            let (plugin, is_new) = self.register(Plugin::from_descriptor(descriptor, plugin_type));
            if !is_new {
                return Ok(plugin);
            }

            if plugin.descriptor.uses_secondary_dialect() {
                dialect::register(&plugin.root);
            }

            let mut ancestry = ancestry;
            ancestry.push(plugin.root.clone());

            let children = self.run_entry_point(&plugin, &ancestry).await;
            plugin.set_children(children);

            self.load_static(&plugin, &ancestry).await;

            Ok(plugin)
        }
        .boxed()
    }

    fn register(&self, plugin: Plugin) -> (Arc<Plugin>, bool) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = registry.iter().find(|p| p.name == plugin.name) {
            if existing.root != plugin.root {
                warn!(
                    plugin = %plugin.name,
                    kept = %existing.root.display(),
                    ignored = %plugin.root.display(),
                    "plugin name already registered"
                );
            }
            return (Arc::clone(existing), false);
        }

        info!(
            plugin = %plugin.name,
            version = %plugin.version,
            r#type = %plugin.plugin_type,
            root = %plugin.root.display(),
            "registered plugin"
        );
        let plugin = Arc::new(plugin);
        registry.push(Arc::clone(&plugin));
        (plugin, true)
    }

    /// Run the programmatic entry point, preferring the Markdown variant and
    /// falling back to the native one.
    async fn run_entry_point(&self, plugin: &Plugin, ancestry: &[PathBuf]) -> Vec<Arc<Plugin>> {
        let scoped = Scoped {
            tree: self,
            ancestry: ancestry.to_vec(),
        };

        for dialect in [Dialect::Markdown, Dialect::Toml] {
            let Some(path) = plugin.descriptor.plugins_entry(dialect) else {
                continue;
            };
            let result = async {
                let entry = self.loader.load_plugins_entry(&path).await?;
                entry
                    .plugins(&plugin.descriptor, plugin.plugin_type, &scoped)
                    .await
            }
            .await;

            match result {
                Ok(children) => {
                    debug!(plugin = %plugin.name, count = children.len(), "loaded child plugins");
                    return children;
                },
                Err(e) => {
                    warn!(
                        plugin = %plugin.name,
                        entry = %path.display(),
                        %dialect,
                        error = %e,
                        "plugin entry point failed"
                    );
                },
            }
        }
        Vec::new()
    }

    /// Resolve and load the static sub-plugins concurrently.
    async fn load_static(&self, plugin: &Plugin, ancestry: &[PathBuf]) {
        let names = &plugin.descriptor.cli.plugins;
        if names.is_empty() {
            return;
        }

        let loads = names.iter().map(|name| async move {
            let Some(root) = resolve_plugin_root(name, &plugin.root) else {
                return Err(Error::PluginNotFound {
                    name: name.clone(),
                    root: plugin.root.clone(),
                });
            };
            self.load_plugin(root, plugin.plugin_type, None, ancestry.to_vec())
                .await
        });

        for (name, result) in names.iter().zip(join_all(loads).await) {
            if let Err(e) = result {
                warn!(parent = %plugin.name, plugin = %name, error = %e, "failed to load plugin");
            }
        }
    }

    /// Take the registry, leaving this loader empty.
    pub fn take_registry(&self) -> Vec<Arc<Plugin>> {
        std::mem::take(&mut *self.registry.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// A [`ChildLoader`] bound to one position in the tree.
struct Scoped<'a> {
    tree: &'a TreeLoader,
    ancestry: Vec<PathBuf>,
}

#[async_trait]
impl ChildLoader for Scoped<'_> {
    async fn load_child(&self, root: PathBuf, plugin_type: PluginType) -> Result<Arc<Plugin>> {
        self.tree
            .load_plugin(root, plugin_type, None, self.ancestry.clone())
            .await
    }
}

/// Find `<ancestor>/plugins/<name>` holding a descriptor, searching upward
/// from `from`.
pub fn resolve_plugin_root(name: &str, from: &Path) -> Option<PathBuf> {
    from.ancestors()
        .map(|dir| dir.join("plugins").join(name))
        .find(|candidate| find_descriptor(candidate).is_some())
}

// ── Whole-tree load ─────────────────────────────────────────────────────────

/// Load the application rooted at `options.root`.
///
/// Only an unreadable root descriptor or an exit request from a post-load
/// hook fails the load.
pub async fn load_tree(
    options: LoadOptions,
    reader: Arc<dyn DescriptorReader>,
    loader: Arc<dyn ModuleLoader>,
) -> Result<LoadResult> {
    let root_descriptor = reader
        .read(&options.root, options.plugin_type)
        .await
        .map_err(|e| Error::descriptor(&options.root, e))?;
    let mut config = Config::from_descriptor(&root_descriptor);
    if let Some(dir) = options.cache_dir.clone() {
        config.cache_dir = dir;
    }
    let config = Arc::new(config);
    debug!(app = %config.name, version = %config.version, root = %config.root.display(), "loading plugin tree");

    let tree = TreeLoader::new(reader, Arc::clone(&loader));
    tree.load_plugin(
        root_descriptor.root.clone(),
        options.plugin_type,
        Some(root_descriptor),
        Vec::new(),
    )
    .await?;
    let plugins = tree.take_registry();

    let mut hooks = HookDispatcher::new(Arc::clone(&loader), Arc::clone(&config));
    for plugin in &plugins {
        hooks.extend_from_plugin(plugin);
    }

    let mut topics = merge_topics(&plugins);

    let discoverer = CommandDiscoverer::new(loader, Arc::clone(&config), options.reset_cache);
    let discovered = join_all(plugins.iter().map(|p| discoverer.discover(p))).await;
    let mut all = Vec::new();
    for (plugin, result) in plugins.iter().zip(discovered) {
        let commands = result.unwrap_or_else(|e| {
            warn!(plugin = %plugin.name, error = %e, "command discovery failed");
            Vec::new()
        });
        all.extend(commands.iter().cloned());
        plugin.set_commands(commands);
    }
    let commands = dedupe_commands(all);

    let payload = json!({
        "plugins": plugins
            .iter()
            .map(|p| json!({
                "name": p.name,
                "version": p.version,
                "type": p.plugin_type,
                "root": p.root,
            }))
            .collect::<Vec<_>>(),
    });
    hooks.dispatch(POST_LOAD_EVENT, payload).await?;

    synthesize_topics(&mut topics, &commands);

    info!(
        app = %config.name,
        plugins = plugins.len(),
        commands = commands.len(),
        topics = topics.len(),
        "plugin tree loaded"
    );

    Ok(LoadResult {
        config,
        plugins,
        commands,
        topics,
        hooks,
    })
}

/// Every plugin's declared topics; the first declaration of a name wins.
fn merge_topics(plugins: &[Arc<Plugin>]) -> Vec<Topic> {
    let mut seen = HashSet::new();
    plugins
        .iter()
        .flat_map(|p| p.topics.iter())
        .filter(|t| seen.insert(t.name.clone()))
        .cloned()
        .collect()
}

/// Keep one command per identifier. A later duplicate replaces the earlier
/// one in place.
fn dedupe_commands(commands: Vec<CachedCommand>) -> Vec<CachedCommand> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CachedCommand> = Vec::with_capacity(commands.len());
    for command in commands {
        match index.get(command.id()) {
            Some(&i) => {
                debug!(id = command.id(), "command overridden by later plugin");
                out[i] = command;
            },
            None => {
                index.insert(command.id().to_string(), out.len());
                out.push(command);
            },
        }
    }
    out
}

/// Add a topic for every command prefix that has none.
fn synthesize_topics(topics: &mut Vec<Topic>, commands: &[CachedCommand]) {
    let mut names: HashSet<String> = topics.iter().map(|t| t.name.clone()).collect();
    for command in commands {
        let segments: Vec<&str> = command.id().split(':').collect();
        for end in 1..segments.len() {
            let prefix = segments[..end].join(":");
            if names.insert(prefix.clone()) {
                topics.push(Topic::new(prefix));
            }
        }
    }
}
