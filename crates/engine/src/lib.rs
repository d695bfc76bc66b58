//! The loaded registry of a tendril application.
//!
//! [`Engine::load`] resolves the plugin tree rooted at an application
//! directory and exposes the flattened result: plugins, topics, cached
//! commands, and hook dispatch. An `Engine` only exists once loading has
//! finished.

pub mod error;

use std::{path::PathBuf, sync::Arc};

use {
    serde_json::Value,
    tendril_config::{Config, DescriptorReader, FsDescriptorReader},
    tendril_plugins::{
        CachedCommand, FsModuleLoader, HookDispatcher, LoadOptions, ModuleLoader, Plugin, Topic,
        load_tree,
    },
    tracing::debug,
};

pub use error::{Error, Result};

/// Options for [`Engine::load`].
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Ignore cached command discovery for this load.
    pub reset_cache: bool,
    /// Use this cache directory instead of the configured one.
    pub cache_dir: Option<PathBuf>,
}

pub struct Engine {
    config: Arc<Config>,
    plugins: Vec<Arc<Plugin>>,
    topics: Vec<Topic>,
    commands: Vec<CachedCommand>,
    hooks: HookDispatcher,
}

impl Engine {
    /// Load the application rooted at `root` from disk.
    pub async fn load(root: impl Into<PathBuf>, options: EngineOptions) -> Result<Self> {
        Self::load_with(
            root,
            options,
            Arc::new(FsDescriptorReader),
            Arc::new(FsModuleLoader),
        )
        .await
    }

    /// Load with a custom descriptor reader and module loader.
    pub async fn load_with(
        root: impl Into<PathBuf>,
        options: EngineOptions,
        reader: Arc<dyn DescriptorReader>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Result<Self> {
        let mut load = LoadOptions::new(root).reset_cache(options.reset_cache);
        if let Some(dir) = options.cache_dir {
            load = load.cache_dir(dir);
        }

        let loaded = load_tree(load, reader, loader).await?;
        Ok(Self {
            config: loaded.config,
            plugins: loaded.plugins,
            topics: loaded.topics,
            commands: loaded.commands,
            hooks: loaded.hooks,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    pub fn find_plugin(&self, name: &str) -> Option<&Arc<Plugin>> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn commands(&self) -> &[CachedCommand] {
        &self.commands
    }

    pub fn command_ids(&self) -> Vec<&str> {
        self.commands.iter().map(CachedCommand::id).collect()
    }

    /// Topics with no parent.
    pub fn root_topics(&self) -> Vec<&Topic> {
        self.topics
            .iter()
            .filter(|t| !t.name.contains(':'))
            .collect()
    }

    /// Commands with no parent topic.
    pub fn root_commands(&self) -> Vec<&CachedCommand> {
        self.commands
            .iter()
            .filter(|c| !c.id().contains(':'))
            .collect()
    }

    /// Commands directly under `topic`.
    pub fn topic_commands(&self, topic: &str) -> Vec<&CachedCommand> {
        self.commands
            .iter()
            .filter(|c| {
                c.id()
                    .strip_prefix(topic)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains(':'))
            })
            .collect()
    }

    pub fn find_command(&self, id: &str) -> Option<&CachedCommand> {
        self.commands.iter().find(|c| c.id() == id)
    }

    /// Like [`Engine::find_command`], failing when there is no match.
    pub fn find_command_must(&self, id: &str) -> Result<&CachedCommand> {
        self.find_command(id).ok_or_else(|| Error::CommandNotFound { id: id.into() })
    }

    pub fn find_topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    /// Like [`Engine::find_topic`], failing when there is no match.
    pub fn find_topic_must(&self, name: &str) -> Result<&Topic> {
        self.find_topic(name).ok_or_else(|| Error::TopicNotFound { name: name.into() })
    }

    /// Events with at least one registered hook.
    pub fn hook_events(&self) -> Vec<&str> {
        self.hooks.events()
    }

    /// Run every hook registered for `event`.
    ///
    /// Fails only when a hook requests an exit.
    pub async fn run_hook(&self, event: &str, payload: Value) -> Result<()> {
        self.hooks.dispatch(event, payload).await?;
        Ok(())
    }

    /// Load the command `id` and run it with `argv`.
    pub async fn run_command(&self, id: &str, argv: &[String]) -> Result<()> {
        let cached = self.find_command_must(id)?;
        debug!(command = id, argc = argv.len(), "running command");
        let command = cached.load().await.map_err(|source| Error::Command {
            id: id.into(),
            source,
        })?;
        command
            .run(argv, &self.config)
            .await
            .map_err(|source| Error::Command {
                id: id.into(),
                source,
            })
    }
}
