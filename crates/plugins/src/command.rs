//! Commands: the live loadable unit and its cache-safe metadata.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tendril_config::{Config, Dialect, PluginType},
};

use crate::loader::ModuleLoader;

// ── Metadata ────────────────────────────────────────────────────────────────

/// A positional argument, as shown in help output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgMetadata {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    #[default]
    Boolean,
    Option,
}

/// A flag, as shown in help output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagMetadata {
    pub char: Option<char>,
    pub description: Option<String>,
    pub kind: FlagKind,
    pub required: bool,
    pub multiple: bool,
    pub default: Option<String>,
}

/// Everything help and listing output needs, without loading the command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub plugin_name: Option<String>,
    #[serde(default)]
    pub plugin_type: Option<PluginType>,
    #[serde(default)]
    pub args: Vec<ArgMetadata>,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagMetadata>,
}

// ── Command trait ───────────────────────────────────────────────────────────

/// A loaded command module.
///
/// Only [`Command::id`], [`Command::set_id`], and [`Command::run`] are
/// required. A command that wants control over its cached form overrides
/// [`Command::to_cached`]; everything else goes through [`default_converter`].
#[async_trait]
pub trait Command: Send + Sync {
    fn id(&self) -> &str;

    /// Assign the identifier derived from the command's file path.
    fn set_id(&mut self, id: String);

    fn title(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn usage(&self) -> Option<&str> {
        None
    }

    fn help(&self) -> Option<&str> {
        None
    }

    fn hidden(&self) -> bool {
        false
    }

    fn aliases(&self) -> &[String] {
        &[]
    }

    fn args(&self) -> &[ArgMetadata] {
        &[]
    }

    fn flags(&self) -> BTreeMap<String, FlagMetadata> {
        BTreeMap::new()
    }

    /// Convert into the cache-safe form.
    fn to_cached(&self) -> CommandMetadata {
        default_converter(self)
    }

    async fn run(&self, argv: &[String], config: &Config) -> anyhow::Result<()>;
}

/// Build cached metadata from a command's accessors.
pub fn default_converter<C: Command + ?Sized>(command: &C) -> CommandMetadata {
    CommandMetadata {
        id: command.id().to_string(),
        title: command.title().map(str::to_string),
        description: command.description().map(str::to_string),
        usage: command.usage().map(str::to_string),
        help: command.help().map(str::to_string),
        hidden: command.hidden(),
        aliases: command.aliases().to_vec(),
        plugin_name: None,
        plugin_type: None,
        args: command.args().to_vec(),
        flags: command.flags(),
    }
}

// ── CachedCommand ───────────────────────────────────────────────────────────

/// Cached metadata plus a deferred loader for the live command.
///
/// The loader holds no reference to the module itself: every call to
/// [`CachedCommand::load`] goes back to the file the metadata was built
/// from, or re-resolves it from the command directory and the identifier
/// when that file is unknown or gone.
#[derive(Clone)]
pub struct CachedCommand {
    pub metadata: CommandMetadata,
    dir: PathBuf,
    /// Source file relative to `dir`.
    source: Option<PathBuf>,
    dialect: Dialect,
    loader: Arc<dyn ModuleLoader>,
}

impl CachedCommand {
    pub fn new(
        metadata: CommandMetadata,
        dir: PathBuf,
        dialect: Dialect,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            metadata,
            dir,
            source: None,
            dialect,
            loader,
        }
    }

    /// Pin the source file, relative to the command directory.
    #[must_use]
    pub fn with_source(mut self, source: Option<PathBuf>) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Resolve and load the live command module.
    pub async fn load(&self) -> anyhow::Result<Box<dyn Command>> {
        let path = self
            .source_path()
            .filter(|p| p.is_file())
            .or_else(|| {
                crate::discovery::resolve_command_path(&self.dir, self.dialect, self.id())
            })
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "command {} no longer exists under {}",
                    self.id(),
                    self.dir.display()
                )
            })?;
        let mut command = self.loader.load_command(&path).await?;
        command.set_id(self.id().to_string());
        Ok(command)
    }

    pub fn source_dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> Option<PathBuf> {
        self.source.as_ref().map(|rel| self.dir.join(rel))
    }
}

impl fmt::Debug for CachedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCommand")
            .field("metadata", &self.metadata)
            .field("dir", &self.dir)
            .field("source", &self.source)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}
