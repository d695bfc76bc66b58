/// Descriptor and configuration schema types.
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Where a plugin came from. Consumers decide what each tag means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    #[default]
    Core,
    User,
    Link,
}

impl PluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::User => "user",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source dialects a plugin may ship commands, hooks, and entry points in.
///
/// TOML is understood natively. Markdown sources (TOML frontmatter between
/// `+++` lines) need the process-wide dialect registration step first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Toml,
    Markdown,
}

impl Dialect {
    pub const ALL: &'static [Dialect] = &[Self::Toml, Self::Markdown];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Markdown => "md",
        }
    }

    /// Whether sources in this dialect need the registration step.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::Markdown)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A hook map value: one module reference or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HookRefs {
    One(String),
    Many(Vec<String>),
}

impl HookRefs {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(r) => vec![r.clone()],
            Self::Many(refs) => refs.clone(),
        }
    }
}

/// A topic declared in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDecl {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

/// The `[cli]` section of a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSection {
    pub bin: Option<String>,
    /// Command directory in the TOML dialect.
    pub commands: Option<PathBuf>,
    /// Command directory in the Markdown dialect.
    pub commands_md: Option<PathBuf>,
    /// Static sub-plugins, by name.
    pub plugins: Vec<String>,
    /// Programmatic sub-plugin entry point: an executable.
    pub plugins_entry: Option<PathBuf>,
    /// Programmatic sub-plugin entry point in the Markdown dialect.
    pub plugins_entry_md: Option<PathBuf>,
    pub hooks: BTreeMap<String, HookRefs>,
    pub topics: Vec<TopicDecl>,
}

/// Everything a plugin root declares about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub tag: Option<String>,
    /// Filled in by the reader; any value in the file is ignored.
    #[serde(default)]
    pub root: PathBuf,
    #[serde(default)]
    pub cli: CliSection,
}

impl Descriptor {
    /// Absolute command directory for `dialect`, if declared.
    pub fn commands_dir(&self, dialect: Dialect) -> Option<PathBuf> {
        let rel = match dialect {
            Dialect::Toml => self.cli.commands.as_ref(),
            Dialect::Markdown => self.cli.commands_md.as_ref(),
        }?;
        Some(self.root.join(rel))
    }

    /// Absolute programmatic entry point for `dialect`, if declared.
    pub fn plugins_entry(&self, dialect: Dialect) -> Option<PathBuf> {
        let rel = match dialect {
            Dialect::Toml => self.cli.plugins_entry.as_ref(),
            Dialect::Markdown => self.cli.plugins_entry_md.as_ref(),
        }?;
        Some(self.root.join(rel))
    }

    /// Hook references per event, in declaration order.
    pub fn hooks(&self) -> impl Iterator<Item = (&str, Vec<String>)> {
        self.cli.hooks.iter().map(|(e, r)| (e.as_str(), r.to_vec()))
    }

    /// True when any command, hook, or entry point source is Markdown.
    pub fn uses_secondary_dialect(&self) -> bool {
        self.cli.commands_md.is_some()
            || self.cli.plugins_entry_md.is_some()
            || self.cli.hooks.values().any(|refs| {
                refs.to_vec()
                    .iter()
                    .any(|r| Dialect::from_path(Path::new(r)).is_some_and(|d| d.is_secondary()))
            })
    }

    pub fn bin(&self) -> &str {
        self.cli.bin.as_deref().unwrap_or(&self.name)
    }
}

/// Immutable application configuration, derived from the root descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub bin: String,
    pub version: String,
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub platform: String,
    pub arch: String,
    pub user_agent: String,
    pub debug: bool,
    pub tag: Option<String>,
}

impl Config {
    /// Build the configuration for the application whose root descriptor is
    /// `descriptor`, reading directory overrides from the environment.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self::from_descriptor_with(descriptor, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_descriptor`] with a custom environment lookup.
    pub fn from_descriptor_with(
        descriptor: &Descriptor,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let bin = descriptor.bin().to_string();
        let prefix = env_prefix(&bin);
        let dirs = directories::ProjectDirs::from("", "", &bin);
        let fallback = std::env::temp_dir().join(&bin);

        let dir = |suffix: &str, default: Option<&Path>| {
            lookup(&format!("{prefix}_{suffix}"))
                .map(PathBuf::from)
                .or_else(|| default.map(Path::to_path_buf))
                .unwrap_or_else(|| fallback.join(suffix.to_lowercase()))
        };
        let cache_dir = dir("CACHE_DIR", dirs.as_ref().map(|d| d.cache_dir()));
        let config_dir = dir("CONFIG_DIR", dirs.as_ref().map(|d| d.config_dir()));
        let data_dir = dir("DATA_DIR", dirs.as_ref().map(|d| d.data_dir()));

        let platform = std::env::consts::OS.to_string();
        let arch = std::env::consts::ARCH.to_string();
        let debug = lookup(&format!("{prefix}_DEBUG")).is_some_and(|v| v != "0" && !v.is_empty());

        Self {
            user_agent: format!("{}/{} {platform}-{arch}", descriptor.name, descriptor.version),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            root: descriptor.root.clone(),
            tag: descriptor.tag.clone(),
            bin,
            cache_dir,
            config_dir,
            data_dir,
            platform,
            arch,
            debug,
        }
    }

    /// The environment variable prefix for this application (`my-cli` → `MY_CLI`).
    pub fn env_prefix(&self) -> String {
        env_prefix(&self.bin)
    }
}

fn env_prefix(bin: &str) -> String {
    bin.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c.to_ascii_uppercase(),
            _ => '_',
        })
        .collect()
}
