//! Manifest-backed commands: `*.toml` files, or `*.md` files with TOML
//! frontmatter.
//!
//! ```toml
//! description = "say hello"
//! usage = "hello [NAME]"
//! aliases = ["hi"]
//! run = "echo hello \"$1\""
//!
//! [[args]]
//! name = "name"
//!
//! [flags.loud]
//! char = "l"
//! kind = "boolean"
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tendril_config::{Config, Dialect, find_descriptor},
    tokio::process::Command as Process,
    tracing::debug,
};

use crate::{
    command::{ArgMetadata, Command, FlagMetadata},
    frontmatter,
};

/// The declarative body of a command file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandManifest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
    pub help: Option<String>,
    pub hidden: bool,
    pub aliases: Vec<String>,
    /// Shell line executed by `run`; argv is passed as positional parameters.
    pub run: Option<String>,
    pub args: Vec<ArgMetadata>,
    pub flags: BTreeMap<String, FlagMetadata>,
}

/// A command loaded from a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestCommand {
    id: String,
    path: PathBuf,
    manifest: CommandManifest,
}

impl ManifestCommand {
    pub fn new(path: impl Into<PathBuf>, manifest: CommandManifest) -> Self {
        Self {
            id: String::new(),
            path: path.into(),
            manifest,
        }
    }

    /// Parse a command file in `dialect`.
    ///
    /// For Markdown, the body becomes the help text unless the frontmatter
    /// sets `help` explicitly.
    pub fn parse(content: &str, path: &Path, dialect: Dialect) -> Result<Self> {
        let manifest = match dialect {
            Dialect::Toml => toml::from_str(content)
                .with_context(|| format!("failed to parse command {}", path.display()))?,
            Dialect::Markdown => {
                let parsed = frontmatter::parse::<CommandManifest>(content, path)?;
                let mut manifest = parsed.metadata;
                if manifest.help.is_none() && !parsed.body.is_empty() {
                    manifest.help = Some(parsed.body);
                }
                manifest
            },
        };
        Ok(Self::new(path, manifest))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    /// Root of the plugin declaring this command: the nearest ancestor of
    /// the command file holding a descriptor.
    pub fn plugin_root(&self) -> Option<&Path> {
        self.path
            .ancestors()
            .skip(1)
            .find(|dir| find_descriptor(dir).is_some())
    }
}

#[async_trait]
impl Command for ManifestCommand {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn title(&self) -> Option<&str> {
        self.manifest.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    fn usage(&self) -> Option<&str> {
        self.manifest.usage.as_deref()
    }

    fn help(&self) -> Option<&str> {
        self.manifest.help.as_deref()
    }

    fn hidden(&self) -> bool {
        self.manifest.hidden
    }

    fn aliases(&self) -> &[String] {
        &self.manifest.aliases
    }

    fn args(&self) -> &[ArgMetadata] {
        &self.manifest.args
    }

    fn flags(&self) -> BTreeMap<String, FlagMetadata> {
        self.manifest.flags.clone()
    }

    async fn run(&self, argv: &[String], config: &Config) -> Result<()> {
        let Some(script) = self.manifest.run.as_deref() else {
            bail!("command '{}' has no run script", self.id);
        };
        let prefix = config.env_prefix();
        let cwd = self.plugin_root().unwrap_or(&config.root);

        debug!(command = %self.id, script, argc = argv.len(), cwd = %cwd.display(), "running command");

        let status = Process::new("sh")
            .arg("-c")
            .arg(script)
            .arg(&self.id)
            .args(argv)
            .current_dir(cwd)
            .env("TENDRIL_COMMAND_ID", &self.id)
            .env(format!("{prefix}_ROOT"), &config.root)
            .env(format!("{prefix}_VERSION"), &config.version)
            .env(format!("{prefix}_CACHE_DIR"), &config.cache_dir)
            .env(format!("{prefix}_CONFIG_DIR"), &config.config_dir)
            .env(format!("{prefix}_DATA_DIR"), &config.data_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("failed to spawn command '{}'", self.id))?;

        if !status.success() {
            bail!(
                "command '{}' exited with code {}",
                self.id,
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}
