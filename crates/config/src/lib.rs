//! Plugin descriptors and application configuration.
//!
//! Every plugin root carries a descriptor: `plugin.toml`, `plugin.yaml`,
//! `plugin.yml`, or `plugin.json`, checked in that order. The application
//! root's descriptor additionally yields the [`Config`] shared by the engine.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{DescriptorReader, FsDescriptorReader, find_descriptor, load_descriptor},
    schema::{CliSection, Config, Descriptor, Dialect, HookRefs, PluginType, TopicDecl},
};
