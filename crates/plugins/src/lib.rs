//! Plugin registry: tree loading, command discovery, and hook dispatch.
//!
//! A plugin is a directory with a descriptor (`plugin.toml` and friends). The
//! [`tree`] module walks the root application and its sub-plugins into one
//! flat registry, [`discovery`] turns each plugin's command directories into
//! cached metadata, and [`hooks`] runs lifecycle events against every hook
//! the tree declares.
//!
//! Commands, hooks, and entry points are loaded through the [`ModuleLoader`]
//! seam. The bundled [`FsModuleLoader`] understands TOML sources natively and
//! Markdown sources once the dialect has been registered (see [`dialect`]).

pub mod command;
pub mod dialect;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod frontmatter;
pub mod hooks;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod shell_hook;
pub mod tree;

pub use {
    command::{CachedCommand, Command, CommandMetadata, default_converter},
    discovery::{CommandDiscoverer, command_id, resolve_command_path},
    entry::{ChildLoader, ChildSpec, PluginsEntry},
    error::{Error, Result},
    hooks::HookDispatcher,
    loader::{FsModuleLoader, ModuleLoader},
    plugin::{Plugin, Topic},
    tree::{LoadOptions, LoadResult, TreeLoader, load_tree},
};
