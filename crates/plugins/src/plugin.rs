//! Resolved plugins and topics.

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use {
    serde::{Deserialize, Serialize},
    tendril_common::hooks::HookRef,
    tendril_config::{Descriptor, PluginType, TopicDecl},
};

use crate::command::CachedCommand;

/// A named grouping node in the command hierarchy (`foo:bar`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            hidden: false,
        }
    }
}

impl From<&TopicDecl> for Topic {
    fn from(decl: &TopicDecl) -> Self {
        Self {
            name: decl.name.clone(),
            description: decl.description.clone(),
            hidden: decl.hidden,
        }
    }
}

/// A plugin resolved from its descriptor.
///
/// Everything except the programmatic children and the discovered commands is
/// fixed at construction. Those two are filled exactly once, after the
/// record has already been registered.
#[derive(Debug)]
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub root: PathBuf,
    pub plugin_type: PluginType,
    pub tag: Option<String>,
    /// Event name → hook references, in declaration order.
    pub hooks: Vec<(String, Vec<HookRef>)>,
    pub topics: Vec<Topic>,
    pub descriptor: Descriptor,
    children: OnceLock<Vec<Arc<Plugin>>>,
    commands: OnceLock<Vec<CachedCommand>>,
}

impl Plugin {
    pub fn from_descriptor(descriptor: Descriptor, plugin_type: PluginType) -> Self {
        let hooks = descriptor
            .hooks()
            .map(|(event, modules)| {
                let refs = modules
                    .into_iter()
                    .map(|module| HookRef {
                        plugin: descriptor.name.clone(),
                        root: descriptor.root.clone(),
                        module,
                    })
                    .collect();
                (event.to_string(), refs)
            })
            .collect();
        let topics = descriptor.cli.topics.iter().map(Topic::from).collect();

        Self {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            root: descriptor.root.clone(),
            tag: descriptor.tag.clone(),
            plugin_type,
            hooks,
            topics,
            descriptor,
            children: OnceLock::new(),
            commands: OnceLock::new(),
        }
    }

    /// Plugins returned by this plugin's programmatic entry point.
    pub fn children(&self) -> &[Arc<Plugin>] {
        self.children.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Commands discovered for this plugin; empty until discovery has run.
    pub fn commands(&self) -> &[CachedCommand] {
        self.commands.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn set_children(&self, children: Vec<Arc<Plugin>>) {
        if self.children.set(children).is_err() {
            tracing::debug!(plugin = %self.name, "children already set");
        }
    }

    pub(crate) fn set_commands(&self, commands: Vec<CachedCommand>) {
        if self.commands.set(commands).is_err() {
            tracing::debug!(plugin = %self.name, "commands already set");
        }
    }

    /// A JSON summary used in hook payloads and listings.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "version": self.version,
            "type": self.plugin_type,
            "root": self.root,
            "tag": self.tag,
            "children": self.children().iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        })
    }
}
