//! Core hook types shared across crates.
//!
//! A hook is a loadable unit invoked when a lifecycle event fires. The
//! dispatcher and the on-disk hook formats live in `tendril-plugins`; this
//! module holds the trait and the error contract every hook implementation
//! must follow.

use std::{fmt, path::PathBuf};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// Event fired by the loader once the whole plugin tree is registered.
pub const POST_LOAD_EVENT: &str = "plugins:parse";

// ── HookError ───────────────────────────────────────────────────────────────

/// The ways a hook invocation can end unsuccessfully.
///
/// [`HookError::Exit`] is the only variant the dispatcher re-raises; every
/// other failure is logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook requested exit with code {code}")]
    Exit { code: i32 },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HookError {
    #[must_use]
    pub fn exit(code: i32) -> Self {
        Self::Exit { code }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }
}

// ── Hook trait ──────────────────────────────────────────────────────────────

/// A live, loaded hook module.
#[async_trait]
pub trait Hook: Send + Sync {
    /// A human-readable name used in log fields.
    fn name(&self) -> &str;

    /// Run the hook against the merged `{...payload, config}` context.
    async fn run(&self, context: &Value) -> Result<(), HookError>;
}

// ── HookRef ─────────────────────────────────────────────────────────────────

/// An unresolved hook module reference, as declared by a plugin.
///
/// The reference is kept together with the declaring plugin's root so it can
/// be resolved relative to that root at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRef {
    pub plugin: String,
    pub root: PathBuf,
    pub module: String,
}

impl fmt::Display for HookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin, self.module)
    }
}

/// Shallow-merge an event payload with the active configuration.
///
/// Object payloads contribute their top-level keys; any other non-null
/// payload is kept under `payload`. The `config` key always wins.
pub fn merge_context(payload: Value, config: Value) -> Value {
    let mut context = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("payload".into(), other);
            map
        },
    };
    context.insert("config".into(), config);
    Value::Object(context)
}
