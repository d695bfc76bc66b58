//! Process-wide registration of the Markdown source dialect.
//!
//! Plugins may ship commands, hooks, and entry points as Markdown files with
//! TOML frontmatter. The loader only accepts them once the dialect has been
//! registered, and registration happens at most once per process no matter
//! how many plugins ask for it.

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing::{debug, info};

static REGISTERED_BY: OnceLock<PathBuf> = OnceLock::new();

/// Register the Markdown dialect on behalf of the plugin at `root`.
///
/// Returns `true` only for the call that performed the registration.
pub fn register(root: &Path) -> bool {
    let mut first = false;
    REGISTERED_BY.get_or_init(|| {
        first = true;
        root.to_path_buf()
    });
    if first {
        info!(root = %root.display(), "markdown dialect registered");
    } else {
        debug!(root = %root.display(), "markdown dialect already registered");
    }
    first
}

/// Whether the Markdown dialect has been registered in this process.
pub fn is_registered() -> bool {
    REGISTERED_BY.get().is_some()
}

/// Root of the plugin whose request registered the dialect.
pub fn registered_by() -> Option<&'static Path> {
    REGISTERED_BY.get().map(PathBuf::as_path)
}
