//! Command source enumeration.
//!
//! Both the discoverer and the freshness scan look at the same set of files:
//! everything under a command directory with the dialect's extension, minus
//! declaration-only (`*.d.<ext>`) and test (`*.test.<ext>`, `*.spec.<ext>`)
//! files.

use std::path::{Path, PathBuf};

use {tendril_config::Dialect, walkdir::WalkDir};

use crate::error::Result;

const EXCLUDED_STEM_SUFFIXES: &[&str] = &[".d", ".test", ".spec"];

/// True if `path` is a command source file in `dialect`.
pub fn is_command_source(path: &Path, dialect: Dialect) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some(dialect.extension()) {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    !EXCLUDED_STEM_SUFFIXES.iter().any(|s| stem.ends_with(s))
}

/// List command sources under `dir`, shallowest first, then by path.
///
/// A missing directory yields no sources.
pub fn command_sources(dir: &Path, dialect: Dialect) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_command_source(entry.path(), dialect) {
            found.push((entry.depth(), entry.into_path()));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}
