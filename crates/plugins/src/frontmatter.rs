//! `+++`-delimited TOML frontmatter, shared by every Markdown source.
//!
//! ```text
//! +++
//! description = "What it does"
//! +++
//!
//! # Body
//! Extended docs go here.
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A parsed Markdown source.
#[derive(Debug, Clone)]
pub struct Frontmatter<T> {
    pub metadata: T,
    pub body: String,
}

/// Split `content` into its TOML frontmatter and trimmed body.
pub fn split(content: &str, path: &Path) -> Result<(String, String)> {
    let trimmed = content.trim_start();
    let Some(after_first) = trimmed.strip_prefix("+++") else {
        return Err(Error::invalid_frontmatter(
            path,
            "must start with +++ TOML frontmatter",
        ));
    };

    let end = after_first
        .find("\n+++")
        .ok_or_else(|| Error::invalid_frontmatter(path, "missing closing +++"))?;

    let toml_str = after_first[..end].trim().to_string();
    let body = after_first
        .get(end + 4..)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    Ok((toml_str, body))
}

/// Parse `content` into typed frontmatter plus body.
pub fn parse<T: DeserializeOwned>(content: &str, path: &Path) -> Result<Frontmatter<T>> {
    let (toml_str, body) = split(content, path)?;
    let metadata =
        toml::from_str(&toml_str).map_err(|e| Error::invalid_frontmatter(path, e.to_string()))?;
    Ok(Frontmatter { metadata, body })
}
