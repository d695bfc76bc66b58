use std::path::{Path, PathBuf};

use {tendril_common::hooks::HookError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to read descriptor at {root}: {source}")]
    Descriptor {
        root: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("plugin {name} not found from {root}")]
    PluginNotFound { name: String, root: PathBuf },

    #[error("plugin at {root} is its own ancestor")]
    Cycle { root: PathBuf },

    #[error("invalid frontmatter in {path}: {reason}")]
    InvalidFrontmatter { path: PathBuf, reason: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn descriptor(root: &Path, source: anyhow::Error) -> Self {
        Self::Descriptor {
            root: root.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn invalid_frontmatter(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidFrontmatter {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl tendril_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

tendril_common::impl_context!();
