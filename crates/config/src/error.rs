use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no plugin descriptor found in {root}")]
    DescriptorNotFound { root: PathBuf },

    #[error("failed to parse {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("unsupported descriptor format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn invalid_descriptor(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl tendril_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

tendril_common::impl_context!();
