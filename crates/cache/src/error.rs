use thiserror::Error;

/// Failures inside the cache itself. These never reach the caller of
/// [`crate::DiscoveryCache::fetch`]; they are logged and treated as a miss.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("freshness scan failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
