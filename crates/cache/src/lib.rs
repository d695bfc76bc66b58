//! Discovery cache: memoizes a plugin's command discovery on disk.
//!
//! Entries live at `<cache_dir>/<namespace>/<type>/<name>.json` and are keyed
//! by the host version, the plugin version, and (for plugins in a working
//! checkout) the newest command source modification time. See [`key`] for
//! the exact policy.

pub mod error;
pub mod key;
pub mod sources;
pub mod store;

pub use {
    error::{Error, Result},
    key::{CacheKey, Freshness, compute_freshness},
    sources::{command_sources, is_command_source},
    store::DiscoveryCache,
};
