use std::{
    future::Future,
    path::{Path, PathBuf},
};

use {
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::Value,
    tendril_config::PluginType,
    tracing::{debug, warn},
};

use crate::error::Result;

/// On-disk form of one cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    value: Value,
}

/// File-backed memoization store for one plugin.
///
/// Each namespace maps to its own file, so a plugin's command cache lives at
/// `<cache_dir>/commands/<type>/<name>.json`. Writes are atomic (temp file +
/// rename); concurrent processes race with last-writer-wins semantics.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    cache_dir: PathBuf,
    plugin_type: PluginType,
    plugin_name: String,
}

impl DiscoveryCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        plugin_type: PluginType,
        plugin_name: impl Into<String>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            plugin_type,
            plugin_name: plugin_name.into(),
        }
    }

    /// Path of the file backing `namespace`.
    pub fn path(&self, namespace: &str) -> PathBuf {
        self.cache_dir
            .join(namespace)
            .join(self.plugin_type.as_str())
            .join(format!("{}.json", self.plugin_name))
    }

    /// Return the value stored under `(namespace, key)`, or run `producer`,
    /// persist its result, and return it.
    ///
    /// Producer failures propagate unchanged and leave the cache untouched.
    /// Cache read and write failures are logged; a failed read is a miss and
    /// a failed write still returns the produced value.
    pub async fn fetch<T, E, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let path = self.path(namespace);

        match read_entry(&path, key).await {
            Ok(Some(value)) => {
                debug!(plugin = %self.plugin_name, namespace, key, "discovery cache hit");
                return Ok(value);
            },
            Ok(None) => {
                debug!(plugin = %self.plugin_name, namespace, key, "discovery cache miss");
            },
            Err(e) => {
                warn!(plugin = %self.plugin_name, path = %path.display(), error = %e, "failed to read discovery cache");
            },
        }

        let value = producer().await?;

        if let Err(e) = write_entry(&path, key, &value).await {
            warn!(plugin = %self.plugin_name, path = %path.display(), error = %e, "failed to write discovery cache");
        }

        Ok(value)
    }
}

async fn read_entry<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Option<T>> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let entry: CacheEntry = serde_json::from_str(&data)?;
    if entry.key != key {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(entry.value)?))
}

async fn write_entry<T: Serialize>(path: &Path, key: &str, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let entry = CacheEntry {
        key: key.to_string(),
        value: serde_json::to_value(value)?,
    };
    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(&entry)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        hidden: bool,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "foo".into(),
                hidden: false,
            },
            Item {
                id: "bar:baz".into(),
                hidden: true,
            },
        ]
    }

    #[test]
    fn path_layout() {
        let cache = DiscoveryCache::new("/cache", PluginType::User, "weather");
        assert_eq!(
            cache.path("commands"),
            PathBuf::from("/cache/commands/user/weather.json")
        );
    }

    #[tokio::test]
    async fn hit_skips_producer() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(tmp.path(), PluginType::Core, "app");
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let got: Vec<Item> = cache
                .fetch("commands", "1:1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(items())
                })
                .await
                .unwrap();
            assert_eq!(got, items());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn key_change_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(tmp.path(), PluginType::Core, "app");
        let first: Vec<Item> = cache
            .fetch("commands", "1:1", || async { Ok::<_, std::io::Error>(items()) })
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second: Vec<Item> = cache
            .fetch("commands", "1:2", || async {
                Ok::<_, std::io::Error>(Vec::new())
            })
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn producer_error_propagates_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(tmp.path(), PluginType::Link, "broken");
        let err = cache
            .fetch::<Vec<Item>, _, _, _>("commands", "1:1", || async {
                Err(std::io::Error::other("scan failed"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "scan failed");
        assert!(!cache.path("commands").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiscoveryCache::new(tmp.path(), PluginType::Core, "app");
        let path = cache.path("commands");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let got: Vec<Item> = cache
            .fetch("commands", "1:1", || async { Ok::<_, std::io::Error>(items()) })
            .await
            .unwrap();
        assert_eq!(got, items());

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["key"], "1:1");
    }
}
