//! Cache key construction.
//!
//! A key is `<host version>:<plugin version>` with an optional third
//! freshness component:
//!
//! - plugin root inside a git checkout: newest modification time among its
//!   command sources, so edits invalidate the entry;
//! - plugin root not version-controlled: omitted, the entry only changes when
//!   a version does;
//! - reset requested, or the freshness scan failed: the current wall-clock
//!   time, which guarantees a miss.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::SystemTime,
};

use {
    tendril_config::Dialect,
    time::OffsetDateTime,
    tracing::{debug, warn},
};

use crate::{error::Result, sources::command_sources};

/// The freshness fragment of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Keyed by versions alone.
    VersionOnly,
    /// Newest command source modification time, in unix nanoseconds.
    Modified(i128),
    /// Wall-clock time in unix nanoseconds.
    Now(i128),
}

impl Freshness {
    fn now() -> Self {
        Self::Now(OffsetDateTime::now_utc().unix_timestamp_nanos())
    }
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub host_version: String,
    pub plugin_version: String,
    pub freshness: Freshness,
}

impl CacheKey {
    pub fn new(
        host_version: impl Into<String>,
        plugin_version: impl Into<String>,
        freshness: Freshness,
    ) -> Self {
        Self {
            host_version: host_version.into(),
            plugin_version: plugin_version.into(),
            freshness,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_version, self.plugin_version)?;
        match self.freshness {
            Freshness::VersionOnly => Ok(()),
            Freshness::Modified(ts) | Freshness::Now(ts) => write!(f, ":{ts}"),
        }
    }
}

/// Work out the freshness component for a plugin rooted at `root` whose
/// command sources live in `source_dirs`.
pub async fn compute_freshness(
    root: &Path,
    source_dirs: Vec<(PathBuf, Dialect)>,
    reset: bool,
) -> Freshness {
    if reset {
        debug!(root = %root.display(), "cache reset requested");
        return Freshness::now();
    }

    let root = root.to_path_buf();
    let scan = tokio::task::spawn_blocking(move || {
        if !is_version_controlled(&root) {
            return Ok(None);
        }
        latest_modified(&source_dirs).map(Some)
    })
    .await;

    match scan {
        Ok(Ok(None | Some(None))) => Freshness::VersionOnly,
        Ok(Ok(Some(Some(ts)))) => Freshness::Modified(ts),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to compute cache freshness, forcing rediscovery");
            Freshness::now()
        },
        Err(e) => {
            warn!(error = %e, "freshness scan panicked, forcing rediscovery");
            Freshness::now()
        },
    }
}

/// True if `root` is inside a git working tree.
pub fn is_version_controlled(root: &Path) -> bool {
    gix::discover(root).is_ok()
}

/// Newest modification time among the command sources in `dirs`.
fn latest_modified(dirs: &[(PathBuf, Dialect)]) -> Result<Option<i128>> {
    let mut latest: Option<SystemTime> = None;
    for (dir, dialect) in dirs {
        for path in command_sources(dir, *dialect)? {
            let modified = std::fs::metadata(&path)?.modified()?;
            latest = Some(latest.map_or(modified, |l| l.max(modified)));
        }
    }
    Ok(latest.map(|t| OffsetDateTime::from(t).unix_timestamp_nanos()))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    fn write_source(dir: &Path, rel: &str, mtime: SystemTime) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "description = \"x\"\n").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn key_formats() {
        assert_eq!(
            CacheKey::new("1.0.0", "2.0.0", Freshness::VersionOnly).to_string(),
            "1.0.0:2.0.0"
        );
        assert_eq!(
            CacheKey::new("1.0.0", "2.0.0", Freshness::Modified(42)).to_string(),
            "1.0.0:2.0.0:42"
        );
    }

    #[tokio::test]
    async fn reset_always_uses_wall_clock() {
        let tmp = tempfile::tempdir().unwrap();
        let a = compute_freshness(tmp.path(), vec![], true).await;
        let b = compute_freshness(tmp.path(), vec![], true).await;
        assert!(matches!(a, Freshness::Now(_)));
        assert!(matches!(b, Freshness::Now(_)));
    }

    #[tokio::test]
    async fn untracked_root_is_version_only() {
        let tmp = tempfile::tempdir().unwrap();
        let commands = tmp.path().join("commands");
        write_source(&commands, "foo.toml", SystemTime::now());
        let freshness =
            compute_freshness(tmp.path(), vec![(commands, Dialect::Toml)], false).await;
        assert_eq!(freshness, Freshness::VersionOnly);
    }

    #[tokio::test]
    async fn tracked_root_uses_newest_source_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        gix::init(tmp.path()).unwrap();
        let commands = tmp.path().join("commands");
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let new = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000);
        write_source(&commands, "foo.toml", old);
        write_source(&commands, "bar/baz.toml", new);
        // Test files never count towards freshness.
        write_source(
            &commands,
            "bar/baz.test.toml",
            SystemTime::UNIX_EPOCH + Duration::from_secs(9_000),
        );

        let freshness =
            compute_freshness(tmp.path(), vec![(commands, Dialect::Toml)], false).await;
        assert_eq!(freshness, Freshness::Modified(2_000_000_000_000));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_scan_falls_back_to_wall_clock() {
        let tmp = tempfile::tempdir().unwrap();
        gix::init(tmp.path()).unwrap();
        let commands = tmp.path().join("commands");
        write_source(&commands, "foo.toml", SystemTime::UNIX_EPOCH);
        // Followed symlinks that point back up the tree make the walk fail.
        std::os::unix::fs::symlink(&commands, commands.join("loop")).unwrap();

        let freshness =
            compute_freshness(tmp.path(), vec![(commands, Dialect::Toml)], false).await;
        assert!(matches!(freshness, Freshness::Now(_)));
    }

    #[tokio::test]
    async fn tracked_root_without_sources_is_version_only() {
        let tmp = tempfile::tempdir().unwrap();
        gix::init(tmp.path()).unwrap();
        let freshness = compute_freshness(
            tmp.path(),
            vec![(tmp.path().join("commands"), Dialect::Toml)],
            false,
        )
        .await;
        assert_eq!(freshness, Freshness::VersionOnly);
    }
}
