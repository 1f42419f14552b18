//! Binary manager for the managed executable.
//!
//! Owns the single [`ManagedBinary`] value (path and version) and serializes
//! reads and writes of it behind one mutex. The lock is only held while the
//! two fields are copied, never across I/O or process invocation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Version reported when the managed binary cannot tell us its own version.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Snapshot of the managed executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedBinary {
    pub path: PathBuf,
    pub version: String,
}

impl ManagedBinary {
    /// Create a snapshot; an empty version is normalized to [`UNKNOWN_VERSION`].
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        let version = version.into();
        let version = if version.trim().is_empty() {
            UNKNOWN_VERSION.to_string()
        } else {
            version.trim().to_string()
        };
        Self {
            path: path.into(),
            version,
        }
    }
}

/// Lock-guarded owner of the process-wide [`ManagedBinary`].
///
/// Shared between the updater (writer) and request handlers (readers) through
/// an `Arc<BinaryManager>`.
#[derive(Debug)]
pub struct BinaryManager {
    current: Mutex<ManagedBinary>,
}

impl BinaryManager {
    pub fn new(initial: ManagedBinary) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Consistent snapshot of the current path and version.
    pub fn current(&self) -> ManagedBinary {
        self.lock().clone()
    }

    /// Current version string.
    pub fn version(&self) -> String {
        self.lock().version.clone()
    }

    /// Replace the snapshot seen by subsequent [`current`](Self::current) calls.
    ///
    /// Callers already holding a snapshot keep using the old path until their
    /// operation completes.
    pub fn install(&self, path: &Path, version: &str) {
        let next = ManagedBinary::new(path, version);
        *self.lock() = next;
    }

    fn lock(&self) -> MutexGuard<'_, ManagedBinary> {
        // a poisoned guard still holds a fully written value
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_current_returns_initial_snapshot() {
        let manager = BinaryManager::new(ManagedBinary::new("/cfg/yt-dlp", "2024.01.01"));
        let snapshot = manager.current();

        assert_eq!(snapshot.path, PathBuf::from("/cfg/yt-dlp"));
        assert_eq!(snapshot.version, "2024.01.01");
        assert_eq!(manager.version(), "2024.01.01");
    }

    #[test]
    fn test_install_is_visible_to_next_reader() {
        let manager = BinaryManager::new(ManagedBinary::new("/cfg/yt-dlp", "2024.01.01"));
        let before = manager.current();

        manager.install(Path::new("/cfg/yt-dlp-new"), "2024.02.01");

        // An earlier snapshot is unaffected
        assert_eq!(before.version, "2024.01.01");
        assert_eq!(before.path, PathBuf::from("/cfg/yt-dlp"));

        let after = manager.current();
        assert_eq!(after.path, PathBuf::from("/cfg/yt-dlp-new"));
        assert_eq!(after.version, "2024.02.01");
    }

    #[test]
    fn test_empty_version_is_normalized() {
        let binary = ManagedBinary::new("/cfg/yt-dlp", "  \n");
        assert_eq!(binary.version, UNKNOWN_VERSION);

        let manager = BinaryManager::new(binary);
        manager.install(Path::new("/cfg/yt-dlp"), "");
        assert_eq!(manager.version(), UNKNOWN_VERSION);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let manager = Arc::new(BinaryManager::new(ManagedBinary::new("/v/0", "0")));

        let writer = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for i in 1..500 {
                    let path = format!("/v/{}", i);
                    manager.install(Path::new(&path), &i.to_string());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = manager.current();
                        // path and version are always written together
                        assert_eq!(
                            snapshot.path,
                            PathBuf::from(format!("/v/{}", snapshot.version))
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(manager.current().version, "499");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_snapshot_never_has_empty_version(
            path in "/[a-z]{1,12}/[a-z.-]{1,12}",
            version in "[ \\t]{0,3}[0-9.]{0,10}[ \\t]{0,3}",
            next in "[0-9.]{0,10}",
        ) {
            let manager = BinaryManager::new(ManagedBinary::new(path.as_str(), version));
            prop_assert!(!manager.current().version.is_empty());

            manager.install(Path::new(&path), &next);
            let snapshot = manager.current();
            prop_assert!(!snapshot.version.is_empty());
            prop_assert_eq!(snapshot.path, PathBuf::from(&path));
            if !next.is_empty() {
                prop_assert_eq!(snapshot.version, next);
            }
        }
    }
}
