//! Stale lock reclaim
//!
//! Chrome drops `Singleton*` marker files (SingletonLock, SingletonSocket,
//! SingletonCookie) in the profile directory while it owns it. After an
//! unclean shutdown they linger and block the next launch, so the launch
//! path sweeps them first. Only called when no process is believed live.

use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// File-name prefix of Chrome's single-instance lock artifacts
const LOCK_PREFIX: &str = "Singleton";

/// Remove stale single-instance lock artifacts from the profile directory
///
/// Each deletion is best-effort: a failure (permissions, already gone) is
/// logged and the sweep continues. A missing or unreadable profile directory
/// is a no-op. Returns the number of artifacts removed.
pub async fn clear_stale_locks(profile_dir: &Path) -> usize {
    let mut entries = match fs::read_dir(profile_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                "Profile directory {} not readable, skipping lock sweep: {}",
                profile_dir.display(),
                e
            );
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to enumerate profile directory: {}", e);
                break;
            }
        };

        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOCK_PREFIX) {
            continue;
        }

        match fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("Removed stale lock {}", entry.path().display());
                removed += 1;
            }
            Err(e) => {
                warn!("Failed to remove stale lock {}: {}", entry.path().display(), e);
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_removes_all_lock_artifacts() {
        let dir = tempdir().unwrap();
        for name in ["SingletonLock", "SingletonSocket", "SingletonCookie"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::write(dir.path().join("Local State"), "{}").unwrap();

        let removed = clear_stale_locks(dir.path()).await;

        assert_eq!(removed, 3);
        assert!(!dir.path().join("SingletonLock").exists());
        // Unrelated files untouched
        assert!(dir.path().join("Local State").exists());
    }

    #[tokio::test]
    async fn test_missing_profile_dir_is_noop() {
        let dir = tempdir().unwrap();
        let removed = clear_stale_locks(&dir.path().join("does-not-exist")).await;
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_tolerates_individual_deletion_failure() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SingletonCookie"), "").unwrap();
        // remove_file on a directory fails, standing in for a permission error
        std::fs::create_dir(dir.path().join("SingletonLock")).unwrap();
        std::fs::write(dir.path().join("SingletonSocket"), "").unwrap();

        let removed = clear_stale_locks(dir.path()).await;

        // The two removable artifacts still got swept
        assert_eq!(removed, 2);
        assert!(!dir.path().join("SingletonCookie").exists());
        assert!(!dir.path().join("SingletonSocket").exists());
        assert!(dir.path().join("SingletonLock").exists());
    }
}
