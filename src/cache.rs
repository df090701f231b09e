//! # Existence Cache Module
//!
//! Process-lifetime cache of filesystem existence checks. The build only
//! ever creates files, so a cached `true` never goes wrong and a cached
//! `false` is corrected through [`ExistenceCache::mark_created`] by the
//! writer itself. Out-of-band writes are not observed; that staleness is
//! accepted for the lifetime of one build process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Cached filesystem existence checks for a single build process
#[derive(Debug, Default)]
pub struct ExistenceCache {
    entries: Mutex<HashMap<PathBuf, bool>>,
}

impl ExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a path exists, consulting the cache first
    pub fn exists(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock().expect("existence cache poisoned");
        if let Some(&exists) = entries.get(path) {
            return exists;
        }

        let exists = path.exists();
        entries.insert(path.to_path_buf(), exists);
        exists
    }

    /// Record that a path was just created
    pub fn mark_created(&self, path: &Path) {
        let mut entries = self.entries.lock().expect("existence cache poisoned");
        entries.insert(path.to_path_buf(), true);
    }

    /// Create the parent directory of `path` unless already known to exist
    pub fn ensure_parent_dir(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !self.exists(parent) {
                std::fs::create_dir_all(parent)?;
                self.mark_created(parent);
            }
        }
        Ok(())
    }
}
