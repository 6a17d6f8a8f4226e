//! The on-disk package store.
//!
//! Layout, per `(name, version)` entry:
//!
//! ```text
//! <store-root>/<name>/<version>/package/            extracted contents
//! <store-root>/<name>/<version>/package/.minnow-installing
//! <store-root>/<name>/<version>/package/.minnow-download-complete
//! <scratch-root>/<name>/<version>.tgz               in-flight archive
//! ```
//!
//! Entry state is derived from the sentinels: neither marker means Empty,
//! `.minnow-installing` means a population cycle is in flight, and
//! `.minnow-download-complete` means the entry is fully extracted. State only
//! moves forward; the installing marker is cleared when a cycle completes
//! successfully, never mid-flight. A completed entry requires BOTH the
//! `package/` directory and the completion marker — directory existence alone
//! can be a partially-extracted package.

use super::error::PkgError;
use crate::config::Channel;
use crate::paths::cache_dir;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Sentinel for an in-flight population cycle.
pub const INSTALLING_MARKER: &str = ".minnow-installing";

/// Sentinel for a fully-extracted entry.
pub const COMPLETE_MARKER: &str = ".minnow-download-complete";

/// How long an installing marker from another process stays authoritative.
/// A crash can leave the marker behind forever; past this age it is treated
/// as stale and removed instead of blocking the entry permanently.
const INSTALLING_TTL: Duration = Duration::from_secs(60 * 60);

/// Package store manager.
#[derive(Debug, Clone)]
pub struct PackageCache {
    /// Root of the extracted-package tree.
    store_root: PathBuf,
    /// Root for in-flight tarballs.
    scratch_root: PathBuf,
}

impl PackageCache {
    /// Create a store handle for the given channel.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        let base = cache_dir(channel);
        Self {
            store_root: base.join("store").join("npm"),
            scratch_root: base.join("scratch"),
        }
    }

    /// Create a store handle with explicit roots (used by tests and tools).
    #[must_use]
    pub fn with_roots(store_root: PathBuf, scratch_root: PathBuf) -> Self {
        Self {
            store_root,
            scratch_root,
        }
    }

    /// Root of the extracted-package tree.
    #[must_use]
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Root for in-flight tarballs.
    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// The version directory for an entry (parent of `package/`).
    ///
    /// `name` is the full registry name; scoped names nest under their scope
    /// directory.
    #[must_use]
    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        join_name(&self.store_root, name).join(version)
    }

    /// The directory holding an entry's extracted contents.
    #[must_use]
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.version_dir(name, version).join("package")
    }

    /// The scratch path for an entry's in-flight tarball.
    #[must_use]
    pub fn scratch_tarball(&self, name: &str, version: &str) -> PathBuf {
        join_name(&self.scratch_root, name).join(format!("{version}.tgz"))
    }

    /// Ensure the store and scratch roots exist.
    ///
    /// # Errors
    /// Returns an error if either root cannot be created. There is no
    /// recovery path; callers treat this as fatal.
    pub fn ensure_roots(&self) -> Result<(), PkgError> {
        fs::create_dir_all(&self.store_root)?;
        fs::create_dir_all(&self.scratch_root)?;
        Ok(())
    }

    /// Ensure an entry's package directory and scratch directory exist.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn ensure_entry_dirs(&self, name: &str, version: &str) -> Result<(), PkgError> {
        fs::create_dir_all(self.package_dir(name, version))?;
        fs::create_dir_all(join_name(&self.scratch_root, name))?;
        Ok(())
    }

    /// Whether another run is populating this entry.
    ///
    /// True iff the installing marker exists and is fresh. A marker older
    /// than the TTL was left by a crash; it is removed and ignored.
    #[must_use]
    pub fn is_installing(&self, name: &str, version: &str) -> bool {
        let marker = self.package_dir(name, version).join(INSTALLING_MARKER);

        let Ok(metadata) = fs::metadata(&marker) else {
            return false;
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok());

        match age {
            Some(age) if age > INSTALLING_TTL => {
                debug!(name, version, "removing stale installing marker");
                let _ = fs::remove_file(&marker);
                false
            }
            _ => true,
        }
    }

    /// Mark an entry as having a population cycle in flight.
    ///
    /// Best-effort: write failures are swallowed (the entry directory may not
    /// exist yet when called early).
    pub fn mark_installing(&self, name: &str, version: &str) {
        let marker = self.package_dir(name, version).join(INSTALLING_MARKER);
        if let Err(e) = fs::write(&marker, b"") {
            debug!(name, version, error = %e, "could not write installing marker");
        }
    }

    /// Clear the installing marker after a population cycle completed.
    pub fn clear_installing(&self, name: &str, version: &str) {
        let marker = self.package_dir(name, version).join(INSTALLING_MARKER);
        let _ = fs::remove_file(marker);
    }

    /// Whether an entry is fully populated.
    ///
    /// Requires both the package directory and the completion marker.
    #[must_use]
    pub fn is_cached(&self, name: &str, version: &str) -> bool {
        let pkg_dir = self.package_dir(name, version);
        pkg_dir.is_dir() && pkg_dir.join(COMPLETE_MARKER).is_file()
    }

    /// Mark an entry as fully populated.
    ///
    /// Must only be called after extraction has fully succeeded.
    ///
    /// # Errors
    /// Returns an error if the marker cannot be written; the entry then stays
    /// un-cached and a later run repopulates it.
    pub fn mark_cached(&self, name: &str, version: &str) -> Result<(), PkgError> {
        let marker = self.package_dir(name, version).join(COMPLETE_MARKER);
        fs::write(marker, b"")?;
        Ok(())
    }

    /// List all fully-populated entries as `(name, version)` pairs.
    ///
    /// # Errors
    /// Returns an error only on unexpected scan failures; an absent store
    /// root lists as empty.
    pub fn list_cached(&self) -> Result<Vec<(String, String)>, PkgError> {
        let mut result = Vec::new();

        if !self.store_root.exists() {
            return Ok(result);
        }

        self.scan_packages(&self.store_root, None, &mut result)?;
        result.sort();

        Ok(result)
    }

    fn scan_packages(
        &self,
        dir: &Path,
        scope: Option<&str>,
        result: &mut Vec<(String, String)>,
    ) -> Result<(), PkgError> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Ok(());
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let dir_name = entry.file_name();
            let dir_name = dir_name.to_string_lossy();

            if dir_name.starts_with('.') {
                continue;
            }

            if dir_name.starts_with('@') && scope.is_none() {
                // Scope directory: recurse one level
                self.scan_packages(&path, Some(&*dir_name), result)?;
                continue;
            }

            let pkg_name = match scope {
                Some(scope) => format!("{scope}/{dir_name}"),
                None => dir_name.to_string(),
            };

            let Ok(version_entries) = fs::read_dir(&path) else {
                continue;
            };

            for version_entry in version_entries.flatten() {
                if !version_entry.path().is_dir() {
                    continue;
                }

                let version = version_entry.file_name();
                let version = version.to_string_lossy();
                if version.starts_with('.') {
                    continue;
                }

                if self.is_cached(&pkg_name, &version) {
                    result.push((pkg_name.clone(), version.to_string()));
                }
            }
        }

        Ok(())
    }
}

/// Join a possibly-scoped package name onto a root as path segments.
fn join_name(root: &Path, name: &str) -> PathBuf {
    match name.split_once('/') {
        Some((scope, bare)) => root.join(scope).join(bare),
        None => root.join(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_cache() -> (tempfile::TempDir, PackageCache) {
        let dir = tempdir().unwrap();
        let cache = PackageCache::with_roots(
            dir.path().join("store"),
            dir.path().join("scratch"),
        );
        (dir, cache)
    }

    #[test]
    fn test_package_dir_unscoped() {
        let (_dir, cache) = test_cache();
        let path = cache.package_dir("react", "18.2.0");
        assert!(path.ends_with("react/18.2.0/package"));
    }

    #[test]
    fn test_package_dir_scoped() {
        let (_dir, cache) = test_cache();
        let path = cache.package_dir("@types/node", "20.0.0");
        assert!(path.ends_with("@types/node/20.0.0/package"));
    }

    #[test]
    fn test_scratch_tarball_path() {
        let (_dir, cache) = test_cache();
        let path = cache.scratch_tarball("react", "18.2.0");
        assert!(path.ends_with("react/18.2.0.tgz"));

        let path = cache.scratch_tarball("@types/node", "20.0.0");
        assert!(path.ends_with("@types/node/20.0.0.tgz"));
    }

    #[test]
    fn test_ensure_roots_idempotent() {
        let (_dir, cache) = test_cache();
        cache.ensure_roots().unwrap();
        cache.ensure_roots().unwrap();
        assert!(cache.store_root().is_dir());
        assert!(cache.scratch_root().is_dir());
    }

    #[test]
    fn test_empty_entry_is_neither_installing_nor_cached() {
        let (_dir, cache) = test_cache();
        assert!(!cache.is_installing("react", "18.2.0"));
        assert!(!cache.is_cached("react", "18.2.0"));
    }

    #[test]
    fn test_mark_installing_then_clear() {
        let (_dir, cache) = test_cache();
        cache.ensure_entry_dirs("react", "18.2.0").unwrap();

        cache.mark_installing("react", "18.2.0");
        assert!(cache.is_installing("react", "18.2.0"));

        cache.clear_installing("react", "18.2.0");
        assert!(!cache.is_installing("react", "18.2.0"));
    }

    #[test]
    fn test_mark_installing_without_dirs_is_swallowed() {
        let (_dir, cache) = test_cache();
        // No entry directories exist; the write fails silently.
        cache.mark_installing("react", "18.2.0");
        assert!(!cache.is_installing("react", "18.2.0"));
    }

    #[test]
    fn test_directory_alone_is_not_cached() {
        let (_dir, cache) = test_cache();
        cache.ensure_entry_dirs("react", "18.2.0").unwrap();

        // Package dir exists but no completion marker
        assert!(!cache.is_cached("react", "18.2.0"));

        cache.mark_cached("react", "18.2.0").unwrap();
        assert!(cache.is_cached("react", "18.2.0"));
    }

    #[test]
    fn test_stale_installing_marker_is_ignored_and_removed() {
        let (_dir, cache) = test_cache();
        cache.ensure_entry_dirs("react", "18.2.0").unwrap();

        let marker = cache.package_dir("react", "18.2.0").join(INSTALLING_MARKER);
        fs::write(&marker, b"").unwrap();

        // Backdate the marker well past the TTL
        let old = SystemTime::now() - (INSTALLING_TTL + Duration::from_secs(60));
        let times = fs::FileTimes::new().set_modified(old);
        let file = fs::File::options().write(true).open(&marker).unwrap();
        file.set_times(times).unwrap();
        drop(file);

        assert!(!cache.is_installing("react", "18.2.0"));
        assert!(!marker.exists());
    }

    #[test]
    fn test_list_empty_store() {
        let (_dir, cache) = test_cache();
        assert!(cache.list_cached().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_incomplete_entries() {
        let (_dir, cache) = test_cache();
        cache.ensure_entry_dirs("react", "18.2.0").unwrap();
        cache.ensure_entry_dirs("lodash", "4.17.21").unwrap();
        cache.mark_cached("react", "18.2.0").unwrap();

        let cached = cache.list_cached().unwrap();
        assert_eq!(cached, vec![("react".to_string(), "18.2.0".to_string())]);
    }

    #[test]
    fn test_list_scoped_packages() {
        let (_dir, cache) = test_cache();
        cache.ensure_entry_dirs("@types/node", "20.0.0").unwrap();
        cache.mark_cached("@types/node", "20.0.0").unwrap();

        let cached = cache.list_cached().unwrap();
        assert_eq!(
            cached,
            vec![("@types/node".to_string(), "20.0.0".to_string())]
        );
    }
}
