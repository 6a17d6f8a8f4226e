//! Tarball download and extraction.

use super::error::PkgError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use std::time::Duration;
use tar::Archive;

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Download timeout in seconds.
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Download a tarball from `url` to `dest`.
///
/// The destination's parent directory must already exist. The body is
/// rejected when it exceeds [`MAX_TARBALL_SIZE`].
///
/// # Errors
/// Returns an error if the request fails, the status is not success, the
/// body is too large, or the file cannot be written.
pub async fn download_tarball(client: &Client, url: &str, dest: &Path) -> Result<(), PkgError> {
    let response = client
        .get(url)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

    if !response.status().is_success() {
        return Err(PkgError::download_failed(format!(
            "Download failed with status {} for '{url}'",
            response.status()
        )));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_TARBALL_SIZE {
            return Err(PkgError::download_failed(format!(
                "Tarball too large: {len} bytes (max: {MAX_TARBALL_SIZE})"
            )));
        }
    }

    let bytes: Bytes = response
        .bytes()
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to read response body: {e}")))?;

    if bytes.len() as u64 > MAX_TARBALL_SIZE {
        return Err(PkgError::download_failed(format!(
            "Tarball too large: {} bytes (max: {MAX_TARBALL_SIZE})",
            bytes.len()
        )));
    }

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| PkgError::download_failed(format!("Failed to write '{}': {e}", dest.display())))?;

    Ok(())
}

/// Extract a gzipped tarball into a package directory.
///
/// Registry tarballs wrap their contents in a single top-level directory
/// (usually `package/`, sometimes the bare package name); that leading
/// component is stripped so the contents land directly in `package_dir`.
/// Extraction merges into an existing directory — sentinel files already
/// present there are left alone.
///
/// Entries with absolute paths or parent-dir components are rejected;
/// symlinks and other special entries are skipped.
///
/// # Errors
/// Returns an error if the archive cannot be read or an entry cannot be
/// written. Callers must treat any error as a failed population cycle and
/// must not mark the entry complete.
pub fn extract_tgz(tarball: &Path, package_dir: &Path) -> Result<(), PkgError> {
    let file = File::open(tarball).map_err(|e| {
        PkgError::extract_failed(format!("Failed to open '{}': {e}", tarball.display()))
    })?;

    let gz = GzDecoder::new(file);
    let mut archive = Archive::new(gz);

    for entry in archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();

        if path.is_absolute() {
            return Err(PkgError::extract_failed(format!(
                "Tarball contains absolute path: {}",
                path.display()
            )));
        }

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PkgError::extract_failed(format!(
                "Tarball contains path traversal: {}",
                path.display()
            )));
        }

        // Strip the wrapping directory
        let mut components = path.components();
        if components.next().is_none() {
            continue;
        }
        let rel = components.as_path();
        if rel.as_os_str().is_empty() {
            continue;
        }

        let dest_path = package_dir.join(rel);
        if !dest_path.starts_with(package_dir) {
            return Err(PkgError::extract_failed(format!(
                "Tarball entry escapes destination: {}",
                path.display()
            )));
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            let mut out = File::create(&dest_path)?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| PkgError::extract_failed(format!("Failed to write entry: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Symlinks and other special entries are skipped
    }

    Ok(())
}
