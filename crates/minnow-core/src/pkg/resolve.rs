//! Version and dist-tag resolution.
//!
//! Resolution is deliberately simple: an empty specifier means the `latest`
//! tag, a specifier matching a dist-tag follows the tag, anything else is
//! taken verbatim as an exact version. Semver ranges are never solved here;
//! callers strip range operators before resolution.

use super::error::PkgError;
use super::registry::RegistryMetadata;

/// Outcome of resolving a specifier against registry metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The exact version to install. Guaranteed to have a record in the
    /// metadata this was resolved from.
    pub version: String,
    /// True when a transitive request named a version the registry does not
    /// have and resolution fell back to `latest`.
    pub fell_back: bool,
}

/// Resolve a version specifier for `name`.
///
/// # Rules
/// - Empty specifier resolves to `dist-tags.latest`.
/// - A specifier naming a dist-tag resolves to that tag's target.
/// - Anything else is used verbatim.
/// - For `transitive` requests with no record for the result, resolution
///   falls back to `latest`.
///
/// # Errors
/// Returns `PKG_VERSION_NOT_FOUND` when no version record exists for the
/// final result (including after fallback).
pub fn resolve_version(
    metadata: &RegistryMetadata,
    specifier: Option<&str>,
    transitive: bool,
    name: &str,
) -> Result<Resolved, PkgError> {
    let latest = metadata.latest();

    let mut version = match specifier {
        None | Some("") => latest
            .ok_or_else(|| PkgError::version_not_found(name, "latest"))?
            .to_string(),
        Some(s) => metadata
            .dist_tags
            .get(s)
            .cloned()
            .unwrap_or_else(|| s.to_string()),
    };

    let mut fell_back = false;
    if transitive && metadata.record(&version).is_none() {
        if let Some(latest) = latest {
            version = latest.to_string();
            fell_back = true;
        }
    }

    if metadata.record(&version).is_none() {
        return Err(PkgError::version_not_found(
            name,
            specifier.unwrap_or("latest"),
        ));
    }

    Ok(Resolved { version, fell_back })
}
