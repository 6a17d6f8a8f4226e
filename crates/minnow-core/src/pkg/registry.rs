//! npm-compatible registry client and decoded metadata schema.

use super::error::PkgError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use url::Url;

/// Default npm registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override the registry URL.
pub const REGISTRY_ENV: &str = "MINNOW_NPM_REGISTRY";

/// Decoded registry metadata for one package.
///
/// Both maps default to empty when the registry omits the field, so lookups
/// never have to reason about "missing" vs "empty".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryMetadata {
    /// Named pointers into `versions` (e.g. `latest`, `beta`).
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,

    /// Per-version records.
    #[serde(default)]
    pub versions: HashMap<String, VersionRecord>,
}

impl RegistryMetadata {
    /// The version the `latest` dist-tag points to, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    /// The record for an exact version string, if published.
    #[must_use]
    pub fn record(&self, version: &str) -> Option<&VersionRecord> {
        self.versions.get(version)
    }
}

/// One published version of a package.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionRecord {
    pub dist: DistInfo,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default, rename = "optionalDependencies")]
    pub optional_dependencies: BTreeMap<String, String>,
}

/// Distribution info for a published version.
#[derive(Debug, Clone, Deserialize)]
pub struct DistInfo {
    /// Absolute URL of the version's tarball.
    pub tarball: String,
}

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("minnow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Create a client using the registry URL from environment or default.
    ///
    /// # Errors
    /// Returns an error if the client cannot be created.
    pub fn from_env() -> Result<Self, PkgError> {
        let url = std::env::var(REGISTRY_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY.to_string());
        Self::new(&url)
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the HTTP client (for reuse in tarball downloads).
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Fetch and decode the metadata for a package.
    ///
    /// `name` is the full registry name (`react` or `@types/node`).
    ///
    /// # Errors
    /// Returns `PKG_NOT_FOUND` on a 404, `PKG_REGISTRY_ERROR` on transport or
    /// decode failures.
    pub async fn fetch_metadata(&self, name: &str) -> Result<RegistryMetadata, PkgError> {
        // Scoped names keep their slash percent-encoded in the request path
        let encoded_name = if name.starts_with('@') {
            name.replace('/', "%2F")
        } else {
            name.to_string()
        };

        let url = self
            .base_url
            .join(&encoded_name)
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))?;

        let response = self.http.get(url.as_str()).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        let metadata: RegistryMetadata = response.json().await?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn decode(json: serde_json::Value) -> RegistryMetadata {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_decode_full_metadata() {
        let meta = decode(serde_json::json!({
            "name": "react",
            "dist-tags": { "latest": "18.2.0", "next": "19.0.0-rc.0" },
            "versions": {
                "18.2.0": {
                    "dist": { "tarball": "https://example.com/react-18.2.0.tgz" },
                    "dependencies": { "loose-envify": "^1.1.0" }
                }
            }
        }));

        assert_eq!(meta.latest(), Some("18.2.0"));
        let record = meta.record("18.2.0").unwrap();
        assert_eq!(record.dist.tarball, "https://example.com/react-18.2.0.tgz");
        assert_eq!(record.dependencies.len(), 1);
        assert!(record.dev_dependencies.is_empty());
        assert!(record.optional_dependencies.is_empty());
    }

    #[test]
    fn test_decode_missing_sections_default_empty() {
        let meta = decode(serde_json::json!({ "name": "bare" }));

        assert_eq!(meta.latest(), None);
        assert!(meta.versions.is_empty());
        assert!(meta.record("1.0.0").is_none());
    }

    #[test]
    fn test_decode_unknown_fields_ignored() {
        let meta = decode(serde_json::json!({
            "name": "pkg",
            "readme": "...",
            "maintainers": [],
            "dist-tags": { "latest": "1.0.0" },
            "versions": {
                "1.0.0": {
                    "dist": { "tarball": "https://example.com/p.tgz", "shasum": "abc" },
                    "scripts": { "postinstall": "true" }
                }
            }
        }));

        assert_eq!(meta.latest(), Some("1.0.0"));
        assert!(meta.record("1.0.0").is_some());
    }

    #[test]
    fn test_client_creation() {
        assert!(RegistryClient::new(DEFAULT_REGISTRY).is_ok());
    }

    #[test]
    fn test_client_invalid_url() {
        assert!(RegistryClient::new("not-a-url").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_override() {
        std::env::set_var(REGISTRY_ENV, "http://127.0.0.1:4873/");
        let client = RegistryClient::from_env().unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:4873/");
        std::env::remove_var(REGISTRY_ENV);
    }

    #[test]
    #[serial]
    fn test_from_env_default() {
        std::env::remove_var(REGISTRY_ENV);
        let client = RegistryClient::from_env().unwrap();
        assert_eq!(client.base_url().as_str(), DEFAULT_REGISTRY);
    }
}
