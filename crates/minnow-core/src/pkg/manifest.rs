//! Manifest (`package.json`) accessor.
//!
//! Reads dependency maps and adds resolved dependencies. Mutation is a full
//! read-modify-write of the file; unrelated fields are preserved and the
//! write is atomic. Callers that mutate concurrently must serialize access
//! themselves (the install engine routes every mutation through one lock).

use super::error::PkgError;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Which manifest category a dependency is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Runtime,
    Dev,
}

impl DepKind {
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Self::Runtime => "dependencies",
            Self::Dev => "devDependencies",
        }
    }
}

/// Read declared dependencies from a manifest file.
///
/// Returns `(name, specifier)` pairs sorted by name: the `dependencies`
/// section always, plus `devDependencies` when `include_dev` is set. Entries
/// whose specifier is not a string are skipped with a debug note.
///
/// # Errors
/// Returns an error if the file is missing, unreadable, or not a JSON object.
pub fn read_manifest_deps(
    manifest_path: &Path,
    include_dev: bool,
) -> Result<Vec<(String, String)>, PkgError> {
    if !manifest_path.exists() {
        return Err(PkgError::manifest_not_found(manifest_path));
    }

    let content = minnow_util::fs::read_to_string_lossy(manifest_path)
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to read: {e}")))?;

    let root: Value = serde_json::from_str(&content)
        .map_err(|e| PkgError::manifest_invalid(format!("Invalid JSON: {e}")))?;

    let root = root
        .as_object()
        .ok_or_else(|| PkgError::manifest_invalid("package.json must be a JSON object"))?;

    let mut deps = Vec::new();
    collect_section(root, "dependencies", &mut deps);
    if include_dev {
        collect_section(root, "devDependencies", &mut deps);
    }

    deps.sort_by(|a, b| a.0.cmp(&b.0));
    deps.dedup_by(|a, b| a.0 == b.0);

    Ok(deps)
}

fn collect_section(
    root: &Map<String, Value>,
    section: &str,
    deps: &mut Vec<(String, String)>,
) {
    let Some(value) = root.get(section) else {
        return;
    };

    let Some(map) = value.as_object() else {
        debug!(section, "manifest section is not an object; skipping");
        return;
    };

    for (name, specifier) in map {
        if let Some(specifier) = specifier.as_str() {
            deps.push((name.clone(), specifier.to_string()));
        } else {
            debug!(name, section, "manifest entry is not a string; skipping");
        }
    }
}

/// Add `name` → `version` to the selected dependency category.
///
/// Full read-modify-write: the manifest is parsed, the entry inserted
/// (creating the section if absent), and the whole document rewritten
/// atomically. All other fields pass through untouched.
///
/// # Errors
/// Returns an error if the manifest cannot be read, parsed, or written.
pub fn add_dependency(
    manifest_path: &Path,
    name: &str,
    version: &str,
    kind: DepKind,
) -> Result<(), PkgError> {
    let content = minnow_util::fs::read_to_string_lossy(manifest_path)
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to read: {e}")))?;

    let mut root: Value = serde_json::from_str(&content)
        .map_err(|e| PkgError::manifest_invalid(format!("Invalid JSON: {e}")))?;

    let obj = root
        .as_object_mut()
        .ok_or_else(|| PkgError::manifest_invalid("package.json must be a JSON object"))?;

    let section = obj
        .entry(kind.section())
        .or_insert_with(|| Value::Object(Map::new()));

    let map = section.as_object_mut().ok_or_else(|| {
        PkgError::manifest_invalid(format!("'{}' must be an object", kind.section()))
    })?;

    map.insert(name.to_string(), Value::String(version.to_string()));

    let mut out = serde_json::to_string_pretty(&root)
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to serialize: {e}")))?;
    out.push('\n');

    minnow_util::fs::atomic_write(manifest_path, out.as_bytes())
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to write: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("package.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_dependencies_only() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{
                "name": "test",
                "dependencies": { "b": "2.0.0", "a": "^1.0.0" },
                "devDependencies": { "c": "^3.0.0" }
            }"#,
        );

        let deps = read_manifest_deps(&path, false).unwrap();
        assert_eq!(
            deps,
            vec![
                ("a".to_string(), "^1.0.0".to_string()),
                ("b".to_string(), "2.0.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_read_includes_dev_when_asked() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{
                "dependencies": { "a": "1.0.0" },
                "devDependencies": { "c": "3.0.0" }
            }"#,
        );

        let deps = read_manifest_deps(&path, true).unwrap();
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().any(|(n, _)| n == "c"));
    }

    #[test]
    fn test_read_skips_non_string_specifiers() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{ "dependencies": { "good": "1.0.0", "bad": 42 } }"#,
        );

        let deps = read_manifest_deps(&path, false).unwrap();
        assert_eq!(deps, vec![("good".to_string(), "1.0.0".to_string())]);
    }

    #[test]
    fn test_read_missing_file_errors() {
        let dir = tempdir().unwrap();
        let err = read_manifest_deps(&dir.path().join("package.json"), false).unwrap_err();
        assert_eq!(err.code(), crate::pkg::pkg_codes::PKG_MANIFEST_NOT_FOUND);
    }

    #[test]
    fn test_read_invalid_json_errors() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), "{{{not json");
        assert!(read_manifest_deps(&path, false).is_err());
    }

    #[test]
    fn test_read_no_sections_is_empty() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), r#"{ "name": "bare" }"#);
        assert!(read_manifest_deps(&path, false).unwrap().is_empty());
    }

    #[test]
    fn test_add_dependency_creates_section() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), r#"{ "name": "test" }"#);

        add_dependency(&path, "react", "18.2.0", DepKind::Runtime).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(root["dependencies"]["react"], "18.2.0");
        assert_eq!(root["name"], "test");
    }

    #[test]
    fn test_add_dependency_dev_section() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), "{}");

        add_dependency(&path, "eslint", "9.0.0", DepKind::Dev).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(root["devDependencies"]["eslint"], "9.0.0");
        assert!(root.get("dependencies").is_none());
    }

    #[test]
    fn test_add_dependency_overwrites_existing_entry() {
        let dir = tempdir().unwrap();
        let path = write_manifest(dir.path(), r#"{ "dependencies": { "react": "17.0.0" } }"#);

        add_dependency(&path, "react", "18.2.0", DepKind::Runtime).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(root["dependencies"]["react"], "18.2.0");
    }

    #[test]
    fn test_add_dependency_preserves_unrelated_fields() {
        let dir = tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            r#"{ "name": "test", "scripts": { "start": "node ." } }"#,
        );

        add_dependency(&path, "react", "18.2.0", DepKind::Runtime).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(root["scripts"]["start"], "node .");
    }

    #[test]
    fn test_add_dependency_missing_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("package.json");
        assert!(add_dependency(&path, "react", "18.2.0", DepKind::Runtime).is_err());
    }
}
