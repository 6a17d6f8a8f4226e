//! Flat linking of store entries into `node_modules`.

use super::error::PkgError;
use std::fs;
use std::path::{Path, PathBuf};

/// Link a store entry into a project's `node_modules`.
///
/// `name` is the full registry name. Unscoped packages link at
/// `<project>/node_modules/<name>`; scoped packages link at
/// `<project>/node_modules/@<scope>/<name>`, creating the scope directory
/// when needed.
///
/// Hoisting is flat: every package links directly under one module directory,
/// and a pre-existing link or directory at the target is replaced without
/// any version-compatibility check (last writer wins).
///
/// # Errors
/// Returns an error if directories or the link cannot be created.
pub fn link_into_node_modules(
    project_root: &Path,
    name: &str,
    store_pkg_dir: &Path,
) -> Result<PathBuf, PkgError> {
    let node_modules = project_root.join("node_modules");

    fs::create_dir_all(&node_modules).map_err(|e| {
        PkgError::link_failed(format!("Failed to create node_modules directory: {e}"))
    })?;

    let link_path = match name.split_once('/') {
        Some((scope, bare)) => {
            let scope_dir = node_modules.join(scope);
            fs::create_dir_all(&scope_dir).map_err(|e| {
                PkgError::link_failed(format!("Failed to create scope directory {scope}: {e}"))
            })?;
            scope_dir.join(bare)
        }
        None => node_modules.join(name),
    };

    if link_path.symlink_metadata().is_ok() {
        remove_link_or_dir(&link_path)?;
    }

    create_dir_link(store_pkg_dir, &link_path)?;

    Ok(link_path)
}

/// Remove whatever occupies the link target: symlink, junction, directory,
/// or plain file.
fn remove_link_or_dir(path: &Path) -> Result<(), PkgError> {
    #[cfg(unix)]
    {
        if let Ok(metadata) = fs::symlink_metadata(path) {
            if metadata.file_type().is_symlink() {
                fs::remove_file(path).map_err(|e| {
                    PkgError::link_failed(format!("Failed to remove existing symlink: {e}"))
                })?;
                return Ok(());
            }
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;

        if let Ok(metadata) = fs::symlink_metadata(path) {
            // FILE_ATTRIBUTE_REPARSE_POINT = 0x400: junction or symlink
            if metadata.file_attributes() & 0x400 != 0 {
                fs::remove_dir(path).map_err(|e| {
                    PkgError::link_failed(format!("Failed to remove existing junction: {e}"))
                })?;
                return Ok(());
            }
        }
    }

    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| {
            PkgError::link_failed(format!("Failed to remove existing directory: {e}"))
        })?;
    } else if path.exists() {
        fs::remove_file(path)
            .map_err(|e| PkgError::link_failed(format!("Failed to remove existing file: {e}")))?;
    }

    Ok(())
}

/// Create a directory link (symlink on Unix, junction on Windows).
fn create_dir_link(src: &Path, dst: &Path) -> Result<(), PkgError> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create symlink from {} to {}: {e}",
                dst.display(),
                src.display()
            ))
        })?;
    }

    #[cfg(windows)]
    {
        junction::create(src, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create junction from {} to {}: {e}",
                dst.display(),
                src.display()
            ))
        })?;
    }

    #[cfg(not(any(unix, windows)))]
    {
        copy_dir_all(src, dst)
            .map_err(|e| PkgError::link_failed(format!("Failed to copy directory: {e}")))?;
    }

    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &dst.join(entry.file_name()))?;
        } else {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_store_pkg(root: &Path, segments: &[&str]) -> PathBuf {
        let mut dir = root.to_path_buf();
        for s in segments {
            dir = dir.join(s);
        }
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), "{}").unwrap();
        dir
    }

    #[test]
    fn test_link_unscoped_package() {
        let project = tempdir().unwrap();
        let store = tempdir().unwrap();
        let pkg = fake_store_pkg(store.path(), &["react", "18.2.0", "package"]);

        let link = link_into_node_modules(project.path(), "react", &pkg).unwrap();

        assert_eq!(link, project.path().join("node_modules").join("react"));
        assert!(link.join("package.json").exists());
    }

    #[test]
    fn test_link_scoped_package_includes_scope_segment() {
        let project = tempdir().unwrap();
        let store = tempdir().unwrap();
        let pkg = fake_store_pkg(store.path(), &["@types", "node", "20.0.0", "package"]);

        let link = link_into_node_modules(project.path(), "@types/node", &pkg).unwrap();

        assert_eq!(
            link,
            project
                .path()
                .join("node_modules")
                .join("@types")
                .join("node")
        );
        assert!(link.join("package.json").exists());
    }

    #[test]
    fn test_link_replaces_existing_directory() {
        let project = tempdir().unwrap();
        let store = tempdir().unwrap();

        let existing = project.path().join("node_modules").join("react");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("old.txt"), "old").unwrap();

        let pkg = fake_store_pkg(store.path(), &["react", "18.2.0", "package"]);
        let link = link_into_node_modules(project.path(), "react", &pkg).unwrap();

        assert!(link.join("package.json").exists());
        assert!(!link.join("old.txt").exists());
    }

    #[test]
    fn test_link_last_writer_wins() {
        let project = tempdir().unwrap();
        let store = tempdir().unwrap();

        let v1 = fake_store_pkg(store.path(), &["dup", "1.0.0", "package"]);
        fs::write(v1.join("which"), "one").unwrap();
        let v2 = fake_store_pkg(store.path(), &["dup", "2.0.0", "package"]);
        fs::write(v2.join("which"), "two").unwrap();

        link_into_node_modules(project.path(), "dup", &v1).unwrap();
        let link = link_into_node_modules(project.path(), "dup", &v2).unwrap();

        assert_eq!(fs::read_to_string(link.join("which")).unwrap(), "two");
    }

    #[test]
    fn test_link_idempotent() {
        let project = tempdir().unwrap();
        let store = tempdir().unwrap();
        let pkg = fake_store_pkg(store.path(), &["react", "18.2.0", "package"]);

        link_into_node_modules(project.path(), "react", &pkg).unwrap();
        let link = link_into_node_modules(project.path(), "react", &pkg).unwrap();

        assert!(link.join("package.json").exists());
    }
}
