use crate::config::Channel;
use crate::version::SCHEMA_VERSION;
use std::path::{Path, PathBuf};

/// Find the nearest `package.json` by walking up from `start`.
///
/// Returns the path to the manifest file itself, or `None` if no ancestor
/// directory contains one.
#[must_use]
pub fn nearest_manifest(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join("package.json");
        if candidate.is_file() {
            return Some(candidate);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Get the cache directory for minnow.
///
/// Uses platform-appropriate locations with versioning:
/// - Linux: `$XDG_CACHE_HOME/minnow/v{N}/{channel}` or `~/.cache/minnow/v{N}/{channel}`
/// - macOS: `~/Library/Caches/minnow/v{N}/{channel}`
/// - Windows: `%LOCALAPPDATA%\minnow\cache\v{N}\{channel}`
#[must_use]
pub fn cache_dir(channel: Channel) -> PathBuf {
    let base = dirs_next::cache_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".minnow-cache"),
                |p| p.join(".cache").join("minnow"),
            )
        },
        |p| p.join("minnow"),
    );

    base.join(format!("v{SCHEMA_VERSION}"))
        .join(channel.as_str())
}
