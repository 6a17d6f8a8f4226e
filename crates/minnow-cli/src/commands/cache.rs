//! `minnow cache` subcommands.

use minnow_core::config::Channel;
use minnow_core::pkg::PackageCache;
use miette::{IntoDiagnostic, Result};

/// List fully-populated store entries with their sizes.
pub fn ls() -> Result<()> {
    let cache = PackageCache::new(Channel::Stable);
    let entries = cache.list_cached().into_diagnostic()?;

    if entries.is_empty() {
        println!("Store is empty");
        return Ok(());
    }

    let mut total = 0u64;
    for (name, version) in &entries {
        let size = minnow_util::fs::dir_size(&cache.package_dir(name, version)).unwrap_or(0);
        total += size;
        println!("{name}@{version}  {}", format_size(size));
    }

    println!("{} package(s), {}", entries.len(), format_size(total));
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
