//! `minnow update` command implementation.
//!
//! Re-resolves manifest dependencies against the registry and reinstalls
//! them. Without `--latest`, each entry resolves through its manifest
//! specifier again (tags move, exact pins stay put); with `--latest`, every
//! target jumps to the `latest` dist-tag.

use crate::messages;
use minnow_core::config::Channel;
use minnow_core::paths;
use minnow_core::pkg::{
    read_manifest_deps, strip_range, InstallOptions, Installer, PackageCache, PackageSpec,
    RegistryClient,
};
use miette::{IntoDiagnostic, Result};
use semver::Version;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Specific packages to update (empty = all dependencies)
    pub packages: Vec<String>,

    /// Update to the latest version, ignoring manifest specifiers
    #[arg(short = 'l', long)]
    pub latest: bool,

    /// Update only devDependencies
    #[arg(short = 'D', long)]
    pub dev: bool,

    /// Show emojis on the output
    #[arg(long)]
    pub emoji: bool,
}

pub async fn run(cwd: &Path, args: UpdateArgs) -> Result<()> {
    debug!(cwd = %cwd.display(), "update command invoked");

    let Some(manifest_path) = paths::nearest_manifest(cwd) else {
        messages::no_manifest(args.emoji);
        return Ok(());
    };

    let project_root = manifest_path
        .parent()
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);

    // Scope the scan to one category: runtime deps by default, dev with -D
    let runtime = read_manifest_deps(&manifest_path, false).into_diagnostic()?;
    let current: Vec<(String, String)> = if args.dev {
        let runtime_names: HashSet<String> = runtime.iter().map(|(n, _)| n.clone()).collect();
        read_manifest_deps(&manifest_path, true)
            .into_diagnostic()?
            .into_iter()
            .filter(|(name, _)| !runtime_names.contains(name))
            .collect()
    } else {
        runtime
    };

    let mut targets: Vec<(PackageSpec, String)> = Vec::new();

    if args.packages.is_empty() {
        for (name, specifier) in &current {
            let wanted = if args.latest { "" } else { specifier.as_str() };
            match PackageSpec::for_dependency(name, wanted) {
                Ok(spec) => targets.push((spec, specifier.clone())),
                Err(e) => messages::invalid_spec(args.emoji, name, &e),
            }
        }
    } else {
        for raw in &args.packages {
            match PackageSpec::parse(raw) {
                Ok(mut spec) => {
                    let Some((_, specifier)) =
                        current.iter().find(|(name, _)| *name == spec.full_name())
                    else {
                        messages::not_a_dependency(args.emoji, raw);
                        continue;
                    };
                    if args.latest {
                        spec.specifier = None;
                    } else if spec.specifier.is_none() {
                        // A bare name re-resolves through its manifest entry
                        match PackageSpec::for_dependency(&spec.full_name(), specifier) {
                            Ok(from_manifest) => spec = from_manifest,
                            Err(e) => {
                                messages::invalid_spec(args.emoji, raw, &e);
                                continue;
                            }
                        }
                    }
                    targets.push((spec, specifier.clone()));
                }
                Err(e) => messages::invalid_spec(args.emoji, raw, &e),
            }
        }
    }

    if targets.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }

    let registry = RegistryClient::from_env().into_diagnostic()?;
    let cache = PackageCache::new(Channel::Stable);
    cache.ensure_roots().into_diagnostic()?;

    let options = InstallOptions {
        save_dev: args.dev,
        ..InstallOptions::default()
    };

    let specs: Vec<PackageSpec> = targets.iter().map(|(spec, _)| spec.clone()).collect();
    let installer = Installer::new(registry, cache, project_root, options);
    let report = installer.install_batch(&specs).await;

    let mut updated = Vec::new();
    let mut up_to_date = 0usize;

    for (spec, previous_specifier) in &targets {
        let name = spec.full_name();
        let Some(installed) = report.installed.iter().find(|pkg| pkg.name == name) else {
            continue;
        };

        let previous = strip_range(previous_specifier);
        if same_version(previous, &installed.version) {
            up_to_date += 1;
        } else {
            updated.push((name, previous.to_string(), installed.version.clone()));
        }
    }

    messages::update_summary(args.emoji, &updated, up_to_date);
    messages::report(args.emoji, &report);
    Ok(())
}

/// Compare two version strings, semver-aware when both parse.
fn same_version(a: &str, b: &str) -> bool {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
