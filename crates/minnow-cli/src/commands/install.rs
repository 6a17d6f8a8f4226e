//! `minnow install` command implementation.
//!
//! With no package operands and a manifest present, installs every declared
//! dependency. With operands, installs the requested packages and records
//! them in the manifest. Without a manifest there is nothing to do; the user
//! is pointed at `minnow init`.

use crate::messages;
use minnow_core::config::Channel;
use minnow_core::paths;
use minnow_core::pkg::{
    InstallOptions, InstallRequest, Installer, PackageCache, PackageSpec, RegistryClient,
};
use miette::{IntoDiagnostic, Result};
use std::path::Path;
use tracing::debug;

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package specs (e.g. "react", "react@18.2.0", "@types/node@beta")
    pub specs: Vec<String>,

    /// Save installed packages as devDependencies
    #[arg(short = 'D', long = "save-dev", conflicts_with = "save_prod")]
    pub save_dev: bool,

    /// Save installed packages as regular dependencies (the default)
    #[arg(short = 'P', long = "save-prod")]
    pub save_prod: bool,

    /// Show emojis on the output
    #[arg(long)]
    pub emoji: bool,

    /// Show additional information on the output
    #[arg(long)]
    pub debug: bool,

    /// Also download devDependencies
    #[arg(long = "download-dev")]
    pub download_dev: bool,

    /// Also download optionalDependencies
    #[arg(long = "download-opt", conflicts_with = "no_optional")]
    pub download_opt: bool,

    /// Ignore optional dependencies
    #[arg(long = "no-optional")]
    pub no_optional: bool,
}

pub async fn run(cwd: &Path, args: InstallArgs) -> Result<()> {
    debug!(cwd = %cwd.display(), "install command invoked");

    let Some(manifest_path) = paths::nearest_manifest(cwd) else {
        messages::no_manifest(args.emoji);
        return Ok(());
    };

    let project_root = manifest_path
        .parent()
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);

    let registry = RegistryClient::from_env().into_diagnostic()?;
    let cache = PackageCache::new(Channel::Stable);
    cache.ensure_roots().into_diagnostic()?;

    let options = InstallOptions {
        include_dev: args.download_dev,
        include_optional: args.download_opt && !args.no_optional,
        save_dev: args.save_dev && !args.save_prod,
    };

    if args.specs.is_empty() {
        messages::manifest_found(args.emoji);
        let installer = Installer::new(registry, cache, project_root, options);
        let report = installer.install_manifest().await.into_diagnostic()?;
        messages::report(args.emoji, &report);
        return Ok(());
    }

    let mut specs = Vec::new();
    for raw in &args.specs {
        match PackageSpec::parse(raw) {
            Ok(spec) => specs.push(spec),
            Err(e) => messages::invalid_spec(args.emoji, raw, &e),
        }
    }

    if specs.is_empty() {
        messages::no_packages(args.emoji);
        return Ok(());
    }

    messages::installing(args.emoji, &args.specs);

    let request = InstallRequest { specs, options };
    let report = request.execute(registry, cache, project_root).await;

    messages::report(args.emoji, &report);
    Ok(())
}
