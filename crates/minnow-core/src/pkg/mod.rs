//! Package manager functionality.
//!
//! Provides:
//! - Parsing package specifications (`name@version`, `@scope/name@tag`)
//! - Fetching package metadata from an npm-compatible registry
//! - Version/tag resolution (specifiers are stripped, not range-solved)
//! - Downloading and extracting tarballs into the on-disk store
//! - Store state tracking via sentinel marker files
//! - The recursive concurrent install engine
//! - Creating symlinks/junctions in `node_modules`
//! - Reading and mutating manifest dependency maps

pub mod cache;
pub mod error;
pub mod install;
pub mod link;
pub mod manifest;
pub mod registry;
pub mod resolve;
pub mod spec;
pub mod tarball;

pub use cache::PackageCache;
pub use error::{codes as pkg_codes, PkgError};
pub use install::{
    InstallError, InstallOptions, InstallReport, InstallRequest, InstalledPackage, Installer,
};
pub use link::link_into_node_modules;
pub use manifest::{add_dependency, read_manifest_deps, DepKind};
pub use registry::{
    DistInfo, RegistryClient, RegistryMetadata, VersionRecord, DEFAULT_REGISTRY, REGISTRY_ENV,
};
pub use resolve::{resolve_version, Resolved};
pub use spec::{strip_range, PackageSpec};
pub use tarball::{download_tarball, extract_tgz, MAX_TARBALL_SIZE};
