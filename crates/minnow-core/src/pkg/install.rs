//! The install engine.
//!
//! Orchestrates version resolution, store population, `node_modules` linking,
//! and the recursive concurrent traversal of dependency graphs.
//!
//! Traversal shape, per package:
//! - extraction (or a confirmed store hit) strictly precedes descent into the
//!   package's own dependencies;
//! - linking runs concurrently with that descent;
//! - the three dependency categories fan out as concurrent units, while the
//!   entries inside one category install strictly one after another.
//!
//! Cycles terminate through an in-process set of `name@version` keys with
//! test-and-set semantics. The on-disk installing marker only mediates
//! between separate processes sharing one store; it is not consulted for
//! same-run deduplication.

use super::cache::PackageCache;
use super::error::PkgError;
use super::link::link_into_node_modules;
use super::manifest::{self, DepKind};
use super::registry::RegistryClient;
use super::resolve::resolve_version;
use super::spec::PackageSpec;
use super::tarball::{download_tarball, extract_tgz};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

/// Maximum concurrent download+extract cycles across the whole traversal.
const MAX_CONCURRENT_FETCHES: usize = 16;

/// Options threaded through every install call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Recurse into `devDependencies` of directly-requested packages.
    pub include_dev: bool,
    /// Recurse into `optionalDependencies` of directly-requested packages.
    pub include_optional: bool,
    /// Record direct requests under `devDependencies` instead of
    /// `dependencies`.
    pub save_dev: bool,
}

/// An explicit batch of packages to install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub specs: Vec<PackageSpec>,
    pub options: InstallOptions,
}

impl InstallRequest {
    /// Execute this request against a registry, store, and project root.
    pub async fn execute(
        self,
        registry: RegistryClient,
        cache: PackageCache,
        project_root: PathBuf,
    ) -> InstallReport {
        let installer = Installer::new(registry, cache, project_root, self.options);
        installer.install_batch(&self.specs).await
    }
}

/// One package that finished installing.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    /// Full registry name.
    pub name: String,
    /// Exact resolved version.
    pub version: String,
    /// Whether the store already held this entry.
    pub from_cache: bool,
    /// Where the package was linked in `node_modules`.
    pub link_path: PathBuf,
}

/// A spec that could not be installed.
#[derive(Debug, Clone)]
pub struct InstallError {
    pub spec: String,
    pub code: &'static str,
    pub message: String,
}

/// Accumulated outcome of one batch.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<InstalledPackage>,
    pub errors: Vec<InstallError>,
    /// How many installs were store hits.
    pub reused_cache: u32,
    /// Wall-clock time for the whole batch.
    pub elapsed: Duration,
}

enum Outcome {
    Installed,
    /// Dedup hit, in-flight elsewhere, or unresolvable transitive dependency.
    Skipped,
}

/// The resolver/installer engine.
///
/// One `Installer` serves one batch against one project; traversal state
/// (dedup set, report accumulators) is per-instance.
pub struct Installer {
    registry: RegistryClient,
    cache: PackageCache,
    project_root: PathBuf,
    options: InstallOptions,
    /// `name@version` keys observed this run; insertion is the test-and-set
    /// that cuts off cycles and repeated work.
    seen: Mutex<HashSet<String>>,
    /// Serializes manifest read-modify-write cycles.
    manifest_gate: Mutex<()>,
    /// Caps concurrent download+extract work.
    fetch_permits: Semaphore,
    installed: Mutex<Vec<InstalledPackage>>,
    errors: Mutex<Vec<InstallError>>,
    reused: AtomicU32,
}

impl Installer {
    #[must_use]
    pub fn new(
        registry: RegistryClient,
        cache: PackageCache,
        project_root: PathBuf,
        options: InstallOptions,
    ) -> Self {
        Self {
            registry,
            cache,
            project_root,
            options,
            seen: Mutex::new(HashSet::new()),
            manifest_gate: Mutex::new(()),
            fetch_permits: Semaphore::new(MAX_CONCURRENT_FETCHES),
            installed: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            reused: AtomicU32::new(0),
        }
    }

    /// Install an explicit list of specs, one after another.
    ///
    /// Failures are recorded in the report; one bad spec never aborts the
    /// batch.
    pub async fn install_batch(&self, specs: &[PackageSpec]) -> InstallReport {
        let started = Instant::now();

        for spec in specs {
            self.install_one(spec.clone(), false).await;
        }

        self.finish(started).await
    }

    /// Install every dependency declared in the project manifest,
    /// sequentially.
    ///
    /// # Errors
    /// Returns an error if the manifest cannot be read; per-package failures
    /// land in the report instead.
    pub async fn install_manifest(&self) -> Result<InstallReport, PkgError> {
        let manifest_path = self.project_root.join("package.json");
        let deps = manifest::read_manifest_deps(&manifest_path, false)?;

        let started = Instant::now();

        for (dep_name, specifier) in deps {
            match PackageSpec::for_dependency(&dep_name, &specifier) {
                Ok(spec) => self.install_one(spec, false).await,
                Err(e) => self.errors.lock().await.push(InstallError {
                    spec: dep_name,
                    code: e.code(),
                    message: e.message().to_string(),
                }),
            }
        }

        Ok(self.finish(started).await)
    }

    async fn finish(&self, started: Instant) -> InstallReport {
        InstallReport {
            installed: std::mem::take(&mut *self.installed.lock().await),
            errors: std::mem::take(&mut *self.errors.lock().await),
            reused_cache: self.reused.swap(0, Ordering::Relaxed),
            elapsed: started.elapsed(),
        }
    }

    /// Install one spec, recording any failure in the report.
    async fn install_one(&self, spec: PackageSpec, transitive: bool) {
        let display = spec.to_string();

        if let Err(e) = self.install(spec, transitive).await {
            self.errors.lock().await.push(InstallError {
                spec: display,
                code: e.code(),
                message: e.message().to_string(),
            });
        }
    }

    /// Install one spec and, recursively, its dependency subtree.
    ///
    /// Boxed because the future recurses through the dependency categories.
    fn install(
        &self,
        spec: PackageSpec,
        transitive: bool,
    ) -> BoxFuture<'_, Result<Outcome, PkgError>> {
        async move {
            let name = spec.full_name();

            let metadata = self.registry.fetch_metadata(&name).await?;

            let resolved =
                match resolve_version(&metadata, spec.specifier.as_deref(), transitive, &name) {
                    Ok(resolved) => resolved,
                    Err(e) if transitive => {
                        debug!(name = %name, error = %e, "skipping unresolvable transitive dependency");
                        return Ok(Outcome::Skipped);
                    }
                    Err(e) => return Err(e),
                };
            let version = resolved.version;

            // Same-run dedup: one atomic insert. A hit ends this spec silently.
            if !self.seen.lock().await.insert(format!("{name}@{version}")) {
                return Ok(Outcome::Skipped);
            }

            if resolved.fell_back {
                debug!(
                    name = %name,
                    version = %version,
                    requested = ?spec.specifier,
                    "requested version unavailable; using latest"
                );
            }

            // Cross-process exclusion: a fresh installing marker means some
            // other run owns this entry right now.
            if self.cache.is_installing(&name, &version) {
                debug!(name = %name, version = %version, "entry is being installed elsewhere; skipping");
                return Ok(Outcome::Skipped);
            }

            if !transitive {
                self.record_in_manifest(&name, &version).await;
            }

            self.cache.ensure_roots()?;
            let was_cached = self.cache.is_cached(&name, &version);
            self.cache.ensure_entry_dirs(&name, &version)?;
            self.cache.mark_installing(&name, &version);

            let record = metadata
                .record(&version)
                .cloned()
                .ok_or_else(|| PkgError::version_not_found(&name, &version))?;

            if was_cached {
                debug!(name = %name, version = %version, "store hit; skipping download");
                self.reused.fetch_add(1, Ordering::Relaxed);
                self.cache.clear_installing(&name, &version);
            } else {
                self.populate_entry(&name, &version, &record.dist.tarball)
                    .await?;
            }

            // Linking runs concurrently with the dependency recursion below;
            // both are awaited before this install returns.
            let link_project = self.project_root.clone();
            let link_name = name.clone();
            let link_src = self.cache.package_dir(&name, &version);
            let link_task = tokio::task::spawn_blocking(move || {
                link_into_node_modules(&link_project, &link_name, &link_src)
            });

            let install_dev = self.options.include_dev && !transitive;
            let install_optional = self.options.include_optional && !transitive;

            let (link_result, (), (), ()) = tokio::join!(
                link_task,
                self.install_category(&record.dependencies),
                async {
                    if install_dev {
                        self.install_category(&record.dev_dependencies).await;
                    }
                },
                async {
                    if install_optional {
                        self.install_category(&record.optional_dependencies).await;
                    }
                },
            );

            let link_path = match link_result {
                Ok(Ok(path)) => path,
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(PkgError::link_failed(format!("link task failed: {e}"))),
            };

            debug!(name = %name, version = %version, link = %link_path.display(), "installed");

            self.installed.lock().await.push(InstalledPackage {
                name,
                version,
                from_cache: was_cached,
                link_path,
            });

            Ok(Outcome::Installed)
        }
        .boxed()
    }

    /// Record a directly-requested package in the manifest.
    ///
    /// All mutations funnel through one gate so concurrent read-modify-write
    /// cycles cannot lose updates. A failed write is deliberately swallowed:
    /// the add-dependency step simply has no effect.
    async fn record_in_manifest(&self, name: &str, version: &str) {
        let kind = if self.options.save_dev {
            DepKind::Dev
        } else {
            DepKind::Runtime
        };

        let manifest_path = self.project_root.join("package.json");
        let _gate = self.manifest_gate.lock().await;

        if let Err(e) = manifest::add_dependency(&manifest_path, name, version, kind) {
            debug!(name = %name, version = %version, error = %e, "manifest update failed");
        }
    }

    /// Download and extract one store entry, then flip it to Cached.
    ///
    /// Holds a fetch permit for the duration, bounding how many populate
    /// cycles run at once across the traversal.
    async fn populate_entry(
        &self,
        name: &str,
        version: &str,
        tarball_url: &str,
    ) -> Result<(), PkgError> {
        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|_| PkgError::store_error("install semaphore closed"))?;

        let tarball_path = self.cache.scratch_tarball(name, version);
        debug!(name = %name, version = %version, url = %tarball_url, "downloading tarball");
        download_tarball(self.registry.http(), tarball_url, &tarball_path).await?;

        let package_dir = self.cache.package_dir(name, version);
        debug!(name = %name, version = %version, "extracting tarball");
        let task_tarball = tarball_path.clone();
        tokio::task::spawn_blocking(move || extract_tgz(&task_tarball, &package_dir))
            .await
            .map_err(|e| PkgError::extract_failed(format!("extract task failed: {e}")))??;

        // Only a verified extraction flips the entry to Cached.
        self.cache.mark_cached(name, version)?;
        self.cache.clear_installing(name, version);

        if let Err(e) = fs::remove_file(&tarball_path) {
            debug!(path = %tarball_path.display(), error = %e, "could not remove scratch tarball");
        }

        Ok(())
    }

    /// Install one dependency category's entries, strictly in sequence.
    async fn install_category(&self, deps: &BTreeMap<String, String>) {
        for (dep_name, specifier) in deps {
            match PackageSpec::for_dependency(dep_name, specifier) {
                Ok(dep_spec) => self.install_one(dep_spec, true).await,
                Err(e) => {
                    debug!(name = %dep_name, error = %e, "skipping malformed dependency entry");
                }
            }
        }
    }
}
