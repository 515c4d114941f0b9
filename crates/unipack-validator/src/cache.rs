use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};
use unipack_core::{CatalogEntry, InstalledPackage, PackageCatalog, PackageSourceKind};

use crate::{Clock, SystemClock};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// The comparatively slow "what is installed right now" query.
pub trait InstalledSource {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>>;
}

/// Installed packages as seen at one point in time. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSnapshot {
    packages: Vec<InstalledPackage>,
    captured_at: Instant,
}

impl InstalledSnapshot {
    pub fn packages(&self) -> &[InstalledPackage] {
        &self.packages
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn find(&self, id: &str) -> Option<&InstalledPackage> {
        self.packages.iter().find(|package| package.matches_id(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    fn id_set(&self) -> HashSet<String> {
        self.packages
            .iter()
            .map(|package| package.id.to_ascii_lowercase())
            .collect()
    }
}

pub struct InstalledPackageCache<S, C = SystemClock> {
    source: S,
    clock: C,
    ttl: Duration,
    snapshot: Option<Arc<InstalledSnapshot>>,
    invalidated: bool,
}

impl<S: InstalledSource> InstalledPackageCache<S, SystemClock> {
    pub fn with_system_clock(source: S, ttl: Duration) -> Self {
        Self::new(source, SystemClock, ttl)
    }
}

impl<S: InstalledSource, C: Clock> InstalledPackageCache<S, C> {
    pub fn new(source: S, clock: C, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            snapshot: None,
            invalidated: false,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached snapshot while it is younger than the TTL, otherwise re-queries.
    ///
    /// A failed query leaves the previous snapshot in place and returns the error.
    pub fn installed_packages(&mut self) -> Result<Arc<InstalledSnapshot>> {
        let now = self.clock.now();
        if let Some(snapshot) = &self.snapshot {
            let age = now.saturating_duration_since(snapshot.captured_at);
            if !self.invalidated && age < self.ttl {
                return Ok(Arc::clone(snapshot));
            }
        }

        let packages = self
            .source
            .list_installed()
            .context("failed to list installed packages")?;
        debug!("installed package cache refreshed ({} packages)", packages.len());

        let snapshot = Arc::new(InstalledSnapshot {
            packages,
            captured_at: now,
        });
        self.snapshot = Some(Arc::clone(&snapshot));
        self.invalidated = false;
        Ok(snapshot)
    }

    /// Forces the next read to query the source again.
    pub fn refresh_cache(&mut self) {
        self.invalidated = true;
    }

    pub fn is_installed(&mut self, id: &str) -> Result<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        Ok(self.installed_packages()?.contains(id))
    }

    pub fn version(&mut self, id: &str) -> Result<Option<String>> {
        Ok(self.full_info(id)?.map(|package| package.version))
    }

    pub fn full_info(&mut self, id: &str) -> Result<Option<InstalledPackage>> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.installed_packages()?.find(id).cloned())
    }

    /// Installation state of every id, all read from the same snapshot.
    pub fn check_many<I, T>(&mut self, ids: I) -> Result<BTreeMap<String, bool>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let installed = self.installed_packages()?.id_set();
        Ok(ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref();
                (id.to_string(), installed.contains(&id.to_ascii_lowercase()))
            })
            .collect())
    }

    /// Catalog entries whose package is not installed, in catalog order.
    pub fn installable(&mut self, catalog: &PackageCatalog) -> Result<Vec<CatalogEntry>> {
        let installed = self.installed_packages()?.id_set();
        Ok(catalog
            .all()
            .filter(|entry| !installed.contains(&entry.package_id.to_ascii_lowercase()))
            .cloned()
            .collect())
    }

    pub fn project_packages(&mut self) -> Result<Vec<InstalledPackage>> {
        Ok(self
            .installed_packages()?
            .packages()
            .iter()
            .filter(|package| package.source.is_project_source())
            .cloned()
            .collect())
    }

    pub fn non_builtin_packages(&mut self) -> Result<Vec<InstalledPackage>> {
        Ok(self
            .installed_packages()?
            .packages()
            .iter()
            .filter(|package| package.source != PackageSourceKind::BuiltIn)
            .cloned()
            .collect())
    }

    pub fn is_development_package(&mut self, id: &str) -> Result<bool> {
        Ok(self
            .full_info(id)?
            .is_some_and(|package| package.source.is_development()))
    }

    /// Shallow check: true when an installed package lists a direct dependency that is not
    /// installed. Versions and transitive dependencies are not inspected.
    pub fn has_dependency_conflicts(&mut self, id: &str) -> Result<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        let snapshot = self.installed_packages()?;
        let Some(package) = snapshot.find(id) else {
            return Ok(false);
        };
        Ok(package
            .dependencies
            .iter()
            .any(|dependency| !snapshot.contains(dependency)))
    }

    /// Whether an install of `id` should be offered right now.
    pub fn can_install(&mut self, id: &str, queue_busy: bool) -> Result<bool> {
        Ok(!queue_busy && !self.is_installed(id)?)
    }

    pub fn describe_package(&mut self, id: &str) -> Result<String> {
        let Some(package) = self.full_info(id)? else {
            let text = format!("Package '{id}' is not installed.");
            info!("{text}");
            return Ok(text);
        };

        let text = format!(
            "Package Info:\n  Name: {}\n  ID: {}\n  Version: {}\n  Source: {}\n  Description: {}\n  Dependencies: {}",
            package.display_name,
            package.id,
            package.version,
            package.source.as_str(),
            package.description,
            package.dependencies.len()
        );
        info!("{text}");
        Ok(text)
    }
}
