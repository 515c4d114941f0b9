use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::debug;
use unipack_core::{CatalogEntry, InstalledPackage, PackageCatalog, PackageSourceKind};
use unipack_installer::{AddResult, InstallBackend, InstallOperation, OperationStatus};
use unipack_validator::InstalledSource;

use crate::manifest::{
    add_manifest_dependency, manifest_dependencies, read_embedded_packages, read_lock,
    read_manifest, upsert_lock_entry,
};
use crate::{parse_locator, Locator, LockEntry, UnityProject};

const UNITY_REGISTRY_URL: &str = "https://packages.unity.com";
const BUILTIN_MODULE_PREFIX: &str = "com.unity.modules.";

/// Package backend over a Unity project's `Packages/` folder.
///
/// Cloning is cheap, so the install queue and the installed-package cache can each own a
/// handle to the same project.
#[derive(Debug, Clone)]
pub struct ProjectBackend {
    project: UnityProject,
    catalog: Arc<PackageCatalog>,
}

impl ProjectBackend {
    pub fn new(project: UnityProject, catalog: PackageCatalog) -> Self {
        Self {
            project,
            catalog: Arc::new(catalog),
        }
    }

    pub fn project(&self) -> &UnityProject {
        &self.project
    }

    fn catalog_hint(&self, locator: &Locator) -> Option<CatalogEntry> {
        match locator {
            Locator::Registry { id, .. } => self.catalog.find_by_package_id(id).cloned(),
            Locator::Git { url: raw } | Locator::Local { path: raw } => self
                .catalog
                .all()
                .find(|entry| entry.locator == *raw)
                .cloned(),
        }
    }

    fn display_name(&self, id: &str) -> String {
        self.catalog
            .find_by_package_id(id)
            .map(|entry| entry.display_name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn description(&self, id: &str) -> String {
        self.catalog
            .find_by_package_id(id)
            .map(|entry| entry.description.clone())
            .unwrap_or_default()
    }
}

impl InstallBackend for ProjectBackend {
    type Operation = ManifestAddOperation;

    fn start_add(&mut self, locator: &str) -> Result<ManifestAddOperation> {
        let locator = parse_locator(locator)?;
        let hint = self.catalog_hint(&locator);
        debug!("starting add for {locator:?}");
        Ok(ManifestAddOperation {
            project: self.project.clone(),
            locator,
            hint,
            state: OperationState::Pending,
        })
    }
}

impl InstalledSource for ProjectBackend {
    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let mut packages = Vec::new();
        if let Some(lock) = read_lock(&self.project)? {
            for (id, entry) in lock.dependencies {
                let source = entry
                    .source
                    .as_deref()
                    .map(PackageSourceKind::parse)
                    .unwrap_or_else(|| infer_source(&id, &entry.version));
                packages.push(InstalledPackage {
                    display_name: self.display_name(&id),
                    description: self.description(&id),
                    id,
                    version: entry.version,
                    source,
                    dependencies: entry.dependencies.into_keys().collect(),
                });
            }
        } else {
            let manifest = read_manifest(&self.project)?;
            for (id, value) in manifest_dependencies(&manifest)? {
                packages.push(InstalledPackage {
                    display_name: self.display_name(&id),
                    description: self.description(&id),
                    source: infer_source(&id, &value),
                    id,
                    version: value,
                    dependencies: Vec::new(),
                });
            }
        }

        for embedded in read_embedded_packages(&self.project)? {
            if packages.iter().any(|package| package.matches_id(&embedded.id)) {
                continue;
            }
            packages.push(InstalledPackage {
                display_name: embedded
                    .display_name
                    .unwrap_or_else(|| self.display_name(&embedded.id)),
                description: embedded
                    .description
                    .unwrap_or_else(|| self.description(&embedded.id)),
                id: embedded.id,
                version: embedded.version,
                source: PackageSourceKind::Embedded,
                dependencies: embedded.dependencies,
            });
        }

        packages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(packages)
    }
}

#[derive(Debug)]
enum OperationState {
    Pending,
    Succeeded(AddResult),
    Failed(String),
}

/// Adds one dependency to the project. The files are edited on the first poll.
#[derive(Debug)]
pub struct ManifestAddOperation {
    project: UnityProject,
    locator: Locator,
    hint: Option<CatalogEntry>,
    state: OperationState,
}

impl ManifestAddOperation {
    fn apply(&self) -> Result<AddResult> {
        let (id, manifest_value, entry) = match &self.locator {
            Locator::Registry { id, version } => {
                let version = version
                    .clone()
                    .or_else(|| self.hint.as_ref().and_then(|hint| hint.version.clone()))
                    .ok_or_else(|| {
                        anyhow!("no version known for registry package '{id}'; use '{id}@<version>'")
                    })?;
                let builtin = id.starts_with(BUILTIN_MODULE_PREFIX);
                let entry = LockEntry {
                    version: version.clone(),
                    depth: 0,
                    source: Some(if builtin { "builtin" } else { "registry" }.to_string()),
                    dependencies: Default::default(),
                    url: (!builtin).then(|| UNITY_REGISTRY_URL.to_string()),
                    hash: None,
                };
                (id.clone(), version, entry)
            }
            Locator::Git { url } => {
                let id = self.hinted_id(url)?;
                (id, url.clone(), unresolved_entry(url, "git"))
            }
            Locator::Local { path } => {
                let id = self.hinted_id(path)?;
                let source = if path.ends_with(".tgz") {
                    "local-tarball"
                } else {
                    "local"
                };
                (id, path.clone(), unresolved_entry(path, source))
            }
        };

        add_manifest_dependency(&self.project, &id, &manifest_value)?;
        let version = entry.version.clone();
        upsert_lock_entry(&self.project, &id, entry)?;

        let display_name = self
            .hint
            .as_ref()
            .map(|hint| hint.display_name.clone())
            .unwrap_or_else(|| id.clone());
        Ok(AddResult {
            display_name,
            package_id: id,
            version,
        })
    }

    fn hinted_id(&self, locator: &str) -> Result<String> {
        self.hint
            .as_ref()
            .map(|hint| hint.package_id.clone())
            .ok_or_else(|| {
                anyhow!("cannot determine package id for '{locator}'; add it to the catalog first")
            })
    }
}

impl InstallOperation for ManifestAddOperation {
    fn status(&mut self) -> OperationStatus {
        if matches!(self.state, OperationState::Pending) {
            self.state = match self.apply() {
                Ok(result) => OperationState::Succeeded(result),
                Err(err) => OperationState::Failed(format!("{err:#}")),
            };
        }
        match self.state {
            OperationState::Pending => OperationStatus::InProgress,
            OperationState::Succeeded(_) => OperationStatus::Success,
            OperationState::Failed(_) => OperationStatus::Failure,
        }
    }

    fn result(&self) -> Result<AddResult> {
        match &self.state {
            OperationState::Succeeded(result) => Ok(result.clone()),
            _ => Err(anyhow!("add operation has not succeeded")),
        }
    }

    fn error(&self) -> Option<String> {
        match &self.state {
            OperationState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }
}

fn unresolved_entry(locator: &str, source: &str) -> LockEntry {
    LockEntry {
        version: locator.to_string(),
        depth: 0,
        source: Some(source.to_string()),
        dependencies: Default::default(),
        url: None,
        hash: None,
    }
}

fn infer_source(id: &str, value: &str) -> PackageSourceKind {
    if let Some(path) = value.strip_prefix("file:") {
        if path.ends_with(".tgz") {
            return PackageSourceKind::LocalTarball;
        }
        return PackageSourceKind::Local;
    }
    if value.contains("://") || value.starts_with("git@") || value.ends_with(".git") {
        return PackageSourceKind::Git;
    }
    if id.starts_with(BUILTIN_MODULE_PREFIX) {
        return PackageSourceKind::BuiltIn;
    }
    PackageSourceKind::Registry
}
