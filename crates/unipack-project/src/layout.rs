use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Paths inside a Unity project that the package backend reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnityProject {
    root: PathBuf,
}

impl UnityProject {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens an existing project; the `Packages/manifest.json` file must already exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let project = Self::new(root);
        if !project.manifest_path().is_file() {
            bail!(
                "not a Unity project (missing {})",
                project.manifest_path().display()
            );
        }
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("Packages")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.packages_dir().join("manifest.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.packages_dir().join("packages-lock.json")
    }

    pub fn embedded_package_manifest(&self, dir_name: &str) -> PathBuf {
        self.packages_dir().join(dir_name).join("package.json")
    }
}
