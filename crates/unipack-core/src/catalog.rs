use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageCategory {
    Core,
    Rendering,
    Ui,
    Audio,
    Networking,
    Services,
    Testing,
    Utility,
}

impl PackageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Rendering => "rendering",
            Self::Ui => "ui",
            Self::Audio => "audio",
            Self::Networking => "networking",
            Self::Services => "services",
            Self::Testing => "testing",
            Self::Utility => "utility",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: String,
    pub display_name: String,
    pub locator: String,
    #[serde(default)]
    pub description: String,
    pub category: PackageCategory,
    pub package_id: String,
    /// Version written for registry locators that do not pin one themselves.
    #[serde(default)]
    pub version: Option<String>,
}

/// Named groups of catalog packages installed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSet {
    Recommended,
    Game3d,
    Game2d,
    Core,
    Rendering,
}

impl PackageSet {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recommended => "Recommended Packages",
            Self::Game3d => "3D Game Development",
            Self::Game2d => "2D Game Development",
            Self::Core => "Core Unity Packages",
            Self::Rendering => "Rendering Packages",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    packages: Vec<CatalogEntry>,
}

/// Read-only lookup table of packages the tool knows how to install, keyed by catalog key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PackageCatalog {
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        for entry in [
            entry(
                "UniRx",
                "UniRx",
                "https://github.com/neuecc/UniRx.git?path=Assets/Plugins/UniRx/Scripts",
                "Reactive Extensions for Unity",
                PackageCategory::Utility,
                "com.neuecc.unirx",
                None,
            ),
            entry(
                "UniTask",
                "UniTask",
                "https://github.com/Cysharp/UniTask.git?path=src/UniTask/Assets/Plugins/UniTask",
                "Efficient async/await integration for Unity",
                PackageCategory::Utility,
                "com.cysharp.unitask",
                None,
            ),
            entry(
                "Input System",
                "Input System",
                "com.unity.inputsystem",
                "Unity's new Input System",
                PackageCategory::Core,
                "com.unity.inputsystem",
                Some("1.7.0"),
            ),
            entry(
                "Addressables",
                "Addressables",
                "com.unity.addressables",
                "Unity Addressables Asset System",
                PackageCategory::Core,
                "com.unity.addressables",
                Some("1.21.19"),
            ),
            entry(
                "Cinemachine",
                "Cinemachine",
                "com.unity.cinemachine",
                "Smart camera system",
                PackageCategory::Rendering,
                "com.unity.cinemachine",
                Some("2.9.7"),
            ),
            entry(
                "URP",
                "Universal Render Pipeline",
                "com.unity.render-pipelines.universal",
                "Universal Render Pipeline",
                PackageCategory::Rendering,
                "com.unity.render-pipelines.universal",
                Some("14.0.9"),
            ),
            entry(
                "HDRP",
                "High Definition Render Pipeline",
                "com.unity.render-pipelines.high-definition",
                "High Definition Render Pipeline",
                PackageCategory::Rendering,
                "com.unity.render-pipelines.high-definition",
                Some("14.0.9"),
            ),
            entry(
                "UI Toolkit",
                "UI Toolkit",
                "com.unity.ui",
                "Unity's new UI system",
                PackageCategory::Ui,
                "com.unity.ui",
                Some("1.0.0-preview.18"),
            ),
            entry(
                "Netcode for GameObjects",
                "Netcode for GameObjects",
                "com.unity.netcode.gameobjects",
                "Unity's networking solution",
                PackageCategory::Networking,
                "com.unity.netcode.gameobjects",
                Some("1.7.1"),
            ),
            entry(
                "Unity Audio",
                "Unity Audio",
                "com.unity.modules.audio",
                "Unity Audio modules",
                PackageCategory::Audio,
                "com.unity.modules.audio",
                Some("1.0.0"),
            ),
            entry(
                "Unity Analytics",
                "Unity Analytics",
                "com.unity.analytics",
                "Unity Analytics services",
                PackageCategory::Services,
                "com.unity.analytics",
                Some("3.8.1"),
            ),
            entry(
                "Test Framework",
                "Test Framework",
                "com.unity.test-framework",
                "Unity Test Framework",
                PackageCategory::Testing,
                "com.unity.test-framework",
                Some("1.1.33"),
            ),
        ] {
            catalog.entries.insert(entry.key.clone(), entry);
        }
        catalog
    }

    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = toml::from_str(input).context("failed to parse package catalog")?;
        let mut catalog = Self::default();
        for entry in file.packages {
            if entry.key.trim().is_empty() {
                return Err(anyhow!("catalog entry key must not be empty"));
            }
            if entry.package_id.trim().is_empty() {
                return Err(anyhow!(
                    "catalog entry '{}' must declare a package_id",
                    entry.key
                ));
            }
            if entry.locator.trim().is_empty() {
                return Err(anyhow!(
                    "catalog entry '{}' must declare a locator",
                    entry.key
                ));
            }
            if catalog.entries.contains_key(&entry.key) {
                return Err(anyhow!("duplicate catalog entry '{}'", entry.key));
            }
            catalog.entries.insert(entry.key.clone(), entry);
        }
        Ok(catalog)
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    pub fn all(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn by_category(&self, category: PackageCategory) -> impl Iterator<Item = &CatalogEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.category == category)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a package, replacing any entry already stored under `key`.
    pub fn add_custom(&mut self, key: impl Into<String>, mut entry: CatalogEntry) {
        let key = key.into();
        entry.key = key.clone();
        self.entries.insert(key, entry);
    }

    pub fn find_by_package_id(&self, package_id: &str) -> Option<&CatalogEntry> {
        self.entries
            .values()
            .find(|entry| entry.package_id.eq_ignore_ascii_case(package_id))
    }

    pub fn package_set(&self, set: PackageSet) -> Vec<&CatalogEntry> {
        let keys: &[&str] = match set {
            PackageSet::Recommended => &["Input System", "Addressables", "Cinemachine", "URP"],
            PackageSet::Game3d => &[
                "Input System",
                "Addressables",
                "Cinemachine",
                "URP",
                "UniTask",
            ],
            PackageSet::Game2d => &["Input System", "Addressables", "UniTask"],
            PackageSet::Core => return self.by_category(PackageCategory::Core).collect(),
            PackageSet::Rendering => return self.by_category(PackageCategory::Rendering).collect(),
        };
        keys.iter().filter_map(|key| self.get(key)).collect()
    }
}

fn entry(
    key: &str,
    display_name: &str,
    locator: &str,
    description: &str,
    category: PackageCategory,
    package_id: &str,
    version: Option<&str>,
) -> CatalogEntry {
    CatalogEntry {
        key: key.to_string(),
        display_name: display_name.to_string(),
        locator: locator.to_string(),
        description: description.to_string(),
        category,
        package_id: package_id.to_string(),
        version: version.map(str::to_string),
    }
}
