use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::UnityProject;

/// One resolved package in `packages-lock.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub version: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(default)]
    pub dependencies: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedPackageJson {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default, rename = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

pub(crate) struct EmbeddedPackage {
    pub(crate) id: String,
    pub(crate) version: String,
    pub(crate) display_name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) dependencies: Vec<String>,
}

pub(crate) fn read_manifest(project: &UnityProject) -> Result<Map<String, Value>> {
    let path = project.manifest_path();
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read package manifest: {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse package manifest: {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!(
            "package manifest must be a JSON object: {}",
            path.display()
        )),
    }
}

/// `dependencies` of the manifest as `(id, version-or-url)` pairs.
pub(crate) fn manifest_dependencies(manifest: &Map<String, Value>) -> Result<Vec<(String, String)>> {
    let Some(dependencies) = manifest.get("dependencies") else {
        return Ok(Vec::new());
    };
    let dependencies = dependencies
        .as_object()
        .ok_or_else(|| anyhow!("manifest 'dependencies' must be an object"))?;

    dependencies
        .iter()
        .map(|(id, value)| {
            let value = value
                .as_str()
                .ok_or_else(|| anyhow!("manifest dependency '{id}' must be a string"))?;
            Ok((id.clone(), value.to_string()))
        })
        .collect()
}

pub(crate) fn add_manifest_dependency(project: &UnityProject, id: &str, value: &str) -> Result<()> {
    let mut manifest = read_manifest(project)?;
    let dependencies = manifest
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("manifest 'dependencies' must be an object"))?;
    dependencies.insert(id.to_string(), Value::String(value.to_string()));

    // Sorted inside `dependencies` only; top-level keys keep their order.
    let mut sorted = std::mem::take(dependencies).into_iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    dependencies.extend(sorted);

    write_json_atomic(&project.manifest_path(), &Value::Object(manifest))
}

pub(crate) fn read_lock(project: &UnityProject) -> Result<Option<LockFile>> {
    let path = project.lock_path();
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read package lock: {}", path.display()))?;
    let lock = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse package lock: {}", path.display()))?;
    Ok(Some(lock))
}

pub(crate) fn upsert_lock_entry(project: &UnityProject, id: &str, entry: LockEntry) -> Result<()> {
    let mut lock = read_lock(project)?.unwrap_or_default();
    lock.dependencies.insert(id.to_string(), entry);
    write_json_atomic(&project.lock_path(), &lock)
}

/// Packages living in their own folder under `Packages/`.
pub(crate) fn read_embedded_packages(project: &UnityProject) -> Result<Vec<EmbeddedPackage>> {
    let dir = project.packages_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut packages = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read packages directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let path = project.embedded_package_manifest(&dir_name);
        if !path.is_file() {
            continue;
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read embedded package: {}", path.display()))?;
        let parsed: EmbeddedPackageJson = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse embedded package: {}", path.display()))?;
        packages.push(EmbeddedPackage {
            id: parsed.name,
            version: parsed.version,
            display_name: parsed.display_name,
            description: parsed.description,
            dependencies: parsed.dependencies.into_keys().collect(),
        });
    }

    packages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(packages)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    payload.push('\n');

    let staged = path.with_extension("json.tmp");
    fs::write(&staged, payload.as_bytes())
        .with_context(|| format!("failed to write {}", staged.display()))?;
    fs::rename(&staged, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
