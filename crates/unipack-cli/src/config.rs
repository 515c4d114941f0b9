use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use unipack_installer::DriveOptions;

pub(crate) const CONFIG_FILE_NAME: &str = "unipack.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) cache_ttl_secs: u64,
    pub(crate) tick_interval_ms: u64,
    /// Zero disables the watchdog.
    pub(crate) max_ticks: u64,
    pub(crate) catalog: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 5,
            tick_interval_ms: 50,
            max_ticks: 12_000,
            catalog: None,
        }
    }
}

impl Config {
    pub(crate) fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse unipack config")
    }

    /// Loads an explicit config file, or `unipack.toml` in the project root when present.
    pub(crate) fn load(explicit: Option<&Path>, project_root: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = project_root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        if let Some(catalog) = &config.catalog {
            if catalog.is_relative() {
                let base = path.parent().unwrap_or(project_root);
                config.catalog = Some(base.join(catalog));
            }
        }
        Ok(config)
    }

    pub(crate) fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub(crate) fn drive_options(&self) -> DriveOptions {
        DriveOptions {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            max_ticks: (self.max_ticks > 0).then_some(self.max_ticks),
        }
    }
}
