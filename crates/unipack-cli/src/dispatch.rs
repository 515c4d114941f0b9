use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};
use unipack_core::{CatalogEntry, PackageCatalog, PackageSet};
use unipack_installer::{
    drive_until_idle_with, DriveOptions, InstallBackend, InstallEvent, InstallQueue,
};
use unipack_project::{ProjectBackend, UnityProject};
use unipack_validator::InstalledPackageCache;

use crate::completion::write_completions_script;
use crate::config::Config;
use crate::render::{
    format_catalog_lines, format_installed_lines, format_status_lines, render_event_line,
    TerminalRenderer,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let Cli {
        project,
        config,
        catalog,
        command,
    } = cli;
    let root = project.unwrap_or_else(|| PathBuf::from("."));
    let renderer = TerminalRenderer::current();

    match command {
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut io::stdout().lock())?;
        }
        Commands::Catalog { category } => {
            let config = Config::load(config.as_deref(), &root)?;
            let catalog = load_catalog(catalog.as_deref().or(config.catalog.as_deref()))?;
            let lines = match category {
                Some(category) => format_catalog_lines(catalog.by_category(category.into())),
                None => format_catalog_lines(catalog.all()),
            };
            renderer.print_section("Catalog");
            renderer.print_lines(&lines);
        }
        command => {
            let mut session = Session::open(&root, config.as_deref(), catalog.as_deref(), renderer)?;
            session.run(command)?;
        }
    }

    Ok(())
}

pub(crate) fn load_catalog(path: Option<&Path>) -> Result<PackageCatalog> {
    let Some(path) = path else {
        return Ok(PackageCatalog::builtin());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    PackageCatalog::from_toml_str(&raw)
        .with_context(|| format!("invalid catalog: {}", path.display()))
}

/// Everything one invocation needs: the catalog, the project backend and a cache over it.
pub(crate) struct Session {
    config: Config,
    catalog: PackageCatalog,
    backend: ProjectBackend,
    cache: InstalledPackageCache<ProjectBackend>,
    renderer: TerminalRenderer,
}

impl Session {
    pub(crate) fn open(
        root: &Path,
        config_path: Option<&Path>,
        catalog_path: Option<&Path>,
        renderer: TerminalRenderer,
    ) -> Result<Self> {
        let config = Config::load(config_path, root)?;
        let catalog = load_catalog(catalog_path.or(config.catalog.as_deref()))?;
        let project = UnityProject::open(root)?;
        let backend = ProjectBackend::new(project, catalog.clone());
        let cache = InstalledPackageCache::with_system_clock(backend.clone(), config.cache_ttl());
        Ok(Self {
            config,
            catalog,
            backend,
            cache,
            renderer,
        })
    }

    fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Install { keys } => {
                let mut entries = Vec::with_capacity(keys.len());
                for key in &keys {
                    let Some(entry) = self.catalog.get(key) else {
                        bail!("package '{key}' not found in catalog");
                    };
                    entries.push(entry.clone());
                }
                self.install_entries(entries, "selected packages")?;
            }
            Commands::InstallSet { set } => {
                let set: PackageSet = set.into();
                let entries = self
                    .catalog
                    .package_set(set)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>();
                self.install_entries(entries, set.label())?;
            }
            Commands::Installed { all } => {
                let packages = if all {
                    self.cache.installed_packages()?.packages().to_vec()
                } else {
                    self.cache.project_packages()?
                };
                self.renderer.print_section("Installed Packages");
                self.renderer.print_lines(&format_installed_lines(&packages));
            }
            Commands::Available => {
                let available = self.cache.installable(&self.catalog)?;
                let lines = available
                    .iter()
                    .map(|entry| format!("• {} ({})", entry.display_name, entry.package_id))
                    .collect::<Vec<_>>();
                self.renderer.print_section("Available Packages");
                self.renderer.print_lines(&lines);
            }
            Commands::Info { package_id } => {
                let text = self.cache.describe_package(&package_id)?;
                let mut lines = text.lines().map(str::to_string).collect::<Vec<_>>();
                if self.cache.is_installed(&package_id)? {
                    let development = self.cache.is_development_package(&package_id)?;
                    let conflicts = self.cache.has_dependency_conflicts(&package_id)?;
                    lines.push(format!("  Development: {}", yes_no(development)));
                    lines.push(format!("  Missing dependencies: {}", yes_no(conflicts)));
                }
                self.renderer.print_lines(&lines);
            }
            Commands::Check { package_ids } => {
                let state = self.cache.check_many(&package_ids)?;
                let lines = package_ids
                    .iter()
                    .map(|id| {
                        let installed = state.get(id.as_str()).copied().unwrap_or(false);
                        let label = if installed { "installed" } else { "not installed" };
                        format!("{id}: {label}")
                    })
                    .collect::<Vec<_>>();
                self.renderer.print_lines(&lines);
            }
            Commands::Refresh => {
                self.cache.refresh_cache();
                let snapshot = self.cache.installed_packages()?;
                self.renderer.print_status(
                    "ok",
                    &format!(
                        "package cache refreshed ({} packages installed)",
                        snapshot.packages().len()
                    ),
                );
            }
            Commands::Catalog { .. } | Commands::Completions { .. } => {
                bail!("command does not operate on a project")
            }
        }
        Ok(())
    }

    /// Installs the entries that are not installed yet. Returns an empty summary when
    /// nothing needed installing.
    pub(crate) fn install_entries(
        &mut self,
        entries: Vec<CatalogEntry>,
        label: &str,
    ) -> Result<InstallSummary> {
        let mut to_install = Vec::new();
        for entry in entries {
            if self.cache.is_installed(&entry.package_id)? {
                self.renderer.print_status(
                    "skip",
                    &format!("{} is already installed", entry.display_name),
                );
            } else {
                to_install.push(entry);
            }
        }
        if to_install.is_empty() {
            self.renderer.print_status(
                "ok",
                &format!("All packages in '{label}' are already installed."),
            );
            return Ok(InstallSummary::default());
        }

        let summary = run_install_queue(
            self.backend.clone(),
            &to_install,
            &self.config.drive_options(),
            self.renderer,
        )?;
        self.cache.refresh_cache();

        if !summary.failed.is_empty() {
            bail!(
                "{} of {} packages failed to install",
                summary.failed.len(),
                to_install.len()
            );
        }
        Ok(summary)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct InstallSummary {
    pub(crate) installed: Vec<String>,
    pub(crate) failed: Vec<(String, String)>,
    pub(crate) events: Vec<InstallEvent>,
}

/// Queues `entries`, drives the queue until idle and renders each event as it arrives.
pub(crate) fn run_install_queue<B: InstallBackend>(
    backend: B,
    entries: &[CatalogEntry],
    options: &DriveOptions,
    renderer: TerminalRenderer,
) -> Result<InstallSummary> {
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();
    let accepted = queue.enqueue_many(
        entries
            .iter()
            .map(|entry| (entry.display_name.clone(), entry.locator.clone())),
    );
    if accepted < entries.len() {
        warn!(
            "{} of {} packages were rejected by the queue",
            entries.len() - accepted,
            entries.len()
        );
    }

    let mut progress = renderer.start_progress("install", accepted as u64);
    let mut summary = InstallSummary::default();
    let outcome = drive_until_idle_with(&mut queue, options, |queue| {
        for event in events.drain() {
            progress.println(&render_event_line(progress.style(), &event));
            match &event {
                InstallEvent::PackageInstalled { name } => {
                    summary.installed.push(name.clone());
                    progress.advance();
                }
                InstallEvent::InstallFailed { name, reason } => {
                    summary.failed.push((name.clone(), reason.clone()));
                    progress.advance();
                }
                InstallEvent::Queued { .. } | InstallEvent::QueueCompleted => {}
            }
            summary.events.push(event);
        }
        if queue.is_processing() {
            debug!("{}", format_status_lines(&queue.status()).join(", "));
        }
    });
    progress.finish();
    outcome?;

    Ok(summary)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
