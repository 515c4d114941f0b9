mod completion;
mod config;
mod dispatch;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;
use unipack_core::{PackageCategory, PackageSet};

#[derive(Parser, Debug)]
#[command(name = "unipack")]
#[command(about = "Queue and install Unity packages one at a time", long_about = None)]
struct Cli {
    /// Unity project root (defaults to the current directory).
    #[arg(long, global = true)]
    project: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Package catalog TOML file replacing the built-in catalog.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List packages known to the catalog.
    Catalog {
        #[arg(long, value_enum)]
        category: Option<CliCategory>,
    },
    /// Install catalog packages by key, in the order given.
    Install {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Install a predefined package set.
    InstallSet {
        #[arg(value_enum)]
        set: CliPackageSet,
    },
    /// Show packages installed in the project.
    Installed {
        /// Include built-in modules and other non-project sources.
        #[arg(long)]
        all: bool,
    },
    /// Show catalog packages that are not installed yet.
    Available,
    Info {
        package_id: String,
    },
    Check {
        #[arg(required = true)]
        package_ids: Vec<String>,
    },
    /// Re-read the installed package list.
    Refresh,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliCategory {
    Core,
    Rendering,
    Ui,
    Audio,
    Networking,
    Services,
    Testing,
    Utility,
}

impl From<CliCategory> for PackageCategory {
    fn from(value: CliCategory) -> Self {
        match value {
            CliCategory::Core => Self::Core,
            CliCategory::Rendering => Self::Rendering,
            CliCategory::Ui => Self::Ui,
            CliCategory::Audio => Self::Audio,
            CliCategory::Networking => Self::Networking,
            CliCategory::Services => Self::Services,
            CliCategory::Testing => Self::Testing,
            CliCategory::Utility => Self::Utility,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliPackageSet {
    Recommended,
    #[value(name = "3d")]
    Game3d,
    #[value(name = "2d")]
    Game2d,
    Core,
    Rendering,
}

impl From<CliPackageSet> for PackageSet {
    fn from(value: CliPackageSet) -> Self {
        match value {
            CliPackageSet::Recommended => Self::Recommended,
            CliPackageSet::Game3d => Self::Game3d,
            CliPackageSet::Game2d => Self::Game2d,
            CliPackageSet::Core => Self::Core,
            CliPackageSet::Rendering => Self::Rendering,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    dispatch::run_cli(Cli::parse())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("UNIPACK_LOG").unwrap_or_else(|_| EnvFilter::new("unipack=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
