use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::{list::ListArgs, queue::QueueArgs};

/// pkgflow: queue Flatpak, Snap and AppImage installs and removals
///
/// Requests run one at a time, in the order given.
#[derive(Parser, Debug)]
#[command(name = "pkgflow", version, about, long_about = None)]
pub struct Cli {
    /// Increase output verbosity (show debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the config file (overrides PKGFLOW_CONFIG and ./pkgflow.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the package catalog
    #[arg(long, global = true, default_value = "catalog.yaml")]
    pub catalog: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Verbosity level resolved from --verbose / --quiet flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// --quiet: only errors and essential output
    Quiet,
    /// default: normal output
    Normal,
    /// --verbose: extra debug info
    Verbose,
}

impl Cli {
    /// Resolve the verbosity level from CLI flags
    pub fn verbosity(&self) -> Verbosity {
        match (self.quiet, self.verbose) {
            (true, _) => Verbosity::Quiet,
            (_, true) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install packages from the catalog, one after another
    Install(QueueArgs),

    /// Remove packages, one after another
    #[command(alias = "uninstall")]
    Remove(QueueArgs),

    /// List packages in the catalog
    List(ListArgs),

    /// Generate shell completion scripts
    Completion(CompletionArgs),
}

/// Arguments for the `completion` command
#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
