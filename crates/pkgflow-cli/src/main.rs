mod cli;
mod commands;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Verbosity};
use colored::Colorize;
use pkgflow_core::backend::Operation;
use pkgflow_core::config::QueueConfig;
use pkgflow_core::package::Catalog;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // `completion` needs neither config nor catalog
    if let Commands::Completion(args) = cli.command {
        clap_complete::generate(
            args.shell,
            &mut <Cli as clap::CommandFactory>::command(),
            "pkgflow",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let config = match QueueConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Failed to load config: {:#}", "ERROR".red().bold(), e);
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init(config.log_dir.as_deref(), verbosity == Verbosity::Verbose);

    for warning in config.validate() {
        eprintln!("{} {}", "WARNING:".yellow().bold(), warning);
    }

    let catalog = match Catalog::from_path(&cli.catalog) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("{} Failed to load catalog: {:#}", "ERROR".red().bold(), e);
            std::process::exit(1);
        }
    };

    if verbosity != Verbosity::Quiet {
        for warning in catalog.validate() {
            eprintln!("{} {}", "WARNING:".yellow().bold(), warning);
        }
    }

    if verbosity == Verbosity::Verbose {
        println!(
            "{} {} packages in {}",
            "DEBUG".dimmed(),
            catalog.packages.len(),
            cli.catalog.display()
        );
    }

    let result = match cli.command {
        Commands::Install(args) => {
            commands::queue::run(&config, &catalog, Operation::Install, args, verbosity).await
        }
        Commands::Remove(args) => {
            commands::queue::run(&config, &catalog, Operation::Remove, args, verbosity).await
        }
        Commands::List(args) => commands::list::run(&catalog, args),
        Commands::Completion(_) => unreachable!("completion handled above"),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("\n{} {:#}", "FAILED".red().bold(), e);
            std::process::exit(1);
        }
    }
}
