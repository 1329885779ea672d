use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use crate::cli::Verbosity;
use crate::render::spawn_renderer;
use pkgflow_core::backend::{Backends, Operation};
use pkgflow_core::config::QueueConfig;
use pkgflow_core::events::{EventBus, Notifier};
use pkgflow_core::package::{Catalog, Package};
use pkgflow_core::process::{DryRunSpawner, Spawner, TokioSpawner};
use pkgflow_core::queue::QueueManager;
use pkgflow_core::release::GitHubReleases;

/// Arguments shared by the `install` and `remove` commands
#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Catalog ids of the packages, processed in the order given
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Print the commands that would run without executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Queue every requested package and wait for the queue to drain.
pub async fn run(
    config: &QueueConfig,
    catalog: &Catalog,
    operation: Operation,
    args: QueueArgs,
    verbosity: Verbosity,
) -> Result<()> {
    let packages = resolve_ids(catalog, &args.ids)?;
    let (supported, skipped): (Vec<_>, Vec<_>) = packages
        .iter()
        .partition(|pkg| pkg.backend_kind().is_some());
    tracing::debug!(
        %operation,
        requested = packages.len(),
        unsupported = skipped.len(),
        dry_run = args.dry_run,
        "queueing requests"
    );

    let spawner: Arc<dyn Spawner> = if args.dry_run {
        Arc::new(DryRunSpawner)
    } else {
        Arc::new(TokioSpawner)
    };
    let releases = GitHubReleases::new(&config.appimage.github_api)
        .context("Failed to create release client")?;
    let backends = Backends::standard(config, Arc::new(releases));

    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe_all();
    let notifier: Arc<dyn Notifier> = bus.clone();
    let queue = QueueManager::new(backends, spawner, notifier);

    if verbosity != Verbosity::Quiet {
        let mode = if args.dry_run { " (dry run)" } else { "" };
        println!(
            "\n{} {} {} package(s){}...\n",
            "$".cyan(),
            capitalize(operation.verb()),
            supported.len(),
            mode.dimmed()
        );
    }

    let renderer = spawn_renderer(
        events,
        supported.len(),
        operation.verb(),
        verbosity != Verbosity::Quiet,
    );

    for package in &packages {
        match operation {
            Operation::Install => queue.request_install(Arc::clone(package)),
            Operation::Remove => queue.request_uninstall(Arc::clone(package)),
        }
    }

    queue.idle().await;
    let failures = queue.failures();

    // The renderer drains until the last bus handle is gone.
    drop(queue);
    drop(bus);
    renderer.await??;

    for pkg in &skipped {
        eprintln!(
            "{} Skipped '{}': packages of type '{}' are not supported",
            "WARNING:".yellow().bold(),
            pkg.id,
            pkg.format
        );
    }

    let succeeded = supported.len() - failures.len();
    if verbosity != Verbosity::Quiet {
        println!(
            "\n{} succeeded, {} failed, {} skipped",
            succeeded.to_string().green(),
            failures.len().to_string().red(),
            skipped.len().to_string().yellow()
        );
    }

    if !failures.is_empty() {
        let list: Vec<String> = failures
            .iter()
            .map(|job| {
                let code = job.exit_code.map(|c| c.to_string()).unwrap_or_default();
                format!("{} ({} exited {})", job.package.id, job.operation, code)
            })
            .collect();
        bail!("{} job(s) failed: {}", failures.len(), list.join(", "));
    }

    if verbosity != Verbosity::Quiet {
        println!("\n{}", "SUCCESS".green().bold());
    }
    Ok(())
}

/// Look up every id in the catalog, failing on the first unknown one.
fn resolve_ids(catalog: &Catalog, ids: &[String]) -> Result<Vec<Arc<Package>>> {
    ids.iter()
        .map(|id| {
            catalog
                .find(id)
                .cloned()
                .with_context(|| format!("Unknown package id '{}'", id))
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
