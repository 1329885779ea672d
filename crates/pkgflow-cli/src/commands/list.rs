use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use pkgflow_core::backend::BackendKind;
use pkgflow_core::package::{Catalog, Package};

/// Arguments for the `list` command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One row of `list --json` output.
#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    format: &'a str,
    backend: Option<BackendKind>,
}

impl<'a> From<&'a Package> for ListEntry<'a> {
    fn from(pkg: &'a Package) -> Self {
        Self {
            id: &pkg.id,
            name: pkg.display_name(),
            format: &pkg.format,
            backend: pkg.backend_kind(),
        }
    }
}

/// List packages in the catalog
pub fn run(catalog: &Catalog, args: ListArgs) -> Result<()> {
    if args.json {
        println!("{}", render_json(catalog)?);
        return Ok(());
    }

    if catalog.packages.is_empty() {
        println!("{}", "No packages found.".yellow());
        return Ok(());
    }

    println!("\n{} ({} packages)\n", "Catalog".bold(), catalog.packages.len());
    for pkg in &catalog.packages {
        let kind = match pkg.backend_kind() {
            Some(kind) => kind.display_name().cyan(),
            None => "unsupported".dimmed(),
        };
        println!("  {} {} [{}]", pkg.id.bold(), pkg.display_name().dimmed(), kind);
    }
    println!();

    Ok(())
}

fn render_json(catalog: &Catalog) -> Result<String> {
    let entries: Vec<ListEntry<'_>> = catalog
        .packages
        .iter()
        .map(|pkg| ListEntry::from(&**pkg))
        .collect();
    serde_json::to_string_pretty(&entries).context("Failed to serialize catalog to JSON")
}
