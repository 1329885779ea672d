use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// A software package the queue can install or remove.
///
/// Packages are owned by the caller and shared with jobs behind an [`Arc`];
/// nothing in the queue ever mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Stable identifier, also used as the completion event channel
    pub id: String,

    /// Human-readable name (falls back to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Declared package format, e.g. `Flatpak`, `Snap` or `AppImage`.
    ///
    /// Kept as the raw string so that formats without a backend can still be
    /// described and are skipped by the queue instead of failing to load.
    #[serde(rename = "type")]
    pub format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatpak: Option<FlatpakMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap: Option<SnapMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appimage: Option<AppImageMetadata>,
}

/// Flatpak-specific fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatpakMetadata {
    /// Application ref, e.g. `org.gimp.GIMP` (defaults to the package id)
    #[serde(default, rename = "ref")]
    pub app_ref: Option<String>,

    /// Remote to install from (defaults to the configured remote)
    #[serde(default)]
    pub remote: Option<String>,
}

/// Snap-specific fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapMetadata {
    /// Snap name (defaults to the package id)
    #[serde(default)]
    pub name: Option<String>,

    /// Tracking channel, e.g. `stable` or `latest/edge`
    #[serde(default)]
    pub channel: Option<String>,

    /// Install with classic confinement
    #[serde(default)]
    pub classic: bool,
}

/// AppImage download descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppImageMetadata {
    /// GitHub repository publishing the AppImage, as `owner/name`
    #[serde(default)]
    pub repo: Option<String>,

    /// Glob matched against release asset names (overrides the configured pattern)
    #[serde(default)]
    pub asset_pattern: Option<String>,

    /// Direct download URL; skips the release lookup when set
    #[serde(default)]
    pub url: Option<String>,
}

impl Package {
    /// Display name for output, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Backend kind for the declared format, or `None` if no backend handles it.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        BackendKind::parse(&self.format)
    }

    /// Channel carrying this package's completion events.
    pub fn completion_channel(&self) -> &str {
        &self.id
    }

    /// Channel carrying this package's progress text.
    pub fn progress_channel(&self) -> String {
        format!("info-{}", self.id)
    }
}

/// On-disk catalog of known packages
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub packages: Vec<Arc<Package>>,
}

impl Catalog {
    /// Load a catalog from a YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse a catalog from YAML text. An empty document is an empty catalog.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let catalog: Catalog = yaml_serde::from_str(content)?;
        Ok(catalog)
    }

    /// Find a package by id. The first entry wins when ids are duplicated.
    pub fn find(&self, id: &str) -> Option<&Arc<Package>> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Check the catalog for problems that do not prevent loading it.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for pkg in &self.packages {
            if !seen.insert(pkg.id.as_str()) {
                warnings.push(format!(
                    "Duplicate package id '{}' in catalog; only the first entry is used",
                    pkg.id
                ));
            }
            if pkg.backend_kind().is_none() {
                warnings.push(format!(
                    "Package '{}' has unsupported type '{}'",
                    pkg.id, pkg.format
                ));
            }
        }
        warnings
    }
}
