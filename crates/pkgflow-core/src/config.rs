use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "pkgflow.yaml";

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "PKGFLOW_CONFIG";

/// Top-level pkgflow.yaml configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub flatpak: FlatpakConfig,
    pub snap: SnapConfig,
    pub appimage: AppImageConfig,

    /// Directory for daily rotated log files (logs go to stderr when unset)
    pub log_dir: Option<PathBuf>,
}

/// Installation scope passed to flatpak
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlatpakScope {
    #[default]
    System,
    User,
}

impl FlatpakScope {
    pub fn flag(&self) -> &'static str {
        match self {
            FlatpakScope::System => "--system",
            FlatpakScope::User => "--user",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlatpakConfig {
    /// Remote used when a package does not name one
    pub remote: String,
    pub scope: FlatpakScope,
}

impl Default for FlatpakConfig {
    fn default() -> Self {
        Self {
            remote: "flathub".to_string(),
            scope: FlatpakScope::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Prefix snap commands with sudo
    pub use_sudo: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { use_sudo: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppImageConfig {
    /// Where AppImages are downloaded to (defaults to `~/Applications`)
    pub install_dir: Option<PathBuf>,

    /// Base URL of the GitHub REST API
    pub github_api: String,

    /// Glob matched against release asset names
    pub asset_pattern: String,
}

impl Default for AppImageConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            github_api: "https://api.github.com".to_string(),
            asset_pattern: "*.AppImage".to_string(),
        }
    }
}

impl AppImageConfig {
    /// Resolve the install directory: configured value, else `$HOME/Applications`.
    pub fn resolved_install_dir(&self) -> Result<PathBuf> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        self.install_dir_with_home(home.as_deref())
    }

    /// Same as [`resolved_install_dir`](Self::resolved_install_dir) with an
    /// explicit home directory.
    pub fn install_dir_with_home(&self, home: Option<&Path>) -> Result<PathBuf> {
        if let Some(ref dir) = self.install_dir {
            return Ok(dir.clone());
        }
        let home = home.context("HOME is not set; configure appimage.install_dir explicitly")?;
        Ok(home.join("Applications"))
    }
}

impl QueueConfig {
    /// Load config using the lookup order: explicit path, `$PKGFLOW_CONFIG`,
    /// then `./pkgflow.yaml`. Falls back to defaults when nothing is found.
    ///
    /// An explicitly requested file that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_path(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::from_path(local);
        }
        Ok(Self::default())
    }

    /// Parse a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse config from YAML text. An empty document yields the defaults.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: QueueConfig = yaml_serde::from_str(content)?;
        Ok(config)
    }

    /// Post-parse validation. Problems are returned as warnings for the
    /// caller to present; none of them stop the queue from running.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.flatpak.remote.trim().is_empty() {
            warnings.push(
                "flatpak.remote is empty; packages without a remote will fail to install"
                    .to_string(),
            );
        }

        if let Err(e) = glob::Pattern::new(&self.appimage.asset_pattern) {
            warnings.push(format!(
                "appimage.asset_pattern '{}' is not a valid glob: {}",
                self.appimage.asset_pattern, e
            ));
        }

        if let Some(ref dir) = self.appimage.install_dir
            && dir.is_relative()
        {
            warnings.push(format!(
                "appimage.install_dir '{}' is relative; it resolves against the working directory",
                dir.display()
            ));
        }

        warnings
    }
}
