//! Package-format adapters.
//!
//! Each backend turns an `(operation, package)` pair into the concrete
//! command the job should spawn. Backends are looked up by [`BackendKind`]
//! through [`Backends`]; the queue only ever sees `Arc<dyn Backend>`.

pub mod appimage;
pub mod flatpak;
pub mod snap;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::QueueConfig;
use crate::error::JobError;
use crate::package::Package;
use crate::process::Invocation;
use crate::release::ReleaseSource;

/// Supported package-management systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    Flatpak,
    Snap,
    AppImage,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Flatpak, BackendKind::Snap, BackendKind::AppImage];

    /// Parse a declared package format, ignoring case.
    pub fn parse(format: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.display_name().eq_ignore_ascii_case(format.trim()))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Flatpak => "Flatpak",
            BackendKind::Snap => "Snap",
            BackendKind::AppImage => "AppImage",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// What a job does to its package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Install,
    Remove,
}

impl Operation {
    /// Verb used in progress and summary output.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb())
    }
}

/// Adapter for one package-management system.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Build the command for `operation` on `package`, running any
    /// pre-flight lookups it needs first.
    async fn prepare(&self, operation: Operation, package: &Package) -> Result<Invocation, JobError>;
}

/// Registry of backends keyed by kind.
#[derive(Clone, Default)]
pub struct Backends {
    by_kind: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// All three standard backends configured from `config`.
    pub fn standard(config: &QueueConfig, releases: Arc<dyn ReleaseSource>) -> Self {
        let mut backends = Self::new();
        backends.register(Arc::new(flatpak::FlatpakBackend::new(&config.flatpak)));
        backends.register(Arc::new(snap::SnapBackend::new(&config.snap)));
        backends.register(Arc::new(appimage::AppImageBackend::new(
            &config.appimage,
            releases,
        )));
        backends
    }

    /// Add or replace the backend for its kind.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.by_kind.insert(backend.kind(), backend);
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Backend>> {
        self.by_kind.get(&kind).cloned()
    }

    /// Backend for the package's declared format, if one is registered.
    pub fn for_package(&self, package: &Package) -> Option<Arc<dyn Backend>> {
        package.backend_kind().and_then(|kind| self.get(kind))
    }
}
