use async_trait::async_trait;

use super::{Backend, BackendKind, Operation};
use crate::config::{FlatpakConfig, FlatpakScope};
use crate::error::JobError;
use crate::package::Package;
use crate::process::Invocation;

/// Installs and removes applications with the `flatpak` CLI.
#[derive(Debug, Clone)]
pub struct FlatpakBackend {
    remote: String,
    scope: FlatpakScope,
}

impl FlatpakBackend {
    pub fn new(config: &FlatpakConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            scope: config.scope,
        }
    }

    fn command(&self, operation: Operation, package: &Package) -> Result<Invocation, JobError> {
        let meta = package.flatpak.clone().unwrap_or_default();
        let app_ref = meta.app_ref.unwrap_or_else(|| package.id.clone());

        let args = match operation {
            Operation::Install => {
                let remote = meta.remote.unwrap_or_else(|| self.remote.clone());
                if remote.trim().is_empty() {
                    return Err(JobError::InvalidInvocation(format!(
                        "no flatpak remote configured for '{}'",
                        package.id
                    )));
                }
                vec![
                    "install".to_string(),
                    "-y".to_string(),
                    "--noninteractive".to_string(),
                    self.scope.flag().to_string(),
                    remote,
                    app_ref,
                ]
            }
            Operation::Remove => vec![
                "uninstall".to_string(),
                "-y".to_string(),
                "--noninteractive".to_string(),
                self.scope.flag().to_string(),
                app_ref,
            ],
        };

        Ok(Invocation::new("flatpak", args))
    }
}

#[async_trait]
impl Backend for FlatpakBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Flatpak
    }

    async fn prepare(&self, operation: Operation, package: &Package) -> Result<Invocation, JobError> {
        self.command(operation, package)
    }
}
