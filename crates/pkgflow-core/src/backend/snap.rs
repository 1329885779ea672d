use async_trait::async_trait;

use super::{Backend, BackendKind, Operation};
use crate::config::SnapConfig;
use crate::error::JobError;
use crate::package::Package;
use crate::process::Invocation;

/// Installs and removes snaps with the `snap` CLI.
#[derive(Debug, Clone)]
pub struct SnapBackend {
    use_sudo: bool,
}

impl SnapBackend {
    pub fn new(config: &SnapConfig) -> Self {
        Self {
            use_sudo: config.use_sudo,
        }
    }

    fn command(&self, operation: Operation, package: &Package) -> Invocation {
        let meta = package.snap.clone().unwrap_or_default();
        let name = meta.name.unwrap_or_else(|| package.id.clone());

        let mut args = vec![operation.verb().to_string(), name];
        if operation == Operation::Install {
            if meta.classic {
                args.push("--classic".to_string());
            }
            if let Some(channel) = meta.channel {
                args.push(format!("--channel={}", channel));
            }
        }

        if self.use_sudo {
            args.insert(0, "snap".to_string());
            Invocation::new("sudo", args)
        } else {
            Invocation::new("snap", args)
        }
    }
}

#[async_trait]
impl Backend for SnapBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Snap
    }

    async fn prepare(&self, operation: Operation, package: &Package) -> Result<Invocation, JobError> {
        Ok(self.command(operation, package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::SnapMetadata;

    fn spotify(meta: Option<SnapMetadata>) -> Package {
        Package {
            id: "spotify".to_string(),
            name: None,
            format: "Snap".to_string(),
            flatpak: None,
            snap: meta,
            appimage: None,
        }
    }

    #[test]
    fn test_install_with_sudo() {
        let backend = SnapBackend::new(&SnapConfig::default());
        let inv = backend.command(Operation::Install, &spotify(None));
        assert_eq!(inv.program, "sudo");
        assert_eq!(inv.args, vec!["snap", "install", "spotify"]);
    }

    #[test]
    fn test_install_classic_channel_without_sudo() {
        let backend = SnapBackend::new(&SnapConfig { use_sudo: false });
        let pkg = spotify(Some(SnapMetadata {
            name: Some("code".to_string()),
            channel: Some("latest/edge".to_string()),
            classic: true,
        }));
        let inv = backend.command(Operation::Install, &pkg);
        assert_eq!(inv.program, "snap");
        assert_eq!(
            inv.args,
            vec!["install", "code", "--classic", "--channel=latest/edge"]
        );
    }

    #[tokio::test]
    async fn test_remove_ignores_install_flags() {
        let backend = SnapBackend::new(&SnapConfig::default());
        let pkg = spotify(Some(SnapMetadata {
            name: None,
            channel: Some("stable".to_string()),
            classic: true,
        }));
        let inv = backend
            .prepare(Operation::Remove, &pkg)
            .await
            .expect("command builds");
        assert_eq!(inv.args, vec!["snap", "remove", "spotify"]);
    }
}
