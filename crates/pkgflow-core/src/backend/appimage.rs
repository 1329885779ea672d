use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Backend, BackendKind, Operation};
use crate::config::AppImageConfig;
use crate::error::JobError;
use crate::package::Package;
use crate::process::Invocation;
use crate::release::{ReleaseAsset, ReleaseSource};

/// Downloads AppImages into a directory and deletes them again.
///
/// Both operations resolve the release asset first: the file on disk is
/// named after the asset, so removal needs the same lookup as install.
pub struct AppImageBackend {
    config: AppImageConfig,
    /// `$HOME` as seen at construction; only consulted when no install dir is configured
    home: Option<PathBuf>,
    releases: Arc<dyn ReleaseSource>,
}

impl AppImageBackend {
    pub fn new(config: &AppImageConfig, releases: Arc<dyn ReleaseSource>) -> Self {
        Self {
            config: config.clone(),
            home: std::env::var_os("HOME").map(PathBuf::from),
            releases,
        }
    }

    /// The download directory, resolved per job so a missing `$HOME` only
    /// fails AppImage jobs.
    fn install_dir(&self) -> Result<PathBuf, JobError> {
        self.config
            .install_dir_with_home(self.home.as_deref())
            .map_err(|e| JobError::InvalidInvocation(format!("{:#}", e)))
    }

    /// Find the asset this package refers to: an explicit URL wins over a
    /// release lookup.
    async fn resolve(&self, package: &Package) -> Result<ReleaseAsset, JobError> {
        let missing = || JobError::MissingMetadata {
            package: package.id.clone(),
            field: "appimage.url or appimage.repo",
        };
        let meta = package.appimage.as_ref().ok_or_else(missing)?;

        if let Some(ref url) = meta.url {
            let file_name = file_name_from_url(url).ok_or_else(|| {
                JobError::InvalidInvocation(format!("cannot derive a file name from '{}'", url))
            })?;
            return Ok(ReleaseAsset {
                file_name,
                url: url.clone(),
            });
        }

        let repo = meta.repo.as_deref().ok_or_else(missing)?;
        let pattern = meta
            .asset_pattern
            .as_deref()
            .unwrap_or(&self.config.asset_pattern);
        let asset = self.releases.latest_asset(repo, pattern).await?;

        if !is_plain_file_name(&asset.file_name) {
            return Err(JobError::InvalidInvocation(format!(
                "refusing unsafe asset name '{}'",
                asset.file_name
            )));
        }
        Ok(asset)
    }

}

#[async_trait]
impl Backend for AppImageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AppImage
    }

    async fn prepare(&self, operation: Operation, package: &Package) -> Result<Invocation, JobError> {
        let install_dir = self.install_dir()?;
        let asset = self.resolve(package).await?;
        let target = install_dir.join(&asset.file_name);

        Ok(match operation {
            Operation::Install => install_script(&install_dir, &target, &asset.url),
            Operation::Remove => Invocation::new("rm", ["-f".to_string(), path_arg(&target)]),
        })
    }
}

fn install_script(dir: &Path, target: &Path, url: &str) -> Invocation {
    let dir = shell_words::quote(&path_arg(dir)).into_owned();
    let target = shell_words::quote(&path_arg(target)).into_owned();
    let url = shell_words::quote(url).into_owned();
    Invocation::shell(format!(
        "mkdir -p {dir} && curl -fL -sS -o {target} {url} && chmod +x {target}"
    ))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Last path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    is_plain_file_name(name).then(|| name.to_string())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::package::AppImageMetadata;

    /// Returns a fixed asset and records nothing.
    struct FixedRelease(ReleaseAsset);

    #[async_trait]
    impl ReleaseSource for FixedRelease {
        async fn latest_asset(&self, _repo: &str, pattern: &str) -> Result<ReleaseAsset, ResolveError> {
            if glob::Pattern::new(pattern).is_ok_and(|p| p.matches(&self.0.file_name)) {
                Ok(self.0.clone())
            } else {
                Err(ResolveError::NoMatchingAsset {
                    repo: "test/repo".to_string(),
                    pattern: pattern.to_string(),
                })
            }
        }
    }

    fn backend(file_name: &str) -> AppImageBackend {
        let config = AppImageConfig {
            install_dir: Some(PathBuf::from("/opt/apps")),
            ..Default::default()
        };
        AppImageBackend::new(
            &config,
            Arc::new(FixedRelease(ReleaseAsset {
                file_name: file_name.to_string(),
                url: format!("https://example.com/{}", file_name),
            })),
        )
    }

    fn krita(meta: Option<AppImageMetadata>) -> Package {
        Package {
            id: "krita".to_string(),
            name: None,
            format: "AppImage".to_string(),
            flatpak: None,
            snap: None,
            appimage: meta,
        }
    }

    fn repo_meta() -> Option<AppImageMetadata> {
        Some(AppImageMetadata {
            repo: Some("KDE/krita".to_string()),
            ..Default::default()
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_resolves_release() {
        let inv = backend("krita-x86_64.AppImage")
            .prepare(Operation::Install, &krita(repo_meta()))
            .await
            .expect("command builds");
        assert_eq!(inv.program, "sh");
        assert_eq!(
            inv.args[1],
            "mkdir -p /opt/apps && curl -fL -sS -o /opt/apps/krita-x86_64.AppImage \
             https://example.com/krita-x86_64.AppImage && chmod +x /opt/apps/krita-x86_64.AppImage"
        );
    }

    #[tokio::test]
    async fn test_remove_uses_resolved_file_name() {
        let inv = backend("krita-x86_64.AppImage")
            .prepare(Operation::Remove, &krita(repo_meta()))
            .await
            .expect("command builds");
        assert_eq!(inv.program, "rm");
        assert_eq!(inv.args, vec!["-f", "/opt/apps/krita-x86_64.AppImage"]);
    }

    #[tokio::test]
    async fn test_explicit_url_skips_lookup() {
        let pkg = krita(Some(AppImageMetadata {
            url: Some("https://downloads.example.org/krita/Krita-5.AppImage?download=1".to_string()),
            ..Default::default()
        }));
        // The release source only knows a different asset, so success proves it was not used.
        let inv = backend("other.AppImage")
            .prepare(Operation::Remove, &pkg)
            .await
            .expect("command builds");
        assert_eq!(inv.args, vec!["-f", "/opt/apps/Krita-5.AppImage"]);
    }

    #[tokio::test]
    async fn test_package_pattern_overrides_default() {
        let pkg = krita(Some(AppImageMetadata {
            repo: Some("KDE/krita".to_string()),
            asset_pattern: Some("*-aarch64.AppImage".to_string()),
            url: None,
        }));
        let err = backend("krita-x86_64.AppImage")
            .prepare(Operation::Install, &pkg)
            .await
            .expect_err("pattern does not match");
        assert!(matches!(
            err,
            JobError::Resolve(ResolveError::NoMatchingAsset { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_metadata() {
        let err = backend("krita.AppImage")
            .prepare(Operation::Install, &krita(None))
            .await
            .expect_err("no metadata");
        assert!(matches!(err, JobError::MissingMetadata { .. }));

        let err = backend("krita.AppImage")
            .prepare(Operation::Install, &krita(Some(AppImageMetadata::default())))
            .await
            .expect_err("neither url nor repo");
        assert!(matches!(err, JobError::MissingMetadata { .. }));
    }

    #[tokio::test]
    async fn test_unsafe_asset_name_rejected() {
        let err = backend("../escape.AppImage")
            .prepare(Operation::Remove, &krita(repo_meta()))
            .await
            .expect_err("unsafe name");
        assert!(matches!(err, JobError::InvalidInvocation(_)));
    }

    #[tokio::test]
    async fn test_missing_home_only_fails_the_job() {
        let mut backend = AppImageBackend::new(
            &AppImageConfig::default(),
            Arc::new(FixedRelease(ReleaseAsset {
                file_name: "krita.AppImage".to_string(),
                url: "https://example.com/krita.AppImage".to_string(),
            })),
        );
        backend.home = None;

        let err = backend
            .prepare(Operation::Install, &krita(repo_meta()))
            .await
            .expect_err("no install dir");
        assert!(matches!(err, JobError::InvalidInvocation(ref m) if m.contains("HOME is not set")));

        backend.home = Some(PathBuf::from("/home/ada"));
        let inv = backend
            .prepare(Operation::Remove, &krita(repo_meta()))
            .await
            .expect("command builds");
        assert_eq!(inv.args, vec!["-f", "/home/ada/Applications/krita.AppImage"]);
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://x.org/a/b/App.AppImage").as_deref(),
            Some("App.AppImage")
        );
        assert_eq!(
            file_name_from_url("https://x.org/App.AppImage#frag").as_deref(),
            Some("App.AppImage")
        );
        assert_eq!(file_name_from_url("https://x.org/..").as_deref(), None);
    }
}
