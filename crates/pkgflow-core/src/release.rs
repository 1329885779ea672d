use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ResolveError;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub file_name: String,
    pub url: String,
}

/// Resolves the download reference for a published AppImage.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Find the first asset of the latest release of `repo` (`owner/name`)
    /// whose file name matches the glob `pattern`.
    async fn latest_asset(&self, repo: &str, pattern: &str) -> Result<ReleaseAsset, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

/// Looks up releases through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    api_base: String,
    client: reqwest::Client,
}

impl GitHubReleases {
    pub fn new(api_base: &str) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("pkgflow/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn latest_release_url(&self, repo: &str) -> Result<String, ResolveError> {
        let (owner, name) = split_repo(repo)?;
        Ok(format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, owner, name
        ))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn latest_asset(&self, repo: &str, pattern: &str) -> Result<ReleaseAsset, ResolveError> {
        let url = self.latest_release_url(repo)?;
        tracing::debug!(%url, "fetching latest release");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ResolveError::Status {
                repo: repo.to_string(),
                status: response.status().as_u16(),
            });
        }

        let release: GitHubRelease = response.json().await?;
        pick_asset(
            release
                .assets
                .into_iter()
                .map(|a| (a.name, a.browser_download_url)),
            repo,
            pattern,
        )
    }
}

/// Split `owner/name`, rejecting anything else.
fn split_repo(repo: &str) -> Result<(&str, &str), ResolveError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(ResolveError::InvalidRepo(repo.to_string())),
    }
}

/// Choose the first `(name, url)` whose name matches the glob.
fn pick_asset(
    assets: impl IntoIterator<Item = (String, String)>,
    repo: &str,
    pattern: &str,
) -> Result<ReleaseAsset, ResolveError> {
    let no_match = || ResolveError::NoMatchingAsset {
        repo: repo.to_string(),
        pattern: pattern.to_string(),
    };
    let glob = glob::Pattern::new(pattern).map_err(|_| no_match())?;

    assets
        .into_iter()
        .find(|(name, _)| glob.matches(name))
        .map(|(file_name, url)| ReleaseAsset { file_name, url })
        .ok_or_else(no_match)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets() -> Vec<(String, String)> {
        vec![
            (
                "krita-5.2.tar.gz".to_string(),
                "https://example.com/krita-5.2.tar.gz".to_string(),
            ),
            (
                "krita-5.2-x86_64.AppImage".to_string(),
                "https://example.com/krita-5.2-x86_64.AppImage".to_string(),
            ),
            (
                "krita-5.2-x86_64.AppImage.zsync".to_string(),
                "https://example.com/krita-5.2-x86_64.AppImage.zsync".to_string(),
            ),
        ]
    }

    #[test]
    fn test_pick_asset_matches_glob() {
        let asset = pick_asset(assets(), "KDE/krita", "*.AppImage").expect("asset found");
        assert_eq!(asset.file_name, "krita-5.2-x86_64.AppImage");
        assert_eq!(asset.url, "https://example.com/krita-5.2-x86_64.AppImage");
    }

    #[test]
    fn test_pick_asset_no_match() {
        let err = pick_asset(assets(), "KDE/krita", "*aarch64*.AppImage").expect_err("no asset");
        assert!(matches!(err, ResolveError::NoMatchingAsset { .. }));
        assert!(err.to_string().contains("KDE/krita"));
    }

    #[test]
    fn test_split_repo() {
        assert_eq!(split_repo("KDE/krita").expect("valid"), ("KDE", "krita"));
        assert!(split_repo("krita").is_err());
        assert!(split_repo("/krita").is_err());
        assert!(split_repo("KDE/").is_err());
        assert!(split_repo("a/b/c").is_err());
    }

    #[test]
    fn test_latest_release_url() {
        let source = GitHubReleases::new("https://api.github.com/").expect("client builds");
        assert_eq!(
            source.latest_release_url("KDE/krita").expect("valid repo"),
            "https://api.github.com/repos/KDE/krita/releases/latest"
        );
    }
}
