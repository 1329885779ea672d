use thiserror::Error;

/// Errors raised while looking up release metadata for a download.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid repository '{0}', expected owner/name")]
    InvalidRepo(String),

    #[error("release lookup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("release lookup for {repo} returned status {status}")]
    Status { repo: String, status: u16 },

    #[error("no asset in the latest {repo} release matches '{pattern}'")]
    NoMatchingAsset { repo: String, pattern: String },
}

/// Errors a job can hit before its process is spawned.
///
/// None of these escape the job: they are reported as an ordinary failed
/// completion carrying [`crate::process::NO_EXIT_CODE`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("package '{package}' has no {field} metadata")]
    MissingMetadata {
        package: String,
        field: &'static str,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("cannot build command: {0}")]
    InvalidInvocation(String),
}
