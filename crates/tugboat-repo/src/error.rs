//! Error types for chart fetching

use thiserror::Error;

/// Chart fetching errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Chart '{chart}' is not a local path and no repository URL was given")]
    RepositoryRequired { chart: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Authentication failed for {url}")]
    AuthFailed { url: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    // ============ Chart Errors ============
    #[error("Chart not found: {name} in repository {repo}")]
    ChartNotFound { name: String, repo: String },

    #[error("Version not found: {name}@{version} in repository {repo}")]
    VersionNotFound {
        name: String,
        version: String,
        repo: String,
    },

    #[error("Chart {name}@{version} has no download URL")]
    NoDownloadUrl { name: String, version: String },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Archive for {name} did not contain a '{name}/' directory")]
    UnexpectedArchiveLayout { name: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => RepoError::NetworkError {
                message: e.to_string(),
            },
        }
    }
}

/// Result type for chart fetching
pub type Result<T> = std::result::Result<T, RepoError>;
