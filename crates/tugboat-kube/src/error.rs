//! Error types for tugboat-kube

use thiserror::Error;
use tugboat_core::CoreError;

/// Result type for tugboat-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while deploying a release
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// A manifest segment is not valid YAML
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// Decoding or re-encoding an object while labeling/extracting failed
    #[error("failed to process {path}: {message}")]
    Codec { path: String, message: String },

    /// Chart rendering failed
    #[error("render failed: {0}")]
    Render(String),

    /// Chart fetching failed
    #[error("chart fetch failed: {0}")]
    Fetch(#[from] tugboat_repo::RepoError),

    /// Chart metadata could not be read
    #[error("chart error: {0}")]
    Chart(String),

    /// Applying resources to the cluster failed
    #[error("apply of {target} failed: {message}")]
    Apply { target: String, message: String },

    /// A hook could not be applied
    #[error("hook {kind}/{name} failed during {phase}: {message}")]
    HookRun {
        kind: String,
        name: String,
        phase: String,
        message: String,
    },

    /// Deleting resources failed
    #[error("delete of {target} failed: {message}")]
    Delete { target: String, message: String },

    /// Listing resources failed
    #[error("listing {kind} failed: {message}")]
    List { kind: String, message: String },

    /// Waiting for a hook Job did not end in completion
    #[error("waiting for job '{name}' failed: {message}")]
    JobWait { name: String, message: String },

    /// One or more kinds could not be garbage collected
    #[error("garbage collection failed for {} kind(s): {}", .errors.len(), join_messages(.errors))]
    GarbageCollection { errors: Vec<KubeError> },

    /// Several independent failures
    #[error("{} error(s) occurred: {}", .errors.len(), join_messages(.errors))]
    Aggregate { errors: Vec<KubeError> },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),
}

fn join_messages(errors: &[KubeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<CoreError> for KubeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::ManifestParse {
                path,
                segment,
                message,
            } => KubeError::Parse {
                path,
                message: format!("document {}: {}", segment, message),
            },
            CoreError::ManifestDecode { path, message }
            | CoreError::ManifestEncode { path, message } => KubeError::Codec { path, message },
            CoreError::Io(e) => KubeError::Io(e),
            e @ (CoreError::InvalidSetValue { .. } | CoreError::ValuesFileNotFound { .. }) => {
                KubeError::InvalidConfig(e.to_string())
            }
            e @ (CoreError::ChartNotFound { .. } | CoreError::InvalidChart { .. }) => {
                KubeError::Chart(e.to_string())
            }
        }
    }
}

/// Fold independent failures into one error
///
/// No errors gives `None`, a single error is returned as-is, and anything
/// more becomes [`KubeError::Aggregate`].
pub fn combine(mut errors: Vec<KubeError>) -> Option<KubeError> {
    match errors.len() {
        0 => None,
        1 => errors.pop(),
        _ => Some(KubeError::Aggregate { errors }),
    }
}

impl KubeError {
    /// True for failures raised before anything touched the cluster
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            KubeError::Parse { .. }
                | KubeError::Codec { .. }
                | KubeError::Render(_)
                | KubeError::Fetch(_)
                | KubeError::Chart(_)
                | KubeError::InvalidConfig(_)
        )
    }
}
