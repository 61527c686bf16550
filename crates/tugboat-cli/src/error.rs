//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps library errors to appropriate exit codes.

use miette::Diagnostic;
use thiserror::Error;
use tugboat_kube::KubeError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Options rejected before anything ran
    #[error("Validation failed: {message}")]
    #[diagnostic(code(tugboat::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart rendering failed
    #[error("Render error: {message}")]
    #[diagnostic(code(tugboat::cli::render))]
    Render {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart fetch, metadata or manifest error
    #[error("Chart error: {message}")]
    #[diagnostic(code(tugboat::cli::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster mutation or cleanup failed
    #[error("Cluster error: {message}")]
    #[diagnostic(code(tugboat::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(tugboat::cli::io))]
    Io { message: String },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(tugboat::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Render { .. } => exit_codes::RENDER_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::InvalidConfig(_) => CliError::Validation {
                message,
                help: Some(
                    "release names are lowercase DNS labels of at most 53 characters; \
                     --set takes key=value"
                        .to_string(),
                ),
            },
            KubeError::Render(_) => CliError::Render {
                message,
                help: Some(
                    "check that `helm` is on PATH and the chart renders with `helm template`"
                        .to_string(),
                ),
            },
            KubeError::Fetch(_) => CliError::Chart {
                message,
                help: Some(
                    "pass a local chart directory or --repo with the chart's repository"
                        .to_string(),
                ),
            },
            KubeError::Chart(_) | KubeError::Parse { .. } | KubeError::Codec { .. } => {
                CliError::Chart {
                    message,
                    help: None,
                }
            }
            KubeError::Io(_) => CliError::Io { message },
            KubeError::Apply { .. }
            | KubeError::HookRun { .. }
            | KubeError::Delete { .. }
            | KubeError::List { .. }
            | KubeError::JobWait { .. }
            | KubeError::GarbageCollection { .. }
            | KubeError::Aggregate { .. }
            | KubeError::Api(_) => CliError::Cluster {
                message,
                help: None,
            },
            _ => CliError::Other { message },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
