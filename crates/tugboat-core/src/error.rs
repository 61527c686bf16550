//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Failed to parse document {segment} of {path}: {message}")]
    ManifestParse {
        path: String,
        segment: usize,
        message: String,
    },

    #[error("Failed to decode {path}: {message}")]
    ManifestDecode { path: String, message: String },

    #[error("Failed to encode {path}: {message}")]
    ManifestEncode { path: String, message: String },

    #[error("Invalid --set format: '{value}'. Expected key=value")]
    InvalidSetValue { value: String },

    #[error("Values file not found: {path}")]
    ValuesFileNotFound { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
