//! Tugboat Core - shared types for the client-side release manager
//!
//! This crate provides the foundational types used throughout Tugboat:
//! - `ChartMetadata`: the parts of `Chart.yaml` that end up on resources
//! - `ReleaseIdentity`: release name, namespace and resolved chart version
//! - `ValueOverrides`: `--set` pairs and values files handed to the renderer
//! - `manifest`: order-preserving objects and multi-document splitting

pub mod chart;
pub mod error;
pub mod manifest;
pub mod release;
pub mod values;

pub use chart::ChartMetadata;
pub use error::{CoreError, Result};
pub use manifest::{ManifestObject, manifest_files, split_file, split_tree};
pub use release::{Operation, ReleaseIdentity};
pub use values::{ValueOverrides, parse_set_value};
