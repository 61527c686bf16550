//! Standard exit codes for CLI operations
//!
//! Codes 2-6 tell scripts whether the cluster may have been touched:
//! validation, render and chart errors always happen before any mutation.

/// Success - operation completed without errors
pub const SUCCESS: u8 = 0;

/// General error - unspecified failure
pub const ERROR: u8 = 1;

/// Validation error - invalid release name, namespace or values
pub const VALIDATION_ERROR: u8 = 2;

/// Render error - `helm template` failed
pub const RENDER_ERROR: u8 = 3;

/// Chart error - chart could not be fetched, parsed or labeled
pub const CHART_ERROR: u8 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: u8 = 5;

/// Cluster error - apply, hook, delete or garbage collection failed
pub const CLUSTER_ERROR: u8 = 6;
