//! Tugboat Repo - chart fetching
//!
//! Resolves a chart reference to a directory on disk:
//! - **Local charts**: an existing path is used as-is, without touching the network
//! - **HTTP repositories**: Helm-style `index.yaml` lookup, archive download,
//!   SHA256 digest verification and unpacking

pub mod error;
pub mod fetch;
pub mod index;

pub use error::{RepoError, Result};
pub use fetch::{ChartFetcher, FetchRequest, Fetcher};
pub use index::{ChartEntry, RepositoryIndex};
