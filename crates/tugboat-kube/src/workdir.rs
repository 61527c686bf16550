//! Per-release scratch directories

use std::path::{Path, PathBuf};

use crate::error::Result;

const OUTPUT_DIR: &str = "output";
const HOOKS_DIR: &str = "hooks";
const CHARTS_DIR: &str = "charts";

/// `<base>/<release>/{output, hooks, charts}`
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(base: impl AsRef<Path>, release: &str) -> Self {
        Self {
            root: base.as_ref().join(release),
        }
    }

    /// Default base directory (`<cache dir>/tugboat`)
    pub fn default_base() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tugboat")
    }

    /// Create the layout, discarding anything left by a previous run
    pub fn prepare(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        for dir in [self.output(), self.hooks(), self.charts()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rendered steady-state manifests
    pub fn output(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Extracted hook manifests
    pub fn hooks(&self) -> PathBuf {
        self.root.join(HOOKS_DIR)
    }

    /// Fetched charts
    pub fn charts(&self) -> PathBuf {
        self.root.join(CHARTS_DIR)
    }
}
