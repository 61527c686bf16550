//! Applying the steady-state resource set of a release

use std::path::Path;
use tracing::info;

use tugboat_core::manifest_files;

use crate::annotations::release_selector;
use crate::applier::{Applier, ApplyMode};
use crate::error::Result;

/// Sends the labeled output directory to the cluster in one call
pub struct ResourceSetApplier<'a> {
    applier: &'a dyn Applier,
}

impl<'a> ResourceSetApplier<'a> {
    pub fn new(applier: &'a dyn Applier) -> Self {
        Self { applier }
    }

    /// Apply every manifest under `output_dir` belonging to `release`
    ///
    /// Returns the number of manifest files sent. A directory with nothing
    /// left in it (every object was a hook) is skipped. Errors are returned
    /// unchanged and nothing is retried.
    pub async fn apply(
        &self,
        output_dir: &Path,
        release: &str,
        namespace: &str,
        mode: ApplyMode,
        wait: bool,
    ) -> Result<usize> {
        let files = manifest_files(output_dir)?.len();
        if files == 0 {
            info!(%release, "no steady-state resources to apply");
            return Ok(0);
        }

        info!(%release, %namespace, %mode, files, "applying resources");
        self.applier
            .apply(
                output_dir,
                Some(&release_selector(release)),
                namespace,
                mode,
                mode.effective_wait(wait),
            )
            .await?;
        Ok(files)
    }
}
