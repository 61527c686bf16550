//! Chart rendering

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use tugboat_core::ValueOverrides;

use crate::error::{KubeError, Result};

/// Everything a renderer needs for one render
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub chart_dir: &'a Path,
    pub release_name: &'a str,
    pub namespace: &'a str,
    pub output_dir: &'a Path,
    pub is_upgrade: bool,
    pub values: &'a ValueOverrides,
}

/// Turns a chart plus values into manifest files under `output_dir`
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()>;
}

/// [`Renderer`] running `helm template`
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    binary: PathBuf,
}

impl Default for HelmRenderer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
        }
    }
}

impl HelmRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Arguments for `helm template`
pub fn template_args(request: &RenderRequest<'_>) -> Vec<String> {
    let mut args = vec![
        "template".to_string(),
        request.release_name.to_string(),
        request.chart_dir.display().to_string(),
        "--namespace".to_string(),
        request.namespace.to_string(),
        "--output-dir".to_string(),
        request.output_dir.display().to_string(),
    ];
    if request.is_upgrade {
        args.push("--is-upgrade".to_string());
    }
    for file in &request.values.files {
        args.push("-f".to_string());
        args.push(file.display().to_string());
    }
    for set in &request.values.set {
        args.push("--set".to_string());
        args.push(set.clone());
    }
    args
}

#[async_trait]
impl Renderer for HelmRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        let args = template_args(request);
        debug!(binary = %self.binary.display(), ?args, "rendering chart");

        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                KubeError::Render(format!(
                    "failed to spawn {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(KubeError::Render(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}
