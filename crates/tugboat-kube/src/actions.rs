//! Options for release operations

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use tugboat_core::{Operation, ValueOverrides};

use crate::error::{KubeError, Result};
use crate::gc::GcConfig;
use crate::jobs::DEFAULT_JOB_TIMEOUT;
use crate::workdir::WorkDir;

/// Longest release name accepted, leaving room for generated suffixes
pub const MAX_RELEASE_NAME_LEN: usize = 53;

static DNS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex")
});

/// Options for install and upgrade
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Local chart directory or chart name in `repo_url`
    pub chart_ref: String,

    /// Chart version; overrides the version from chart metadata
    pub version: Option<String>,

    /// Chart repository URL
    pub repo_url: Option<String>,

    /// Repository username
    pub username: Option<String>,

    /// Repository password
    pub password: Option<String>,

    /// `--set` values and values files
    pub values: ValueOverrides,

    /// Install or upgrade
    pub operation: Operation,

    /// Wait for resources to be ready (upgrade only)
    pub wait: bool,

    /// Keep hook resources regardless of their delete policy
    pub disable_hook_deletion: bool,

    /// Ceiling for hook Jobs to finish before deletion
    pub job_timeout: Duration,

    /// Fail the call when cleanup or garbage collection fails
    pub strict_cleanup: bool,

    /// Base directory for per-release scratch files
    pub work_dir: PathBuf,

    /// Kinds swept by garbage collection
    pub gc: GcConfig,
}

impl ReleaseOptions {
    /// Create default options for a release
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        chart_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            chart_ref: chart_ref.into(),
            version: None,
            repo_url: None,
            username: None,
            password: None,
            values: ValueOverrides::default(),
            operation: Operation::Install,
            wait: false,
            disable_hook_deletion: false,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            strict_cleanup: false,
            work_dir: WorkDir::default_base(),
            gc: GcConfig::default(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Fetch the chart from a repository
    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_values(mut self, values: ValueOverrides) -> Self {
        self.values = values;
        self
    }

    /// Wait for resources to be ready
    pub fn with_wait(mut self) -> Self {
        self.wait = true;
        self
    }

    /// Never delete hook resources
    pub fn without_hook_deletion(mut self) -> Self {
        self.disable_hook_deletion = true;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Treat cleanup and garbage collection failures as fatal
    pub fn with_strict_cleanup(mut self) -> Self {
        self.strict_cleanup = true;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Check the options before anything is fetched or rendered
    pub fn validate(&self) -> Result<()> {
        validate_release_name(&self.name)?;
        validate_namespace(&self.namespace)?;
        if self.chart_ref.trim().is_empty() {
            return Err(KubeError::InvalidConfig(
                "chart reference must not be empty".to_string(),
            ));
        }
        self.values.validate()?;
        Ok(())
    }
}

/// Release names are DNS-1123 labels of at most [`MAX_RELEASE_NAME_LEN`]
pub fn validate_release_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KubeError::InvalidConfig(
            "release name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_RELEASE_NAME_LEN {
        return Err(KubeError::InvalidConfig(format!(
            "release name '{}' is longer than {} characters",
            name, MAX_RELEASE_NAME_LEN
        )));
    }
    if !DNS_LABEL.is_match(name) {
        return Err(KubeError::InvalidConfig(format!(
            "release name '{}' must consist of lowercase alphanumerics and '-', \
             starting and ending with an alphanumeric",
            name
        )));
    }
    Ok(())
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(KubeError::InvalidConfig(
            "namespace must not be empty".to_string(),
        ));
    }
    if namespace.len() > 63 || !DNS_LABEL.is_match(namespace) {
        return Err(KubeError::InvalidConfig(format!(
            "namespace '{}' is not a valid DNS-1123 label",
            namespace
        )));
    }
    Ok(())
}
