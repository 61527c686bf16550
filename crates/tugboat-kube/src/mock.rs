//! In-memory cluster and renderer for testing
//!
//! [`MockCluster`] implements [`Applier`] and [`JobWaiter`] over a label-aware
//! resource store, so release flows can be exercised without a cluster.
//! Every call is recorded in order for assertions, and failures can be
//! injected per path or delete target.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tugboat_core::{ManifestObject, manifest_files};

use crate::annotations::is_cluster_scoped;
use crate::applier::{Applier, ApplyMode, ResourceSummary};
use crate::error::{KubeError, Result};
use crate::jobs::JobWaiter;
use crate::render::{RenderRequest, Renderer};

/// Kinds `kubectl` expands the `all` category to
const ALL_CATEGORY: &[&str] = &[
    "pod",
    "service",
    "deployment",
    "replicaset",
    "statefulset",
    "daemonset",
    "job",
    "cronjob",
    "horizontalpodautoscaler",
];

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Apply {
        path: PathBuf,
        selector: Option<String>,
        namespace: String,
        mode: ApplyMode,
        wait: bool,
    },
    Delete {
        target: String,
        selector: Option<String>,
        namespace: Option<String>,
        wait: bool,
    },
    List {
        namespace: String,
        kind: String,
    },
    WaitJob {
        name: String,
        namespace: String,
    },
}

/// An object stored in the mock cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResource {
    pub kind: String,
    pub name: String,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl MockResource {
    pub fn new(kind: &str, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    fn from_object(object: &ManifestObject, namespace: &str) -> Self {
        let labels = object
            .document
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.as_mapping())
            .map(|mapping| {
                mapping
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let namespace = (!is_cluster_scoped(&object.kind, &object.name)).then(|| {
            object
                .document
                .get("metadata")
                .and_then(|m| m.get("namespace"))
                .and_then(|n| n.as_str())
                .unwrap_or(namespace)
                .to_string()
        });

        Self {
            kind: object.kind.clone(),
            name: object.name.clone(),
            namespace,
            labels,
        }
    }

    fn same_object(&self, other: &MockResource) -> bool {
        self.kind.eq_ignore_ascii_case(&other.kind)
            && self.name == other.name
            && self.namespace == other.namespace
    }

    fn summary(&self) -> ResourceSummary {
        ResourceSummary {
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// Does a `kubectl` resource name (`configmaps`, `configmap`, `all`) cover `kind`
fn kind_matches(target: &str, kind: &str) -> bool {
    let target = target.to_lowercase();
    let kind = kind.to_lowercase();
    let plural = if kind.ends_with('s') {
        format!("{}es", kind)
    } else {
        format!("{}s", kind)
    };
    target == kind || target == plural || (target == "all" && ALL_CATEGORY.contains(&kind.as_str()))
}

/// Evaluate an equality-based label selector (`a=b,c!=d,e,!f`)
pub fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else if let Some(key) = term.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

#[derive(Debug, Default)]
struct ClusterState {
    calls: Vec<ClusterCall>,
    resources: Vec<MockResource>,
    fail_apply: Vec<String>,
    fail_delete: Vec<String>,
    fail_job_waits: bool,
}

/// In-memory [`Applier`] and [`JobWaiter`]
#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<ClusterState>>,
}

impl MockCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-existing resources
    pub fn with_resources(resources: Vec<MockResource>) -> Self {
        let cluster = Self::new();
        cluster.state.write().unwrap().resources = resources;
        cluster
    }

    /// Fail every apply whose path contains `fragment`
    pub fn fail_apply_on(self, fragment: impl Into<String>) -> Self {
        self.state.write().unwrap().fail_apply.push(fragment.into());
        self
    }

    /// Fail every delete of exactly `target`
    pub fn fail_delete_on(self, target: impl Into<String>) -> Self {
        self.state.write().unwrap().fail_delete.push(target.into());
        self
    }

    /// Make every Job wait fail
    pub fn fail_job_waits(self) -> Self {
        self.state.write().unwrap().fail_job_waits = true;
        self
    }

    /// Recorded calls, oldest first
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.write().unwrap().calls.clear();
    }

    /// Current objects
    pub fn resources(&self) -> Vec<MockResource> {
        self.state.read().unwrap().resources.clone()
    }

    /// Look up an object by kind and name
    pub fn resource(&self, kind: &str, name: &str) -> Option<MockResource> {
        self.state
            .read()
            .unwrap()
            .resources
            .iter()
            .find(|r| r.kind.eq_ignore_ascii_case(kind) && r.name == name)
            .cloned()
    }

    /// Number of delete calls for `target`
    pub fn delete_count(&self, target: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, ClusterCall::Delete { target: t, .. } if t == target))
            .count()
    }

    fn record(&self, call: ClusterCall) {
        self.state.write().unwrap().calls.push(call);
    }
}

fn read_objects(path: &Path, namespace: &str) -> Result<Vec<MockResource>> {
    let files = if path.is_dir() {
        manifest_files(path)?
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    };

    files
        .iter()
        .map(|file| {
            let object = ManifestObject::from_file(file)?;
            Ok(MockResource::from_object(&object, namespace))
        })
        .collect()
}

#[async_trait]
impl Applier for MockCluster {
    async fn apply(
        &self,
        path: &Path,
        selector: Option<&str>,
        namespace: &str,
        mode: ApplyMode,
        wait: bool,
    ) -> Result<()> {
        self.record(ClusterCall::Apply {
            path: path.to_path_buf(),
            selector: selector.map(str::to_string),
            namespace: namespace.to_string(),
            mode,
            wait,
        });

        let target = path.display().to_string();
        let mut state = self.state.write().unwrap();
        if state.fail_apply.iter().any(|f| target.contains(f.as_str())) {
            return Err(KubeError::Apply {
                target,
                message: "injected apply failure".to_string(),
            });
        }

        let incoming: Vec<MockResource> = read_objects(path, namespace)?
            .into_iter()
            .filter(|r| selector.is_none_or(|s| selector_matches(s, &r.labels)))
            .collect();

        let mut conflicts = Vec::new();
        for resource in incoming {
            match state.resources.iter().position(|r| r.same_object(&resource)) {
                Some(_) if mode == ApplyMode::Create => {
                    conflicts.push(format!("{}/{}", resource.kind, resource.name));
                }
                Some(index) => state.resources[index] = resource,
                None => state.resources.push(resource),
            }
        }

        if !conflicts.is_empty() {
            return Err(KubeError::Apply {
                target,
                message: format!("AlreadyExists: {}", conflicts.join(", ")),
            });
        }
        Ok(())
    }

    async fn delete(
        &self,
        target: &str,
        selector: Option<&str>,
        namespace: Option<&str>,
        wait: bool,
    ) -> Result<String> {
        self.record(ClusterCall::Delete {
            target: target.to_string(),
            selector: selector.map(str::to_string),
            namespace: namespace.map(str::to_string),
            wait,
        });

        let mut state = self.state.write().unwrap();
        if state.fail_delete.iter().any(|t| t == target) {
            return Err(KubeError::Delete {
                target: target.to_string(),
                message: "injected delete failure".to_string(),
            });
        }

        let (kind, name) = match target.split_once('/') {
            Some((kind, name)) => (kind, Some(name)),
            None => (target, None),
        };
        let matches = |r: &MockResource| {
            kind_matches(kind, &r.kind)
                && name.is_none_or(|n| r.name == n)
                && namespace.is_none_or(|ns| r.namespace.as_deref() == Some(ns))
                && selector.is_none_or(|s| selector_matches(s, &r.labels))
        };

        let mut output = String::new();
        state.resources.retain(|r| {
            if matches(r) {
                output.push_str(&format!("{} \"{}\" deleted\n", r.kind.to_lowercase(), r.name));
                false
            } else {
                true
            }
        });
        Ok(output)
    }

    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<ResourceSummary>> {
        self.record(ClusterCall::List {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
        });

        Ok(self
            .state
            .read()
            .unwrap()
            .resources
            .iter()
            .filter(|r| kind_matches(kind, &r.kind) && r.namespace.as_deref() == Some(namespace))
            .map(MockResource::summary)
            .collect())
    }
}

#[async_trait]
impl JobWaiter for MockCluster {
    async fn wait_for_completion(
        &self,
        name: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.record(ClusterCall::WaitJob {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });

        if self.state.read().unwrap().fail_job_waits {
            return Err(KubeError::JobWait {
                name: name.to_string(),
                message: format!("timed out after {:?}", timeout),
            });
        }
        Ok(())
    }
}

/// A recorded render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub chart_dir: PathBuf,
    pub release_name: String,
    pub namespace: String,
    pub is_upgrade: bool,
}

/// [`Renderer`] writing fixed files into the output directory
#[derive(Debug, Clone, Default)]
pub struct MockRenderer {
    files: Vec<(PathBuf, String)>,
    failure: Option<String>,
    calls: Arc<RwLock<Vec<RenderCall>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `content` at `path` (relative to the output directory) on render
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Fail every render with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        self.calls.write().unwrap().push(RenderCall {
            chart_dir: request.chart_dir.to_path_buf(),
            release_name: request.release_name.to_string(),
            namespace: request.namespace.to_string(),
            is_upgrade: request.is_upgrade,
        });

        if let Some(message) = &self.failure {
            return Err(KubeError::Render(message.clone()));
        }

        for (path, content) in &self.files {
            let target = request.output_dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        Ok(())
    }
}
