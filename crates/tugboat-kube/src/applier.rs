//! Cluster mutation through `kubectl`
//!
//! [`Applier`] is the seam between release orchestration and the cluster.
//! [`KubectlApplier`] shells out to `kubectl` so every resource kind a chart
//! can render is handled without compile-time type knowledge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

use tugboat_core::Operation;

use crate::error::{KubeError, Result};

/// Marker kubectl prints when a selector matched nothing
pub const NO_RESOURCES_FOUND: &str = "No resources found";

/// How manifests are sent to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// `kubectl create`: fails if an object already exists
    Create,
    /// `kubectl apply`: creates or updates
    Apply,
}

impl ApplyMode {
    /// Install creates, upgrade applies
    pub fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::Install => ApplyMode::Create,
            Operation::Upgrade => ApplyMode::Apply,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::Create => "create",
            ApplyMode::Apply => "apply",
        }
    }

    /// Effective wait flag: readiness waits only make sense when applying
    pub fn effective_wait(&self, wait: bool) -> bool {
        wait && matches!(self, ApplyMode::Apply)
    }
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource as reported by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ResourceSummary {
    /// `kind/name`
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Cluster mutation collaborator
#[async_trait]
pub trait Applier: Send + Sync {
    /// Apply every manifest under `path` (file or directory, recursive)
    ///
    /// With a selector only objects matching it are sent.
    async fn apply(
        &self,
        path: &Path,
        selector: Option<&str>,
        namespace: &str,
        mode: ApplyMode,
        wait: bool,
    ) -> Result<()>;

    /// Delete `target` (a kind, or `kind/name`) and return the tool output
    ///
    /// Nothing matching is success with empty output.
    async fn delete(
        &self,
        target: &str,
        selector: Option<&str>,
        namespace: Option<&str>,
        wait: bool,
    ) -> Result<String>;

    /// List resources of `kind` in `namespace`
    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<ResourceSummary>>;
}

/// [`Applier`] backed by the `kubectl` binary
#[derive(Debug, Clone)]
pub struct KubectlApplier {
    binary: PathBuf,
    context: Option<String>,
    kubeconfig: Option<PathBuf>,
    wait_timeout: Duration,
}

impl Default for KubectlApplier {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            context: None,
            kubeconfig: None,
            wait_timeout: Duration::from_secs(300),
        }
    }
}

impl KubectlApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific kubectl binary
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use a specific kubeconfig context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Use a specific kubeconfig file
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Ceiling for readiness waits
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }

    async fn run(&self, args: Vec<String>) -> std::io::Result<std::process::Output> {
        let mut full = self.global_args();
        full.extend(args);
        debug!(binary = %self.binary.display(), args = ?full, "running kubectl");

        tokio::process::Command::new(&self.binary)
            .args(&full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
    }
}

/// Arguments for `kubectl create|apply`
pub fn apply_args(
    path: &Path,
    selector: Option<&str>,
    namespace: &str,
    mode: ApplyMode,
) -> Vec<String> {
    let mut args = vec![
        mode.as_str().to_string(),
        "-R".to_string(),
        "-f".to_string(),
        path.display().to_string(),
        "-n".to_string(),
        namespace.to_string(),
    ];
    if let Some(selector) = selector {
        args.push("-l".to_string());
        args.push(selector.to_string());
    }
    args
}

/// Arguments for the readiness wait following an apply
pub fn wait_args(selector: Option<&str>, namespace: &str, timeout: Duration) -> Vec<String> {
    let mut args = vec![
        "wait".to_string(),
        "--for=condition=Available".to_string(),
        "deployment".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        format!("--timeout={}s", timeout.as_secs()),
    ];
    match selector {
        Some(selector) => {
            args.push("-l".to_string());
            args.push(selector.to_string());
        }
        None => args.push("--all".to_string()),
    }
    args
}

/// Arguments for `kubectl delete`
pub fn delete_args(
    target: &str,
    selector: Option<&str>,
    namespace: Option<&str>,
    wait: bool,
) -> Vec<String> {
    let mut args = vec![
        "delete".to_string(),
        target.to_string(),
        "--ignore-not-found".to_string(),
        format!("--wait={}", wait),
    ];
    if let Some(selector) = selector {
        args.push("-l".to_string());
        args.push(selector.to_string());
    }
    if let Some(namespace) = namespace {
        args.push("-n".to_string());
        args.push(namespace.to_string());
    }
    args
}

/// Arguments for `kubectl get -o json`
pub fn list_args(namespace: &str, kind: &str) -> Vec<String> {
    vec![
        "get".to_string(),
        kind.to_string(),
        "-n".to_string(),
        namespace.to_string(),
        "-o".to_string(),
        "json".to_string(),
    ]
}

#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ListedObject>,
}

#[derive(Deserialize)]
struct ListedObject {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: ListedMetadata,
}

#[derive(Default, Deserialize)]
struct ListedMetadata {
    #[serde(default)]
    name: String,
    namespace: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

/// Parse `kubectl get -o json` output
pub fn parse_list_output(
    json: &str,
) -> std::result::Result<Vec<ResourceSummary>, serde_json::Error> {
    let list: ObjectList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| ResourceSummary {
            kind: item.kind,
            name: item.metadata.name,
            namespace: item.metadata.namespace,
            labels: item.metadata.labels,
        })
        .collect())
}

fn stderr_text(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl Applier for KubectlApplier {
    async fn apply(
        &self,
        path: &Path,
        selector: Option<&str>,
        namespace: &str,
        mode: ApplyMode,
        wait: bool,
    ) -> Result<()> {
        let target = path.display().to_string();
        let output = self
            .run(apply_args(path, selector, namespace, mode))
            .await
            .map_err(|e| KubeError::Apply {
                target: target.clone(),
                message: format!("failed to spawn kubectl: {}", e),
            })?;

        if !output.status.success() {
            return Err(KubeError::Apply {
                target,
                message: stderr_text(&output),
            });
        }

        if wait {
            let output = self
                .run(wait_args(selector, namespace, self.wait_timeout))
                .await
                .map_err(|e| KubeError::Apply {
                    target: target.clone(),
                    message: format!("failed to spawn kubectl: {}", e),
                })?;
            let stderr = stderr_text(&output);
            // Nothing to wait for when the release has no Deployments
            if !output.status.success() && !stderr.contains("no matching resources found") {
                return Err(KubeError::Apply {
                    target,
                    message: format!("resources did not become ready: {}", stderr),
                });
            }
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
        let output = self
            .run(delete_args(target, selector, namespace, wait))
            .await
            .map_err(|e| KubeError::Delete {
                target: target.to_string(),
                message: format!("failed to spawn kubectl: {}", e),
            })?;

        let stderr = stderr_text(&output);
        if !output.status.success() && !stderr.contains(NO_RESOURCES_FOUND) {
            return Err(KubeError::Delete {
                target: target.to_string(),
                message: stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list(&self, namespace: &str, kind: &str) -> Result<Vec<ResourceSummary>> {
        let output = self
            .run(list_args(namespace, kind))
            .await
            .map_err(|e| KubeError::List {
                kind: kind.to_string(),
                message: format!("failed to spawn kubectl: {}", e),
            })?;

        if !output.status.success() {
            return Err(KubeError::List {
                kind: kind.to_string(),
                message: stderr_text(&output),
            });
        }

        parse_list_output(&String::from_utf8_lossy(&output.stdout)).map_err(|e| KubeError::List {
            kind: kind.to_string(),
            message: format!("unexpected kubectl output: {}", e),
        })
    }
}

/// Count the objects reported in `kubectl delete` output
pub fn count_deleted(output: &str) -> usize {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(NO_RESOURCES_FOUND))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_mode_for_operation() {
        assert_eq!(ApplyMode::for_operation(Operation::Install), ApplyMode::Create);
        assert_eq!(ApplyMode::for_operation(Operation::Upgrade), ApplyMode::Apply);
        assert_eq!(ApplyMode::Create.to_string(), "create");
    }

    #[test]
    fn test_wait_only_in_apply_mode() {
        assert!(ApplyMode::Apply.effective_wait(true));
        assert!(!ApplyMode::Apply.effective_wait(false));
        assert!(!ApplyMode::Create.effective_wait(true));
    }

    #[test]
    fn test_apply_args() {
        let args = apply_args(
            Path::new("/tmp/out"),
            Some("tugboat.io/release-name=demo"),
            "prod",
            ApplyMode::Create,
        );
        assert_eq!(
            args,
            vec![
                "create",
                "-R",
                "-f",
                "/tmp/out",
                "-n",
                "prod",
                "-l",
                "tugboat.io/release-name=demo"
            ]
        );

        let args = apply_args(Path::new("hook.yaml"), None, "prod", ApplyMode::Apply);
        assert_eq!(args, vec!["apply", "-R", "-f", "hook.yaml", "-n", "prod"]);
    }

    #[test]
    fn test_delete_args() {
        let args = delete_args("job/migrate", None, Some("prod"), false);
        assert_eq!(
            args,
            vec!["delete", "job/migrate", "--ignore-not-found", "--wait=false", "-n", "prod"]
        );

        let args = delete_args("clusterroles", Some("a=b"), None, true);
        assert_eq!(
            args,
            vec!["delete", "clusterroles", "--ignore-not-found", "--wait=true", "-l", "a=b"]
        );
    }

    #[test]
    fn test_wait_args() {
        let args = wait_args(Some("a=b"), "prod", Duration::from_secs(60));
        assert!(args.contains(&"--timeout=60s".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("a=b"));

        let args = wait_args(None, "prod", Duration::from_secs(60));
        assert_eq!(args.last().map(String::as_str), Some("--all"));
    }

    #[test]
    fn test_parse_list_output() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "List",
            "items": [
                {
                    "kind": "ConfigMap",
                    "metadata": {
                        "name": "settings",
                        "namespace": "prod",
                        "labels": {"tugboat.io/release-name": "demo"}
                    }
                },
                {"kind": "Secret", "metadata": {"name": "token"}}
            ]
        }"#;
        let items = parse_list_output(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].display_name(), "ConfigMap/settings");
        assert_eq!(items[0].namespace.as_deref(), Some("prod"));
        assert_eq!(items[0].label("tugboat.io/release-name"), Some("demo"));
        assert!(items[1].labels.is_empty());
    }

    #[test]
    fn test_parse_list_output_empty() {
        assert!(parse_list_output(r#"{"items": []}"#).unwrap().is_empty());
        assert!(parse_list_output("not json").is_err());
    }

    #[test]
    fn test_count_deleted() {
        let output = "configmap \"a\" deleted\nsecret \"b\" deleted\n\n";
        assert_eq!(count_deleted(output), 2);
        assert_eq!(count_deleted(""), 0);
        assert_eq!(count_deleted("No resources found\n"), 0);
    }
}
