//! Garbage collection of superseded release resources
//!
//! Deletion is by label selector over a list of kinds, not by tracking the
//! exact objects applied per version. The kind lists live in [`GcConfig`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tugboat_core::ReleaseIdentity;

use crate::annotations::{release_selector, stale_selector, with_namespace};
use crate::applier::{Applier, count_deleted};
use crate::error::KubeError;

/// Namespaced kinds collected by default
pub const DEFAULT_NAMESPACED_KINDS: &[&str] = &[
    "all",
    "persistentvolumeclaims",
    "configmaps",
    "releases",
    "serviceaccounts",
    "roles",
    "rolebindings",
    "secrets",
];

/// Cluster-scoped kinds collected by default
pub const DEFAULT_CLUSTER_KINDS: &[&str] = &["clusterroles", "clusterrolebindings"];

/// Kinds swept by garbage collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcConfig {
    pub namespaced_kinds: Vec<String>,
    pub cluster_kinds: Vec<String>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            namespaced_kinds: DEFAULT_NAMESPACED_KINDS.iter().map(|k| k.to_string()).collect(),
            cluster_kinds: DEFAULT_CLUSTER_KINDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Result of a collection pass
#[derive(Debug, Default)]
pub struct GcReport {
    /// Objects reported deleted
    pub deleted: usize,
    /// Kinds attempted
    pub kinds: usize,
    /// Per-kind failures
    pub errors: Vec<KubeError>,
}

impl GcReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Per-kind failures as one [`KubeError::GarbageCollection`]
    pub fn into_error(self) -> Option<KubeError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(KubeError::GarbageCollection {
                errors: self.errors,
            })
        }
    }
}

/// Deletes release resources by selector across the configured kinds
pub struct GarbageCollector<'a> {
    applier: &'a dyn Applier,
    config: &'a GcConfig,
}

impl<'a> GarbageCollector<'a> {
    pub fn new(applier: &'a dyn Applier, config: &'a GcConfig) -> Self {
        Self { applier, config }
    }

    /// Remove resources of the release that carry any other chart version
    pub async fn collect_stale(&self, identity: &ReleaseIdentity) -> GcReport {
        let selector = stale_selector(&identity.release_name, &identity.chart_version);
        info!(release = %identity.release_name, %selector, "collecting stale resources");
        self.collect(&selector, &identity.namespace).await
    }

    /// Remove every resource of the release
    pub async fn collect_release(&self, release: &str, namespace: &str) -> GcReport {
        let selector = release_selector(release);
        info!(%release, %selector, "deleting release resources");
        self.collect(&selector, namespace).await
    }

    /// Delete by `selector`, attempting every kind even after failures
    ///
    /// Namespaced kinds are deleted within `namespace`. Cluster kinds are
    /// deleted without a namespace, narrowed by the namespace label instead.
    pub async fn collect(&self, selector: &str, namespace: &str) -> GcReport {
        let mut report = GcReport::default();

        for kind in &self.config.namespaced_kinds {
            self.delete_kind(&mut report, kind, selector, Some(namespace))
                .await;
        }

        let cluster_selector = with_namespace(selector, namespace);
        for kind in &self.config.cluster_kinds {
            self.delete_kind(&mut report, kind, &cluster_selector, None)
                .await;
        }

        if report.deleted > 0 {
            info!(deleted = report.deleted, "garbage collection removed resources");
        }
        report
    }

    async fn delete_kind(
        &self,
        report: &mut GcReport,
        kind: &str,
        selector: &str,
        namespace: Option<&str>,
    ) {
        report.kinds += 1;
        match self
            .applier
            .delete(kind, Some(selector), namespace, false)
            .await
        {
            Ok(output) => {
                let deleted = count_deleted(&output);
                debug!(%kind, deleted, "collected kind");
                report.deleted += deleted;
            }
            Err(e) => {
                warn!(%kind, error = %e, "garbage collection failed for kind");
                report.errors.push(e);
            }
        }
    }
}
