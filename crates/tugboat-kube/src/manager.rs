//! Release orchestration
//!
//! [`ReleaseManager`] drives one install or upgrade end to end:
//!
//! 1. validate options and prepare the per-release work directory
//! 2. fetch the chart, resolve the release identity, render
//! 3. split the render, extract hooks and label the rest
//! 4. `crd-install` and pre hooks, main apply, post hooks
//! 5. garbage collect resources from other chart versions
//!
//! Failures up to step 3 never touch the cluster. Cleanup and garbage
//! collection failures after a successful apply are reported on
//! [`ReleaseOutcome::auxiliary`] instead of failing the call, unless
//! [`ReleaseOptions::strict_cleanup`] is set.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use tugboat_core::{ChartMetadata, Operation, ReleaseIdentity, split_tree};
use tugboat_repo::{FetchRequest, Fetcher};

use crate::actions::{ReleaseOptions, validate_namespace, validate_release_name};
use crate::annotations::{CHART_VERSION_LABEL, RELEASE_NAME_LABEL};
use crate::applier::{Applier, ApplyMode, ResourceSummary};
use crate::error::{KubeError, Result, combine};
use crate::extract::extract_and_label;
use crate::gc::{GarbageCollector, GcConfig};
use crate::hooks::{HookDefinition, HookOutcome, HookPhase, HookPhaseRunner, HookSettings};
use crate::jobs::JobWaiter;
use crate::render::{RenderRequest, Renderer};
use crate::resources::ResourceSetApplier;
use crate::workdir::WorkDir;

/// Result of a converged install or upgrade
#[derive(Debug)]
pub struct ReleaseOutcome {
    pub identity: ReleaseIdentity,
    pub operation: Operation,
    /// Steady-state manifest files applied
    pub resources: usize,
    /// Hooks captured from the render
    pub hooks: usize,
    /// Objects removed by garbage collection
    pub collected: usize,
    /// Cleanup or garbage collection failure after a successful apply
    pub auxiliary: Option<KubeError>,
}

impl ReleaseOutcome {
    /// True when trailing cleanup also succeeded
    pub fn is_clean(&self) -> bool {
        self.auxiliary.is_none()
    }
}

/// Resources currently labeled with a release
#[derive(Debug, Clone)]
pub struct ReleaseStatus {
    pub release: String,
    pub namespace: String,
    pub resources: Vec<ResourceSummary>,
}

impl ReleaseStatus {
    /// Distinct chart versions found on the release's resources
    pub fn chart_versions(&self) -> BTreeSet<&str> {
        self.resources
            .iter()
            .filter_map(|r| r.label(CHART_VERSION_LABEL))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// A render ready to be sent to the cluster
struct PreparedRelease {
    identity: ReleaseIdentity,
    workdir: WorkDir,
    hooks: Vec<HookDefinition>,
}

/// Client-side release manager
pub struct ReleaseManager {
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn Renderer>,
    applier: Arc<dyn Applier>,
    waiter: Arc<dyn JobWaiter>,
}

impl ReleaseManager {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        renderer: Arc<dyn Renderer>,
        applier: Arc<dyn Applier>,
        waiter: Arc<dyn JobWaiter>,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            applier,
            waiter,
        }
    }

    /// Get the cluster applier
    pub fn applier(&self) -> &dyn Applier {
        self.applier.as_ref()
    }

    // ========== Install / Upgrade ==========

    /// Install a release (`create` semantics)
    pub async fn install(&self, options: &ReleaseOptions) -> Result<ReleaseOutcome> {
        self.deploy(options, Operation::Install).await
    }

    /// Upgrade a release (`apply` semantics)
    pub async fn upgrade(&self, options: &ReleaseOptions) -> Result<ReleaseOutcome> {
        self.deploy(options, Operation::Upgrade).await
    }

    /// Run the operation named in `options`
    pub async fn run(&self, options: &ReleaseOptions) -> Result<ReleaseOutcome> {
        self.deploy(options, options.operation).await
    }

    async fn deploy(
        &self,
        options: &ReleaseOptions,
        operation: Operation,
    ) -> Result<ReleaseOutcome> {
        options.validate()?;
        info!(
            release = %options.name,
            namespace = %options.namespace,
            %operation,
            "starting release"
        );

        let prepared = self.prepare(options, operation).await?;
        let mut outcome = self.execute(options, operation, prepared).await?;

        match &outcome.auxiliary {
            Some(e) => warn!(
                release = %outcome.identity,
                error = %e,
                "release converged with cleanup errors"
            ),
            None => info!(
                release = %outcome.identity,
                resources = outcome.resources,
                "release converged"
            ),
        }

        if options.strict_cleanup
            && let Some(e) = outcome.auxiliary.take()
        {
            return Err(e);
        }
        Ok(outcome)
    }

    /// Everything before the first cluster mutation
    async fn prepare(
        &self,
        options: &ReleaseOptions,
        operation: Operation,
    ) -> Result<PreparedRelease> {
        let workdir = WorkDir::new(&options.work_dir, &options.name);
        workdir.prepare()?;

        let request = FetchRequest::new(&options.chart_ref, workdir.charts())
            .with_version(options.version.clone())
            .with_repository(options.repo_url.clone())
            .with_credentials(options.username.clone(), options.password.clone());
        let chart_dir = self.fetcher.fetch(&request).await?;

        let metadata = ChartMetadata::load(&chart_dir)?;
        let identity = ReleaseIdentity::resolve(
            &options.name,
            &options.namespace,
            &options.chart_ref,
            options.version.as_deref(),
            metadata.as_ref(),
        );
        info!(release = %identity, chart = %identity.chart_name, "resolved release");

        self.renderer
            .render(&RenderRequest {
                chart_dir: &chart_dir,
                release_name: &options.name,
                namespace: &options.namespace,
                output_dir: &workdir.output(),
                is_upgrade: operation.is_upgrade(),
                values: &options.values,
            })
            .await?;

        split_tree(workdir.output())?;
        let hooks = extract_and_label(&workdir.output(), &workdir.hooks(), &identity)?;
        info!(hooks = hooks.len(), "prepared manifests");

        Ok(PreparedRelease {
            identity,
            workdir,
            hooks,
        })
    }

    /// Hooks, main apply and garbage collection
    async fn execute(
        &self,
        options: &ReleaseOptions,
        operation: Operation,
        prepared: PreparedRelease,
    ) -> Result<ReleaseOutcome> {
        let PreparedRelease {
            identity,
            workdir,
            hooks,
        } = prepared;

        let mode = ApplyMode::for_operation(operation);
        let settings = HookSettings {
            namespace: options.namespace.clone(),
            mode,
            wait: options.wait,
            disable_deletion: options.disable_hook_deletion,
            job_timeout: options.job_timeout,
        };
        let runner = HookPhaseRunner::new(
            self.applier.as_ref(),
            self.waiter.as_ref(),
            &hooks,
            settings,
        );
        let (pre, post) = HookPhase::around(operation);

        runner.run(HookPhase::CrdInstall).await?;
        runner.run(pre).await?;

        let resources = match ResourceSetApplier::new(self.applier.as_ref())
            .apply(
                &workdir.output(),
                &options.name,
                &options.namespace,
                mode,
                options.wait,
            )
            .await
        {
            Ok(resources) => resources,
            Err(e) => {
                if let Err(cleanup) = runner.cleanup(pre, HookOutcome::Failed).await {
                    warn!(phase = %pre, error = %cleanup, "hook cleanup after failed apply also failed");
                }
                return Err(e);
            }
        };

        let mut auxiliary = Vec::new();
        if let Err(e) = runner.cleanup(pre, HookOutcome::Succeeded).await {
            auxiliary.push(e);
        }

        if let Err(e) = runner.run(post).await {
            if let Err(cleanup) = runner.cleanup(post, HookOutcome::Failed).await {
                warn!(phase = %post, error = %cleanup, "hook cleanup after failed hook also failed");
            }
            return Err(e);
        }

        if let Err(e) = runner.cleanup(post, HookOutcome::Succeeded).await {
            auxiliary.push(e);
        }

        let report = GarbageCollector::new(self.applier.as_ref(), &options.gc)
            .collect_stale(&identity)
            .await;
        let collected = report.deleted;
        auxiliary.extend(report.into_error());

        Ok(ReleaseOutcome {
            identity,
            operation,
            resources,
            hooks: hooks.len(),
            collected,
            auxiliary: combine(auxiliary),
        })
    }

    // ========== Uninstall ==========

    /// Delete every resource labeled with the release
    ///
    /// Returns the number of objects removed. Any kind failing to delete
    /// fails the call.
    pub async fn uninstall(
        &self,
        release: &str,
        namespace: &str,
        gc: &GcConfig,
    ) -> Result<usize> {
        validate_release_name(release)?;
        validate_namespace(namespace)?;

        let report = GarbageCollector::new(self.applier.as_ref(), gc)
            .collect_release(release, namespace)
            .await;
        let deleted = report.deleted;
        match report.into_error() {
            Some(e) => Err(e),
            None => {
                info!(%release, %namespace, deleted, "release uninstalled");
                Ok(deleted)
            }
        }
    }

    // ========== Status ==========

    /// List the release's namespaced resources
    pub async fn status(
        &self,
        release: &str,
        namespace: &str,
        gc: &GcConfig,
    ) -> Result<ReleaseStatus> {
        validate_release_name(release)?;
        validate_namespace(namespace)?;

        let mut seen = BTreeSet::new();
        let mut resources = Vec::new();
        for kind in &gc.namespaced_kinds {
            for resource in self.applier.list(namespace, kind).await? {
                if resource.label(RELEASE_NAME_LABEL) != Some(release) {
                    continue;
                }
                if seen.insert((resource.kind.clone(), resource.name.clone())) {
                    resources.push(resource);
                }
            }
        }

        Ok(ReleaseStatus {
            release: release.to_string(),
            namespace: namespace.to_string(),
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(kind: &str, name: &str, version: &str) -> ResourceSummary {
        ResourceSummary {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: Some("prod".to_string()),
            labels: [
                (RELEASE_NAME_LABEL.to_string(), "demo".to_string()),
                (CHART_VERSION_LABEL.to_string(), version.to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_status_chart_versions() {
        let status = ReleaseStatus {
            release: "demo".to_string(),
            namespace: "prod".to_string(),
            resources: vec![
                resource("ConfigMap", "a", "1.0.0"),
                resource("Secret", "b", "2.0.0"),
                resource("Service", "c", "2.0.0"),
            ],
        };
        let versions: Vec<&str> = status.chart_versions().into_iter().collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
        assert!(!status.is_empty());
    }

    #[test]
    fn test_outcome_is_clean() {
        let identity = ReleaseIdentity {
            release_name: "demo".to_string(),
            namespace: "prod".to_string(),
            chart_name: "web".to_string(),
            chart_version: "1.0.0".to_string(),
            app_version: None,
        };
        let mut outcome = ReleaseOutcome {
            identity,
            operation: Operation::Install,
            resources: 1,
            hooks: 0,
            collected: 0,
            auxiliary: None,
        };
        assert!(outcome.is_clean());
        outcome.auxiliary = Some(KubeError::GarbageCollection { errors: Vec::new() });
        assert!(!outcome.is_clean());
    }
}
