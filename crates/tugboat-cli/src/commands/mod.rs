//! CLI commands

pub mod install;
pub mod status;
pub mod uninstall;
pub mod upgrade;

use console::style;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tugboat_core::{Operation, ValueOverrides};
use tugboat_kube::{
    GcConfig, HelmRenderer, KubeJobWaiter, KubectlApplier, ReleaseManager, ReleaseOptions,
    ReleaseOutcome,
};
use tugboat_repo::ChartFetcher;

use crate::error::{CliError, Result};
use crate::{ClusterArgs, DeployArgs};

/// Build a manager wired to `helm`, `kubectl` and the Kubernetes API
pub fn manager(cluster: &ClusterArgs, helm: Option<&Path>) -> ReleaseManager {
    let mut applier = KubectlApplier::new().with_binary(&cluster.kubectl);
    if let Some(context) = &cluster.kube_context {
        applier = applier.with_context(context);
    }
    if let Some(kubeconfig) = &cluster.kubeconfig {
        applier = applier.with_kubeconfig(kubeconfig);
    }

    let mut renderer = HelmRenderer::new();
    if let Some(binary) = helm {
        renderer = renderer.with_binary(binary);
    }

    ReleaseManager::new(
        Arc::new(ChartFetcher::new()),
        Arc::new(renderer),
        Arc::new(applier),
        Arc::new(job_waiter(cluster)),
    )
}

/// Build a Job waiter targeting the same cluster as `kubectl`
pub fn job_waiter(cluster: &ClusterArgs) -> KubeJobWaiter {
    KubeJobWaiter::with_config(cluster.kubeconfig.clone(), cluster.kube_context.clone())
}

/// Translate install/upgrade flags into release options
pub fn release_options(args: &DeployArgs, operation: Operation) -> Result<ReleaseOptions> {
    if args.job_timeout == 0 {
        return Err(CliError::validation("--job-timeout must be greater than zero"));
    }

    let mut options = ReleaseOptions::new(&args.name, &args.cluster.namespace, &args.chart)
        .with_operation(operation)
        .with_values(ValueOverrides::new(args.set.clone(), args.values.clone()))
        .with_job_timeout(Duration::from_secs(args.job_timeout))
        .with_gc(GcConfig::default());

    if let Some(version) = &args.version {
        options = options.with_version(version);
    }
    if let Some(repo) = &args.repo {
        options = options.with_repository(repo);
    }
    options.username = args.username.clone();
    options.password = args.password.clone();
    if let Some(dir) = &args.work_dir {
        options = options.with_work_dir(dir);
    }
    if args.wait {
        options = options.with_wait();
    }
    if args.no_hook_deletion {
        options = options.without_hook_deletion();
    }
    if args.strict_cleanup {
        options = options.with_strict_cleanup();
    }

    debug!(
        release = %options.name,
        work_dir = %options.work_dir.display(),
        "release options ready"
    );
    Ok(options)
}

/// Print the summary of a converged install or upgrade
pub fn print_outcome(outcome: &ReleaseOutcome) {
    println!(
        "{} Release {} {} with chart {} version {}",
        style("✓").green().bold(),
        style(&outcome.identity.release_name).cyan(),
        match outcome.operation {
            Operation::Install => "installed",
            Operation::Upgrade => "upgraded",
        },
        style(&outcome.identity.chart_name).cyan(),
        style(&outcome.identity.chart_version).yellow()
    );
    println!("  Resource files applied: {}", outcome.resources);
    println!("  Hooks: {}", outcome.hooks);
    if outcome.collected > 0 {
        println!("  Stale objects removed: {}", outcome.collected);
    }

    if let Some(e) = &outcome.auxiliary {
        println!(
            "{} Release converged but cleanup reported errors:",
            style("⚠").yellow()
        );
        println!("  {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cluster(kubeconfig: Option<&str>, context: Option<&str>) -> ClusterArgs {
        ClusterArgs {
            namespace: "prod".to_string(),
            kube_context: context.map(str::to_string),
            kubeconfig: kubeconfig.map(PathBuf::from),
            kubectl: PathBuf::from("kubectl"),
        }
    }

    #[test]
    fn test_job_waiter_follows_cluster_flags() {
        let waiter = job_waiter(&cluster(Some("/srv/kube/config"), Some("staging")));
        assert_eq!(waiter.kubeconfig(), Some(Path::new("/srv/kube/config")));
        assert_eq!(waiter.context(), Some("staging"));
    }

    #[test]
    fn test_job_waiter_defaults_without_flags() {
        let waiter = job_waiter(&cluster(None, None));
        assert!(waiter.kubeconfig().is_none());
        assert!(waiter.context().is_none());
    }
}
