//! Uninstall command - remove a release from Kubernetes

use console::style;
use tugboat_kube::GcConfig;

use crate::ClusterArgs;
use crate::error::Result;

/// Run the uninstall command
pub async fn run(name: &str, cluster: &ClusterArgs) -> Result<()> {
    println!(
        "{} Uninstalling release {} from namespace {}",
        style("→").blue().bold(),
        style(name).cyan(),
        style(&cluster.namespace).yellow()
    );

    let manager = super::manager(cluster, None);
    let deleted = manager
        .uninstall(name, &cluster.namespace, &GcConfig::default())
        .await?;

    if deleted == 0 {
        println!(
            "{} No resources labeled with release {} were found",
            style("⚠").yellow(),
            style(name).cyan()
        );
    } else {
        println!(
            "{} Successfully uninstalled {} ({} object(s) deleted)",
            style("✓").green().bold(),
            style(name).cyan(),
            deleted
        );
    }

    Ok(())
}
