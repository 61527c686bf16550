//! Status command - show resources labeled with a release

use console::style;
use tugboat_kube::GcConfig;

use crate::ClusterArgs;
use crate::error::Result;

/// Run the status command
pub async fn run(name: &str, cluster: &ClusterArgs) -> Result<()> {
    let manager = super::manager(cluster, None);
    let status = manager
        .status(name, &cluster.namespace, &GcConfig::default())
        .await?;

    println!(
        "{} {} in namespace {}",
        style("Release:").bold(),
        style(&status.release).cyan(),
        style(&status.namespace).yellow()
    );

    if status.is_empty() {
        println!("  No resources found");
        return Ok(());
    }

    let versions: Vec<&str> = status.chart_versions().into_iter().collect();
    let versions = if versions.is_empty() {
        "unknown".to_string()
    } else {
        versions.join(", ")
    };
    println!("{} {}", style("Chart version:").bold(), style(versions).yellow());
    if status.chart_versions().len() > 1 {
        println!(
            "{} Resources from more than one chart version; the last upgrade may not have finished garbage collection",
            style("⚠").yellow()
        );
    }

    println!();
    println!("{}", style("Resources:").bold());
    for resource in &status.resources {
        println!("  {}", resource.display_name());
    }

    Ok(())
}
