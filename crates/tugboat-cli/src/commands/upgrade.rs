//! Upgrade command - apply a new render and collect stale resources

use console::style;
use tugboat_core::Operation;

use crate::DeployArgs;
use crate::error::Result;

/// Run the upgrade command
pub async fn run(args: &DeployArgs) -> Result<()> {
    let options = super::release_options(args, Operation::Upgrade)?;
    println!(
        "{} Upgrading release {} from {} in namespace {}",
        style("→").blue().bold(),
        style(&args.name).cyan(),
        style(&args.chart).cyan(),
        style(&args.cluster.namespace).yellow()
    );
    if args.wait {
        println!(
            "{} Will wait for Deployments to become available",
            style("→").blue()
        );
    }

    let manager = super::manager(&args.cluster, Some(args.helm.as_path()));
    let outcome = manager.upgrade(&options).await?;

    super::print_outcome(&outcome);
    Ok(())
}
