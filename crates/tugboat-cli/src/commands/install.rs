//! Install command - deploy a chart as a new release

use console::style;
use tugboat_core::Operation;

use crate::DeployArgs;
use crate::error::Result;

/// Run the install command
pub async fn run(args: &DeployArgs) -> Result<()> {
    let options = super::release_options(args, Operation::Install)?;
    println!(
        "{} Installing release {} from {} into namespace {}",
        style("→").blue().bold(),
        style(&args.name).cyan(),
        style(&args.chart).cyan(),
        style(&args.cluster.namespace).yellow()
    );

    let manager = super::manager(&args.cluster, Some(args.helm.as_path()));
    let outcome = manager.install(&options).await?;

    super::print_outcome(&outcome);
    Ok(())
}
