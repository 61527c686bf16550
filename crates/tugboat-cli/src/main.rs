//! Tugboat CLI - client-side Kubernetes release manager

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "tugboat")]
#[command(author = "Tugboat Contributors")]
#[command(version)]
#[command(about = "Deploy charts with hooks and garbage collection, no server-side release store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Cluster connection flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Target namespace
    #[arg(short, long, env = "TUGBOAT_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// kubectl context to use
    #[arg(long, env = "TUGBOAT_KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long, env = "TUGBOAT_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// kubectl binary
    #[arg(long, env = "TUGBOAT_KUBECTL", default_value = "kubectl")]
    pub kubectl: PathBuf,
}

/// Flags shared by install and upgrade
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Release name
    pub name: String,

    /// Chart directory, or chart name in --repo
    pub chart: String,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Chart version (overrides the version in Chart.yaml)
    #[arg(id = "chart_version", long = "chart-version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Chart repository URL
    #[arg(long, env = "TUGBOAT_REPO_URL")]
    pub repo: Option<String>,

    /// Chart repository username
    #[arg(long, env = "TUGBOAT_REPO_USERNAME")]
    pub username: Option<String>,

    /// Chart repository password
    #[arg(long, env = "TUGBOAT_REPO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Values file(s) passed to the renderer
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Wait for Deployments to become available (upgrade only)
    #[arg(long)]
    pub wait: bool,

    /// Keep hook resources regardless of their delete policy
    #[arg(long)]
    pub no_hook_deletion: bool,

    /// Seconds to wait for hook Jobs before deleting them
    #[arg(long, default_value = "1800")]
    pub job_timeout: u64,

    /// Fail when hook cleanup or garbage collection fails
    #[arg(long)]
    pub strict_cleanup: bool,

    /// Scratch directory for rendered manifests
    #[arg(long, env = "TUGBOAT_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Path to the helm binary used for rendering
    #[arg(long, env = "TUGBOAT_HELM", default_value = "helm")]
    pub helm: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a chart as a new release
    Install(DeployArgs),

    /// Upgrade a release to a new render and remove stale resources
    Upgrade(DeployArgs),

    /// Delete every resource labeled with a release
    Uninstall {
        /// Release name
        name: String,

        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Show the resources currently labeled with a release
    Status {
        /// Release name
        name: String,

        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Install(args) => commands::install::run(&args).await,
        Commands::Upgrade(args) => commands::upgrade::run(&args).await,
        Commands::Uninstall { name, cluster } => commands::uninstall::run(&name, &cluster).await,
        Commands::Status { name, cluster } => commands::status::run(&name, &cluster).await,
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(code)
        }
    }
}
