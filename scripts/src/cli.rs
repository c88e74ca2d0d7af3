//! Definitions of CLI arguments and commands for the deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use deploy_core::{
    errors::DeployError,
    interfaces::{ArtifactSource, NetworkClient},
    registry::DeploymentRegistry,
};

use crate::commands::{deploy, plan, status};

/// CLI for deploying and initializing the 2048 game contracts
#[derive(Parser)]
pub struct Cli {
    /// Private key of the deployer
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub priv_key: String,

    /// Network RPC URL
    #[arg(short, long)]
    pub rpc_url: String,

    /// Name of the target network; scopes the deployment registry
    #[arg(short, long)]
    pub network: String,

    /// Directory holding the per-network deployment registries
    #[arg(short, long, default_value = "deployments")]
    pub deployments_dir: PathBuf,

    /// Directory holding the compiled contract artifacts
    #[arg(short, long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment manifest against the target network.
    ///
    /// Re-running against an unchanged configuration is a no-op: units whose
    /// artifact and constructor arguments are unchanged are skipped, and
    /// only post-deploy calls that have not yet succeeded are retried.
    Deploy(DeployArgs),
    /// Print the topological deployment plan without executing it
    Plan,
    /// Show the registry state of every unit on the target network
    Status,
}

/// Arguments restricting which steps a deploy run executes
#[derive(Args)]
pub struct DeployArgs {
    /// Execute only the steps carrying any of these tags
    #[arg(short, long)]
    pub tag: Vec<String>,

    /// Execute only the steps with these ids
    #[arg(short, long)]
    pub only: Vec<String>,
}

impl Command {
    /// Runs the command against the given collaborators
    pub async fn run(
        self,
        client: &impl NetworkClient,
        artifacts: &impl ArtifactSource,
        registry: &DeploymentRegistry,
    ) -> Result<(), DeployError> {
        match self {
            Command::Deploy(args) => deploy(args, client, artifacts, registry).await,
            Command::Plan => plan(client),
            Command::Status => status(client, artifacts, registry),
        }
    }
}
