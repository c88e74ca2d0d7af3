//! Entrypoint for the deploy scripts

use clap::Parser;
use deploy_core::{errors::DeployError, registry::DeploymentRegistry};
use scripts::{artifacts::DirArtifacts, cli::Cli, client::HttpNetworkClient};

#[tokio::main]
async fn main() -> Result<(), DeployError> {
    let Cli {
        priv_key,
        rpc_url,
        network,
        deployments_dir,
        artifacts_dir,
        command,
    } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    let client = HttpNetworkClient::connect(&priv_key, &rpc_url).await?;
    let artifacts = DirArtifacts::new(artifacts_dir);
    let registry = DeploymentRegistry::open(&deployments_dir, &network)?;

    command.run(&client, &artifacts, &registry).await
}
