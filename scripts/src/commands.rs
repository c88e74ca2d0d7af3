//! Implementations of the deploy script commands

use deploy_common::{
    hashing,
    types::{ExecutionResult, RunFilter, StepAction},
};
use deploy_core::{
    errors::DeployError,
    graph,
    interfaces::{ArtifactSource, NetworkClient},
    orchestrator::{first_failure, Orchestrator},
    registry::DeploymentRegistry,
};

use crate::{cli::DeployArgs, steps::game_steps};

/// Runs the deployment manifest, printing the full run report and failing
/// with the first failed or blocked step id
pub(crate) async fn deploy(
    args: DeployArgs,
    client: &impl NetworkClient,
    artifacts: &impl ArtifactSource,
    registry: &DeploymentRegistry,
) -> Result<(), DeployError> {
    let steps = game_steps(client.deployer());

    let filter = (!args.tag.is_empty() || !args.only.is_empty())
        .then(|| RunFilter { only: args.only, tags: args.tag });

    let results = Orchestrator::new(client, artifacts, registry)
        .run(&steps, filter.as_ref())
        .await?;

    print_report(registry.network(), &results);

    match first_failure(&results) {
        Some(failure) => Err(DeployError::RunFailed { step: failure.id.clone() }),
        None => Ok(()),
    }
}

/// Prints the topological deployment plan without executing anything
pub(crate) fn plan(client: &impl NetworkClient) -> Result<(), DeployError> {
    let steps = game_steps(client.deployer());
    let plan = graph::build(&steps)?;

    for (depth, layer) in plan.layers().iter().enumerate() {
        println!("layer {}: {}", depth, layer.join(", "));
    }
    Ok(())
}

/// Prints the registry state of every unit in the manifest
pub(crate) fn status(
    client: &impl NetworkClient,
    artifacts: &impl ArtifactSource,
    registry: &DeploymentRegistry,
) -> Result<(), DeployError> {
    let steps = game_steps(client.deployer());

    println!("deployments on `{}`:", registry.network());
    for step in &steps {
        match &step.action {
            StepAction::External { address } => {
                println!("  {:<24} {:<16} {:#x}", step.id, "pinned", address);
            }
            StepAction::Deploy(action) => match registry.lookup(&step.id) {
                None => println!("  {:<24} not deployed", step.id),
                Some(entry) => {
                    let current = artifacts
                        .artifact(&action.contract)
                        .map(|a| hashing::artifact_hash(&a.bytecode) == entry.artifact_hash)
                        .unwrap_or(false);
                    let state = if current { "current" } else { "stale artifact" };
                    println!("  {:<24} {:<16} {:#x}", step.id, state, entry.address);
                }
            },
        }
    }
    Ok(())
}

/// Prints the per-step run report
fn print_report(network: &str, results: &[ExecutionResult]) {
    println!("\nrun report for `{network}`:");
    for result in results {
        let address = result
            .address
            .map(|a| format!("{a:#x}"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {:<28} {}", result.id, result.status.to_string(), address);

        for call in &result.calls {
            let outcome = if call.success { "ok" } else { "failed" };
            println!("    call {:<19} {}", call.label, outcome);
        }
        if let Some(error) = &result.error {
            println!("    error: {error}");
        }
    }
}
