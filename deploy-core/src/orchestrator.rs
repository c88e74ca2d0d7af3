//! The orchestrator: walks the deployment plan, drives the step executor,
//! and aggregates results.
//!
//! Failure policy: a failed step blocks exactly its transitive dependents;
//! independent steps still execute, preserving maximal forward progress. The
//! returned report enumerates every selected step, not just the first
//! failure, so a failed multi-step rollout can be resumed without guesswork.

use std::collections::HashMap;

use alloy_primitives::Address;
use deploy_common::types::{
    DeploymentStep, ExecutionResult, RunFilter, StepAction, StepStatus,
};
use futures::future::join_all;
use tracing::{debug, info};

use crate::{
    errors::DeployError,
    executor::StepExecutor,
    graph,
    interfaces::{ArtifactSource, NetworkClient},
    registry::DeploymentRegistry,
};

/// Drives a set of deployment steps to completion in dependency order
pub struct Orchestrator<'a, C: NetworkClient, A: ArtifactSource> {
    /// The network client steps are executed against
    client: &'a C,
    /// The artifact source steps resolve contracts from
    artifacts: &'a A,
    /// The registry shared by every step of the run
    registry: &'a DeploymentRegistry,
}

impl<'a, C: NetworkClient, A: ArtifactSource> Orchestrator<'a, C, A> {
    /// Creates an orchestrator over the given collaborators
    pub fn new(client: &'a C, artifacts: &'a A, registry: &'a DeploymentRegistry) -> Self {
        Self { client, artifacts, registry }
    }

    /// Runs the steps, optionally restricted by a tag/id filter, returning
    /// one result per selected step in plan order.
    ///
    /// Graph construction errors abort before anything executes; mid-run
    /// errors abort only when losing them would corrupt state (registry
    /// write failures, reinitialization attempts). Everything else is
    /// reported per step.
    pub async fn run(
        &self,
        steps: &[DeploymentStep],
        filter: Option<&RunFilter>,
    ) -> Result<Vec<ExecutionResult>, DeployError> {
        let plan = graph::build(steps)?;
        let by_id: HashMap<&str, &DeploymentStep> =
            steps.iter().map(|s| (s.id.as_str(), s)).collect();

        let executor = StepExecutor::new(self.client, self.artifacts, self.registry);

        // Addresses produced (or looked up) so far this run
        let mut resolved: HashMap<String, Address> = HashMap::new();
        // Steps whose address is not available, with the reason; dependents
        // of these are blocked
        let mut unavailable: HashMap<String, String> = HashMap::new();
        let mut results: Vec<ExecutionResult> = Vec::new();

        for (depth, layer) in plan.layers().iter().enumerate() {
            let mut runnable: Vec<&DeploymentStep> = Vec::new();

            for id in layer {
                let step = by_id[id.as_str()];

                if !filter.map_or(true, |f| f.matches(step)) {
                    self.resolve_unselected(step, &mut resolved, &mut unavailable);
                    continue;
                }

                let blocked_on = step
                    .dependencies
                    .iter()
                    .find(|dep| unavailable.contains_key(dep.as_str()));
                if let Some(dep) = blocked_on {
                    let reason =
                        format!("dependency `{}` unavailable: {}", dep, unavailable[dep]);
                    debug!("step `{}` blocked: {}", id, reason);
                    unavailable.insert(id.clone(), format!("blocked on `{dep}`"));
                    results.push(ExecutionResult::blocked(id, reason));
                    continue;
                }

                runnable.push(step);
            }

            if runnable.is_empty() {
                continue;
            }
            debug!(
                "layer {}: executing [{}]",
                depth,
                runnable.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", "),
            );

            // Steps within a layer are mutually independent; execute them
            // concurrently. The next layer starts only once every result
            // (and its registry write) has landed.
            let futures: Vec<_> =
                runnable.iter().map(|step| executor.execute(step, &resolved)).collect();
            let outcomes = join_all(futures).await;

            for (step, outcome) in runnable.iter().zip(outcomes) {
                let result = outcome?;
                match (result.status, result.address) {
                    (StepStatus::Deployed, Some(addr)) | (StepStatus::Skipped, Some(addr)) => {
                        resolved.insert(step.id.clone(), addr);
                    }
                    _ => {
                        let reason = result
                            .error
                            .clone()
                            .unwrap_or_else(|| "failed".to_string());
                        unavailable.insert(step.id.clone(), reason);
                    }
                }
                results.push(result);
            }
        }

        // Report in plan order
        let position: HashMap<&str, usize> =
            plan.order().iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        results.sort_by_key(|r| position[r.id.as_str()]);

        info!(
            "run complete: {} deployed, {} skipped, {} failed, {} blocked",
            count(&results, StepStatus::Deployed),
            count(&results, StepStatus::Skipped),
            count(&results, StepStatus::Failed),
            count(&results, StepStatus::Blocked),
        );
        Ok(results)
    }

    /// Resolves the address of a step the filter excluded from execution:
    /// pinned steps resolve to their constant, deployed steps to their
    /// registry entry. A step resolvable by neither leaves its dependents
    /// blocked.
    fn resolve_unselected(
        &self,
        step: &DeploymentStep,
        resolved: &mut HashMap<String, Address>,
        unavailable: &mut HashMap<String, String>,
    ) {
        match &step.action {
            StepAction::External { address } => {
                resolved.insert(step.id.clone(), *address);
            }
            StepAction::Deploy(_) => match self.registry.lookup(&step.id) {
                Some(entry) => {
                    debug!(
                        "step `{}` not selected; using registry address {:#x}",
                        step.id, entry.address,
                    );
                    resolved.insert(step.id.clone(), entry.address);
                }
                None => {
                    unavailable.insert(
                        step.id.clone(),
                        "not selected for this run and absent from the registry".to_string(),
                    );
                }
            },
        }
    }
}

/// The number of results with the given status
fn count(results: &[ExecutionResult], status: StepStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}

/// The first result in plan order that failed or was blocked, if any
pub fn first_failure(results: &[ExecutionResult]) -> Option<&ExecutionResult> {
    results.iter().find(|r| !r.status.is_success())
}
