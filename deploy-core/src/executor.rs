//! Execution of a single deployment step: resolve inputs, decide
//! deploy-vs-skip, submit transactions, await confirmations, update the
//! registry.
//!
//! Deployment commit and post-deploy initialization are separate idempotence
//! domains: once a deployment confirms and its registry entry is recorded,
//! re-runs never redeploy the unit; they only retry the post-deploy calls
//! that have not yet succeeded.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256};
use deploy_common::{
    calldata,
    constants::DETERMINISTIC_DEPLOY_FACTORY,
    hashing,
    types::{
        CallResult, CallTarget, DeployAction, DeploymentStep, ExecutionResult, PostDeployCall,
        RegistryEntry, StepAction, StepStatus,
    },
};
use tracing::{debug, info, warn};

use crate::{
    errors::DeployError,
    interfaces::{ArtifactSource, NetworkClient, TxRequest},
    proxy::ProxyLifecycle,
    registry::DeploymentRegistry,
};

/// The result of landing a contract on the network
pub(crate) struct Deployment {
    /// The address the contract lives at
    pub address: Address,
    /// The deployment transaction hash; `None` when a live contract was
    /// adopted at the deterministic address without submitting
    pub tx_hash: Option<B256>,
    /// Whether a transaction was submitted for this deployment
    pub submitted: bool,
}

/// Lands a contract on the network.
///
/// With a CREATE2 salt the target address is computed in advance and probed
/// first: live code there means a previous attempt (possibly under a lost
/// registry, or a run aborted between confirmation and record) already
/// deployed this exact configuration, and the address is adopted without a
/// new transaction. Without a salt the contract is deployed via plain CREATE
/// and the address is taken from the receipt.
pub(crate) async fn deploy_contract<C: NetworkClient>(
    client: &C,
    label: &str,
    init_code: Bytes,
    create2_salt: Option<B256>,
    gas_price: Option<u128>,
) -> Result<Deployment, DeployError> {
    if let Some(salt) = create2_salt {
        let expected = hashing::deterministic_address(salt, &init_code);

        let code = client.code_at(expected).await?;
        if !code.is_empty() {
            info!("`{}` already live at {:#x}, adopting", label, expected);
            return Ok(Deployment { address: expected, tx_hash: None, submitted: false });
        }

        let mut data = Vec::with_capacity(B256::len_bytes() + init_code.len());
        data.extend_from_slice(salt.as_slice());
        data.extend_from_slice(&init_code);

        let tx = TxRequest::call(DETERMINISTIC_DEPLOY_FACTORY, data.into())
            .with_gas_price(gas_price);
        let tx_hash = client.submit(tx).await?;
        let receipt = client.confirm(tx_hash).await?;
        if !receipt.success {
            return Err(DeployError::TransactionFailure(format!(
                "deterministic deployment of `{label}` reverted in tx {tx_hash:#x}"
            )));
        }

        info!("`{}` deployed at {:#x}", label, expected);
        return Ok(Deployment { address: expected, tx_hash: Some(tx_hash), submitted: true });
    }

    let tx = TxRequest::create(init_code).with_gas_price(gas_price);
    let tx_hash = client.submit(tx).await?;
    let receipt = client.confirm(tx_hash).await?;
    if !receipt.success {
        return Err(DeployError::TransactionFailure(format!(
            "deployment of `{label}` reverted in tx {tx_hash:#x}"
        )));
    }

    let address = receipt.contract_address.ok_or_else(|| {
        DeployError::TransactionFailure(format!(
            "no contract address in receipt for `{label}` (tx {tx_hash:#x})"
        ))
    })?;

    info!("`{}` deployed at {:#x}", label, address);
    Ok(Deployment { address, tx_hash: Some(tx_hash), submitted: true })
}

/// Executes a single deployment step against the registry and the network
pub struct StepExecutor<'a, C: NetworkClient, A: ArtifactSource> {
    /// The network client transactions are submitted through
    client: &'a C,
    /// The artifact source contracts are resolved from
    artifacts: &'a A,
    /// The registry consulted for idempotence and updated on commit
    registry: &'a DeploymentRegistry,
}

impl<'a, C: NetworkClient, A: ArtifactSource> StepExecutor<'a, C, A> {
    /// Creates an executor over the given collaborators
    pub fn new(client: &'a C, artifacts: &'a A, registry: &'a DeploymentRegistry) -> Self {
        Self { client, artifacts, registry }
    }

    /// Executes a step, resolving dependency references against the
    /// addresses of already-executed steps.
    ///
    /// Per-step failures are reported in the returned [`ExecutionResult`];
    /// the `Err` channel carries only run-fatal errors (registry write
    /// failures and reinitialization attempts).
    pub async fn execute(
        &self,
        step: &DeploymentStep,
        resolved: &HashMap<String, Address>,
    ) -> Result<ExecutionResult, DeployError> {
        match &step.action {
            StepAction::External { address } => {
                debug!("step `{}` pinned to external address {:#x}", step.id, address);
                Ok(ExecutionResult {
                    id: step.id.clone(),
                    status: StepStatus::Skipped,
                    address: Some(*address),
                    calls: Vec::new(),
                    error: None,
                })
            }
            StepAction::Deploy(action) => {
                match self.execute_deploy(step, action, resolved).await {
                    Ok(result) => Ok(result),
                    Err(e) if e.is_fatal() => Err(e),
                    Err(e) => {
                        warn!("step `{}` failed: {}", step.id, e);
                        Ok(ExecutionResult {
                            id: step.id.clone(),
                            status: StepStatus::Failed,
                            address: None,
                            calls: Vec::new(),
                            error: Some(e.to_string()),
                        })
                    }
                }
            }
        }
    }

    /// Executes the deployment half of a step, then its post-deploy calls
    async fn execute_deploy(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        resolved: &HashMap<String, Address>,
    ) -> Result<ExecutionResult, DeployError> {
        let artifact = self.artifacts.artifact(&action.contract)?;
        let artifact_hash = hashing::artifact_hash(&artifact.bytecode);

        let encoded_args = calldata::encode_params(
            calldata::resolve_args(&action.args, resolved)
                .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?,
        );
        let args_hash = hashing::args_hash(&encoded_args);

        let (address, status, mut entry) = if let Some(spec) = &action.proxy {
            ProxyLifecycle::new(self.client, self.artifacts, self.registry)
                .execute(step, action, spec, resolved, &artifact, artifact_hash, args_hash, &encoded_args)
                .await?
        } else {
            self.execute_plain(step, action, &artifact.bytecode, artifact_hash, args_hash, &encoded_args)
                .await?
        };

        // The unit's own address is visible to its post-deploy calls
        let mut local = resolved.clone();
        local.insert(step.id.clone(), address);

        let (calls, call_error) = self
            .run_post_deploy(step, &action.post_deploy, &mut entry, &local, address)
            .await?;

        Ok(ExecutionResult {
            id: step.id.clone(),
            status: if call_error.is_some() { StepStatus::Failed } else { status },
            address: Some(address),
            calls,
            error: call_error,
        })
    }

    /// Deploys (or skips) a plain, non-proxied unit and records it
    async fn execute_plain(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        bytecode: &Bytes,
        artifact_hash: B256,
        args_hash: B256,
        encoded_args: &[u8],
    ) -> Result<(Address, StepStatus, RegistryEntry), DeployError> {
        if let Some(existing) = self.registry.lookup(&step.id) {
            if existing.is_current(artifact_hash, args_hash, None) {
                debug!("step `{}` already current at {:#x}", step.id, existing.address);
                return Ok((existing.address, StepStatus::Skipped, existing));
            }
        }

        let mut init_code = Vec::with_capacity(bytecode.len() + encoded_args.len());
        init_code.extend_from_slice(bytecode);
        init_code.extend_from_slice(encoded_args);

        let salt = step_salt(action, artifact_hash, args_hash)?;
        let deployment =
            deploy_contract(self.client, &step.id, init_code.into(), salt, action.gas_price)
                .await?;

        let entry = RegistryEntry {
            address: deployment.address,
            artifact_hash,
            args_hash,
            init_args_hash: None,
            tx_hash: deployment.tx_hash,
            proxy: false,
            implementation: None,
            admin: None,
            initializer_invoked: false,
            completed_calls: Vec::new(),
        };
        self.registry.record(&step.id, entry.clone())?;

        let status = if deployment.submitted { StepStatus::Deployed } else { StepStatus::Skipped };
        Ok((deployment.address, status, entry))
    }

    /// Runs the step's post-deploy calls in declared order, recording
    /// progress per call so a re-run retries only the calls that have not
    /// yet succeeded.
    ///
    /// Returns the per-call results and, if a call failed, its message; the
    /// deployment itself remains committed either way.
    async fn run_post_deploy(
        &self,
        step: &DeploymentStep,
        calls: &[PostDeployCall],
        entry: &mut RegistryEntry,
        resolved: &HashMap<String, Address>,
        own_address: Address,
    ) -> Result<(Vec<CallResult>, Option<String>), DeployError> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if entry.completed_calls.contains(&call.label) {
                debug!("step `{}`: call `{}` already completed", step.id, call.label);
                results.push(CallResult {
                    label: call.label.clone(),
                    success: true,
                    error: None,
                });
                continue;
            }

            match self.submit_call(call, resolved, own_address).await {
                Ok(()) => {
                    entry.completed_calls.push(call.label.clone());
                    self.registry.record(&step.id, entry.clone())?;
                    results.push(CallResult {
                        label: call.label.clone(),
                        success: true,
                        error: None,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("step `{}`: call `{}` failed: {}", step.id, call.label, e);
                    let message = format!("call `{}` failed: {}", call.label, e);
                    results.push(CallResult {
                        label: call.label.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    });
                    return Ok((results, Some(message)));
                }
            }
        }

        Ok((results, None))
    }

    /// Encodes, submits, and awaits a single post-deploy call
    async fn submit_call(
        &self,
        call: &PostDeployCall,
        resolved: &HashMap<String, Address>,
        own_address: Address,
    ) -> Result<(), DeployError> {
        let target = match &call.target {
            CallTarget::This => own_address,
            CallTarget::Unit(id) => *resolved.get(id).ok_or_else(|| {
                DeployError::CalldataConstruction(format!(
                    "call target `{id}` has no resolved address"
                ))
            })?,
        };

        let data = calldata::encode_call(&call.method, &call.args, resolved)
            .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?;

        let tx_hash = self.client.submit(TxRequest::call(target, data)).await?;
        let receipt = self.client.confirm(tx_hash).await?;
        if !receipt.success {
            return Err(DeployError::TransactionFailure(format!(
                "`{}` to {:#x} reverted in tx {:#x}",
                call.method, target, tx_hash,
            )));
        }

        info!("call `{}` confirmed in tx {:#x}", call.label, tx_hash);
        Ok(())
    }
}

/// Derives the final CREATE2 salt for a step, if it deploys deterministically
pub(crate) fn step_salt(
    action: &DeployAction,
    artifact_hash: B256,
    args_hash: B256,
) -> Result<Option<B256>, DeployError> {
    action
        .salt
        .as_deref()
        .map(|salt| {
            let bytes = hashing::parse_salt(salt)
                .map_err(|e| DeployError::CalldataConstruction(format!("bad salt `{salt}`: {e}")))?;
            Ok(hashing::create2_salt(&bytes, artifact_hash, args_hash))
        })
        .transpose()
}
