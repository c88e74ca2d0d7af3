//! Lifecycle management for upgradeable-proxy units.
//!
//! A proxy unit is three contracts: the implementation, the
//! `TransparentUpgradeableProxy`, and the `ProxyAdmin` the proxy deploys for
//! itself. The proxy constructor invokes the one-time initializer, so a
//! freshly deployed proxy is initialized atomically; the engine's job is to
//! guarantee the initializer can never run a second time, while still
//! allowing the implementation behind the proxy to be upgraded in place.

use std::collections::HashMap;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256};
use deploy_common::{
    calldata,
    constants::{EIP1967_ADMIN_SLOT, PROXY_ARTIFACT_NAME, UPGRADE_AND_CALL_SIGNATURE},
    hashing,
    types::{CallArg, DeployAction, DeploymentStep, ProxySpec, RegistryEntry, StepStatus},
};
use tracing::{debug, info};

use crate::{
    errors::DeployError,
    executor::{deploy_contract, step_salt},
    interfaces::{Artifact, ArtifactSource, NetworkClient, TxRequest},
    registry::DeploymentRegistry,
};

/// The lifecycle states of a proxy unit. Transitions are strictly forward;
/// `Initialized` is terminal and re-entering the initializer from it is
/// refused unconditionally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyPhase {
    /// Nothing deployed yet
    NoProxy,
    /// The implementation is live but the proxy is not
    ImplementationDeployed,
    /// The proxy is live but the initializer has not run
    ProxyDeployed,
    /// The initializer has run; only upgrades are possible from here
    Initialized,
}

/// The phase a unit's registry entry encodes
pub fn phase(entry: Option<&RegistryEntry>) -> ProxyPhase {
    match entry {
        Some(e) if e.proxy && e.initializer_invoked => ProxyPhase::Initialized,
        Some(e) if e.proxy => ProxyPhase::ProxyDeployed,
        _ => ProxyPhase::NoProxy,
    }
}

/// Executes the deployment half of proxy-flavored steps
pub(crate) struct ProxyLifecycle<'a, C: NetworkClient, A: ArtifactSource> {
    /// The network client transactions are submitted through
    client: &'a C,
    /// The artifact source the proxy artifact is resolved from
    artifacts: &'a A,
    /// The registry consulted for lifecycle state and updated on commit
    registry: &'a DeploymentRegistry,
}

impl<'a, C: NetworkClient, A: ArtifactSource> ProxyLifecycle<'a, C, A> {
    /// Creates a lifecycle manager over the given collaborators
    pub fn new(client: &'a C, artifacts: &'a A, registry: &'a DeploymentRegistry) -> Self {
        Self { client, artifacts, registry }
    }

    /// Deploys, skips, or upgrades a proxy unit according to its recorded
    /// lifecycle state.
    ///
    /// `artifact` is the implementation artifact; `encoded_args` are its
    /// ABI-encoded constructor arguments.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        spec: &ProxySpec,
        resolved: &HashMap<String, Address>,
        artifact: &Artifact,
        artifact_hash: B256,
        args_hash: B256,
        encoded_args: &[u8],
    ) -> Result<(Address, StepStatus, RegistryEntry), DeployError> {
        let init_calldata = calldata::encode_call(&spec.init_method, &spec.init_args, resolved)
            .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?;
        let init_args_hash = hashing::args_hash(&init_calldata);

        let existing = self.registry.lookup(&step.id);
        match phase(existing.as_ref()) {
            ProxyPhase::Initialized => {
                // `existing` is Some by construction of the phase
                let entry = existing.ok_or_else(|| {
                    DeployError::RegistryRead(format!("entry for `{}` vanished", step.id))
                })?;

                if entry.is_current(artifact_hash, args_hash, Some(init_args_hash)) {
                    debug!("proxy `{}` already current at {:#x}", step.id, entry.address);
                    return Ok((entry.address, StepStatus::Skipped, entry));
                }

                // Changed initializer arguments cannot be applied: the
                // initializer already ran and must not run again
                if entry.init_args_hash != Some(init_args_hash) {
                    return Err(DeployError::Reinitialization(step.id.clone()));
                }

                self.upgrade(step, action, entry, artifact, artifact_hash, args_hash, encoded_args)
                    .await
            }
            _ => {
                self.deploy_fresh(
                    step,
                    action,
                    spec,
                    resolved,
                    artifact,
                    artifact_hash,
                    args_hash,
                    init_args_hash,
                    encoded_args,
                    init_calldata,
                )
                .await
            }
        }
    }

    /// Deploys implementation + proxy (+ admin) and records the terminal
    /// `Initialized` entry.
    ///
    /// Only the terminal state is ever recorded: an implementation stranded
    /// by a crash before the proxy lands is re-derived (and adopted) through
    /// its deterministic address on the next run, so no partial entry is
    /// needed for recovery.
    #[allow(clippy::too_many_arguments)]
    async fn deploy_fresh(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        spec: &ProxySpec,
        resolved: &HashMap<String, Address>,
        artifact: &Artifact,
        artifact_hash: B256,
        args_hash: B256,
        init_args_hash: B256,
        encoded_args: &[u8],
        init_calldata: Bytes,
    ) -> Result<(Address, StepStatus, RegistryEntry), DeployError> {
        let implementation = self
            .deploy_implementation(step, action, artifact, artifact_hash, args_hash, encoded_args)
            .await?;

        // The proxy constructor deploys the admin and runs the initializer
        // through the proxy in the same transaction. The proxy itself is
        // deployed via plain CREATE: routing it through the CREATE2 factory
        // would make the factory `msg.sender` while the initializer runs.
        let proxy_artifact = self.artifacts.artifact(PROXY_ARTIFACT_NAME)?;
        let owner = calldata::resolve_args(std::slice::from_ref(&spec.owner), resolved)
            .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?
            .remove(0);
        let ctor_args = calldata::encode_params(vec![
            DynSolValue::Address(implementation),
            owner,
            DynSolValue::Bytes(init_calldata.to_vec()),
        ]);

        let mut init_code =
            Vec::with_capacity(proxy_artifact.bytecode.len() + ctor_args.len());
        init_code.extend_from_slice(&proxy_artifact.bytecode);
        init_code.extend_from_slice(&ctor_args);

        let label = format!("{} proxy", step.id);
        let deployment =
            deploy_contract(self.client, &label, init_code.into(), None, action.gas_price)
                .await?;

        // The recommended way to find the admin the proxy deployed for
        // itself is the EIP-1967 admin slot
        let admin_word = self
            .client
            .storage_at(deployment.address, EIP1967_ADMIN_SLOT)
            .await?;
        let admin = Address::from_word(admin_word);
        info!("proxy admin for `{}` at {:#x}", step.id, admin);

        let entry = RegistryEntry {
            address: deployment.address,
            artifact_hash,
            args_hash,
            init_args_hash: Some(init_args_hash),
            tx_hash: deployment.tx_hash,
            proxy: true,
            implementation: Some(implementation),
            admin: Some(admin),
            initializer_invoked: true,
            completed_calls: Vec::new(),
        };
        self.registry.record(&step.id, entry.clone())?;

        Ok((deployment.address, StepStatus::Deployed, entry))
    }

    /// Swaps the implementation behind a live, initialized proxy.
    ///
    /// `Initialized -> Initialized`: the proxy and admin addresses are
    /// preserved, the implementation and hashes are updated, and the
    /// initializer is never re-invoked.
    #[allow(clippy::too_many_arguments)]
    async fn upgrade(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        entry: RegistryEntry,
        artifact: &Artifact,
        artifact_hash: B256,
        args_hash: B256,
        encoded_args: &[u8],
    ) -> Result<(Address, StepStatus, RegistryEntry), DeployError> {
        let implementation = self
            .deploy_implementation(step, action, artifact, artifact_hash, args_hash, encoded_args)
            .await?;

        let admin = entry.admin.ok_or_else(|| {
            DeployError::TransactionFailure(format!(
                "no proxy admin recorded for `{}`; cannot upgrade",
                step.id,
            ))
        })?;

        // Upgrade with empty calldata: any migration entrypoint of the new
        // implementation must be a separately guarded method, not the
        // original initializer
        let data = calldata::encode_call(
            UPGRADE_AND_CALL_SIGNATURE,
            &[
                CallArg::Address(entry.address),
                CallArg::Address(implementation),
                CallArg::Bytes(Bytes::new()),
            ],
            &HashMap::new(),
        )
        .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?;

        let tx_hash = self
            .client
            .submit(TxRequest::call(admin, data).with_gas_price(action.gas_price))
            .await?;
        let receipt = self.client.confirm(tx_hash).await?;
        if !receipt.success {
            return Err(DeployError::TransactionFailure(format!(
                "upgrade of `{}` reverted in tx {:#x}",
                step.id, tx_hash,
            )));
        }

        info!(
            "upgraded `{}` at {:#x} to implementation {:#x}",
            step.id, entry.address, implementation,
        );

        let updated = RegistryEntry {
            artifact_hash,
            args_hash,
            tx_hash: Some(tx_hash),
            implementation: Some(implementation),
            ..entry
        };
        self.registry.record(&step.id, updated.clone())?;

        Ok((updated.address, StepStatus::Deployed, updated))
    }

    /// Deploys the implementation contract, honoring the step's salt
    async fn deploy_implementation(
        &self,
        step: &DeploymentStep,
        action: &DeployAction,
        artifact: &Artifact,
        artifact_hash: B256,
        args_hash: B256,
        encoded_args: &[u8],
    ) -> Result<Address, DeployError> {
        let mut init_code =
            Vec::with_capacity(artifact.bytecode.len() + encoded_args.len());
        init_code.extend_from_slice(&artifact.bytecode);
        init_code.extend_from_slice(encoded_args);

        let salt = step_salt(action, artifact_hash, args_hash)?;
        let label = format!("{} implementation", step.id);
        let deployment =
            deploy_contract(self.client, &label, init_code.into(), salt, action.gas_price)
                .await?;

        Ok(deployment.address)
    }
}
