//! Definitions of deployment steps, registry entries, and run results

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

// ---------
// | Steps |
// ---------

/// A single named deployment step.
///
/// Steps are declared in a flat list; the dependency graph derives the
/// execution order from the `dependencies` ids. Ids must be unique within a
/// run and every dependency id must name another declared step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// Unique id of the step within a run
    pub id: String,
    /// Ids of the steps that must complete before this one executes
    pub dependencies: Vec<String>,
    /// Labels used for selective execution
    pub tags: Vec<String>,
    /// What the step does when executed
    pub action: StepAction,
}

/// The action a step performs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StepAction {
    /// Deploy a contract (optionally behind an upgradeable proxy)
    Deploy(DeployAction),
    /// A pinned, pre-resolved address that is not managed by the
    /// orchestrator. Resolving it never touches the network or registry.
    External {
        /// The externally-known address the step resolves to
        address: Address,
    },
}

/// The deployment half of a step: constructor arguments, optional proxy
/// specification, and the post-deploy call list
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployAction {
    /// The name of the contract artifact to deploy
    pub contract: String,
    /// Constructor arguments, resolved against dependency addresses
    pub args: Vec<CallArg>,
    /// Optional hex salt enabling deterministic (CREATE2) addressing
    pub salt: Option<String>,
    /// Optional gas price override for the deployment transaction, in wei
    pub gas_price: Option<u128>,
    /// Present iff the contract is deployed behind an upgradeable proxy
    pub proxy: Option<ProxySpec>,
    /// Calls to execute, in order, after the deployment is committed
    pub post_deploy: Vec<PostDeployCall>,
}

/// Specification of an upgradeable-proxy deployment.
///
/// The step's artifact becomes the implementation; the proxy constructor
/// invokes `init_method` through the proxy exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxySpec {
    /// Owner of the proxy admin contract
    pub owner: CallArg,
    /// Solidity signature of the one-time initializer, e.g.
    /// `initialize(address,address)`
    pub init_method: String,
    /// Arguments to the initializer
    pub init_args: Vec<CallArg>,
}

/// A call submitted after a step's deployment commits, e.g. a minter grant
/// or a price configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostDeployCall {
    /// Label identifying the call in the registry and the run report
    pub label: String,
    /// The contract the call is sent to
    pub target: CallTarget,
    /// Solidity signature of the method, e.g. `setMinter(address,bool)`
    pub method: String,
    /// Arguments to the method
    pub args: Vec<CallArg>,
}

/// The target of a post-deploy call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CallTarget {
    /// The deployed address of the named step
    Unit(String),
    /// The address deployed by the step the call belongs to
    This,
}

/// An argument to a constructor, initializer, or post-deploy call.
///
/// `Dependency` is the substitution point between the graph and the
/// executor: it resolves to the deployed address of the named step at
/// execution time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CallArg {
    /// A literal address
    Address(Address),
    /// An unsigned 256-bit integer
    Uint(U256),
    /// A boolean
    Bool(bool),
    /// Raw bytes
    Bytes(Bytes),
    /// A string
    Str(String),
    /// The deployed address of the named step
    Dependency(String),
}

impl DeploymentStep {
    /// A step deploying the named contract artifact
    pub fn deploy(id: &str, contract: &str) -> Self {
        Self {
            id: id.to_string(),
            dependencies: Vec::new(),
            tags: Vec::new(),
            action: StepAction::Deploy(DeployAction {
                contract: contract.to_string(),
                args: Vec::new(),
                salt: None,
                gas_price: None,
                proxy: None,
                post_deploy: Vec::new(),
            }),
        }
    }

    /// A step resolving to a pinned, externally-managed address
    pub fn external(id: &str, address: Address) -> Self {
        Self {
            id: id.to_string(),
            dependencies: Vec::new(),
            tags: Vec::new(),
            action: StepAction::External { address },
        }
    }

    /// Adds dependencies on the named steps
    pub fn depends_on<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.dependencies.extend(ids.into_iter().map(String::from));
        self
    }

    /// Adds a tag for selective execution
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Sets the constructor arguments. No effect on external steps.
    pub fn constructor_args(mut self, args: impl IntoIterator<Item = CallArg>) -> Self {
        if let StepAction::Deploy(ref mut action) = self.action {
            action.args = args.into_iter().collect();
        }
        self
    }

    /// Sets the deterministic-deployment salt. No effect on external steps.
    pub fn with_salt(mut self, salt: &str) -> Self {
        if let StepAction::Deploy(ref mut action) = self.action {
            action.salt = Some(salt.to_string());
        }
        self
    }

    /// Sets a gas price override in wei. No effect on external steps.
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        if let StepAction::Deploy(ref mut action) = self.action {
            action.gas_price = Some(gas_price);
        }
        self
    }

    /// Deploys the contract behind an upgradeable proxy. No effect on
    /// external steps.
    pub fn with_proxy(mut self, proxy: ProxySpec) -> Self {
        if let StepAction::Deploy(ref mut action) = self.action {
            action.proxy = Some(proxy);
        }
        self
    }

    /// Appends a post-deploy call. No effect on external steps.
    pub fn with_call(mut self, call: PostDeployCall) -> Self {
        if let StepAction::Deploy(ref mut action) = self.action {
            action.post_deploy.push(call);
        }
        self
    }

    /// The deploy action of the step, if it has one
    pub fn deploy_action(&self) -> Option<&DeployAction> {
        match self.action {
            StepAction::Deploy(ref action) => Some(action),
            StepAction::External { .. } => None,
        }
    }
}

impl PostDeployCall {
    /// A post-deploy call to the named step's deployed contract
    pub fn to_unit(label: &str, unit: &str, method: &str, args: Vec<CallArg>) -> Self {
        Self {
            label: label.to_string(),
            target: CallTarget::Unit(unit.to_string()),
            method: method.to_string(),
            args,
        }
    }

    /// A post-deploy call to the step's own deployed contract
    pub fn to_self(label: &str, method: &str, args: Vec<CallArg>) -> Self {
        Self {
            label: label.to_string(),
            target: CallTarget::This,
            method: method.to_string(),
            args,
        }
    }
}

// ------------
// | Registry |
// ------------

/// A deployment registry entry for a unit on a given network.
///
/// At most one live entry exists per (network, unit name). The entry is
/// created when the deployment transaction confirms and updated in place as
/// post-deploy calls complete or the implementation is upgraded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// The deployed address of the unit (the proxy address if proxied)
    pub address: Address,
    /// keccak256 of the deployed bytecode (the implementation's if proxied)
    pub artifact_hash: B256,
    /// keccak256 of the ABI-encoded, resolved constructor arguments
    pub args_hash: B256,
    /// keccak256 of the ABI-encoded initializer arguments, if proxied
    pub init_args_hash: Option<B256>,
    /// Hash of the deployment transaction. `None` when the entry was adopted
    /// from a live contract found at the deterministic address.
    pub tx_hash: Option<B256>,
    /// Whether the unit sits behind an upgradeable proxy
    pub proxy: bool,
    /// The implementation address, if proxied
    pub implementation: Option<Address>,
    /// The proxy admin address, if proxied
    pub admin: Option<Address>,
    /// Whether the one-time initializer has been invoked. Once set, the
    /// initializer must never run again for this entry.
    pub initializer_invoked: bool,
    /// Labels of the post-deploy calls that have already succeeded
    pub completed_calls: Vec<String>,
}

impl RegistryEntry {
    /// The idempotence predicate: true iff the stored hashes match the ones
    /// about to be deployed, in which case a re-run submits no deployment
    /// transaction for this unit
    pub fn is_current(
        &self,
        artifact_hash: B256,
        args_hash: B256,
        init_args_hash: Option<B256>,
    ) -> bool {
        self.artifact_hash == artifact_hash
            && self.args_hash == args_hash
            && self.init_args_hash == init_args_hash
    }
}

// -----------
// | Results |
// -----------

/// The outcome of a single step in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// A deployment transaction was submitted and confirmed
    Deployed,
    /// The registry entry was already current; no deployment was submitted
    Skipped,
    /// The deployment or one of its post-deploy calls failed
    Failed,
    /// A step in the dependency closure failed, so this step never executed
    Blocked,
}

impl StepStatus {
    /// Whether the step completed without error
    pub fn is_success(self) -> bool {
        matches!(self, StepStatus::Deployed | StepStatus::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Deployed => write!(f, "deployed"),
            StepStatus::Skipped => write!(f, "skipped (already current)"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// The result of a single post-deploy call
#[derive(Clone, Debug)]
pub struct CallResult {
    /// The label of the call
    pub label: String,
    /// Whether the call succeeded (or had already succeeded in a prior run)
    pub success: bool,
    /// The failure message, if the call failed
    pub error: Option<String>,
}

/// The per-step result owned by the orchestrator for the duration of a run
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// The id of the step
    pub id: String,
    /// The outcome of the step
    pub status: StepStatus,
    /// The resolved address of the unit, when known
    pub address: Option<Address>,
    /// Results of the step's post-deploy calls, in declared order
    pub calls: Vec<CallResult>,
    /// The failure or blockage reason, if any
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A result for a step that never executed because of a failure in its
    /// dependency closure
    pub fn blocked(id: &str, reason: String) -> Self {
        Self {
            id: id.to_string(),
            status: StepStatus::Blocked,
            address: None,
            calls: Vec::new(),
            error: Some(reason),
        }
    }
}

// -----------
// | Filters |
// -----------

/// An optional predicate restricting which steps execute in a run.
///
/// An empty filter selects every step. Dependencies of selected steps that
/// the filter excludes are resolved from the registry instead of executed.
#[derive(Clone, Debug, Default)]
pub struct RunFilter {
    /// Step ids to execute
    pub only: Vec<String>,
    /// Tags to execute; a step matches if it carries any of them
    pub tags: Vec<String>,
}

impl RunFilter {
    /// Whether the filter selects every step
    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.tags.is_empty()
    }

    /// Whether the filter selects the given step
    pub fn matches(&self, step: &DeploymentStep) -> bool {
        self.is_empty()
            || self.only.iter().any(|id| *id == step.id)
            || self.tags.iter().any(|tag| step.tags.contains(tag))
    }
}
