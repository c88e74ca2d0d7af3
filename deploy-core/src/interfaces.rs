//! Narrow contracts for the collaborators the engine consumes.
//!
//! The engine does not compile contracts, manage keys, estimate gas, or
//! speak RPC. It resolves artifacts through [`ArtifactSource`] and reaches
//! the network through [`NetworkClient`]; everything behind those traits is
//! out of scope.

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::errors::DeployError;

/// A compiled contract artifact: interface description plus deployable
/// bytecode
#[derive(Clone, Debug)]
pub struct Artifact {
    /// The contract ABI, as a JSON string
    pub abi: String,
    /// The contract creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

/// A transaction to submit to the network
#[derive(Clone, Debug)]
pub struct TxRequest {
    /// The recipient; `None` deploys a contract via CREATE
    pub to: Option<Address>,
    /// The calldata (or init code for a CREATE)
    pub data: Bytes,
    /// The value sent with the transaction, in wei
    pub value: U256,
    /// Optional gas price override, in wei
    pub gas_price: Option<u128>,
}

impl TxRequest {
    /// A contract-creation transaction
    pub fn create(data: Bytes) -> Self {
        Self { to: None, data, value: U256::ZERO, gas_price: None }
    }

    /// A call transaction to the given address
    pub fn call(to: Address, data: Bytes) -> Self {
        Self { to: Some(to), data, value: U256::ZERO, gas_price: None }
    }

    /// Sets a gas price override
    pub fn with_gas_price(mut self, gas_price: Option<u128>) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// The confirmation of a mined transaction
#[derive(Clone, Debug)]
pub struct TxReceipt {
    /// The hash of the transaction
    pub tx_hash: B256,
    /// The created contract address, for plain CREATE transactions
    pub contract_address: Option<Address>,
    /// Whether the transaction succeeded
    pub success: bool,
}

/// Source of compiled contract artifacts
pub trait ArtifactSource {
    /// Resolves the artifact for the named contract
    fn artifact(&self, name: &str) -> Result<Artifact, DeployError>;
}

/// A minimal network client: submit transactions, await confirmations, and
/// perform read-only probes
#[allow(async_fn_in_trait)]
pub trait NetworkClient {
    /// The address transactions are sent from
    fn deployer(&self) -> Address;

    /// Submits a transaction, returning its hash
    async fn submit(&self, tx: TxRequest) -> Result<B256, DeployError>;

    /// Blocks until the transaction is mined, returning its receipt.
    ///
    /// No timeout is imposed beyond what the underlying transport provides.
    async fn confirm(&self, tx_hash: B256) -> Result<TxReceipt, DeployError>;

    /// Executes a read-only call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeployError>;

    /// Reads a storage slot
    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, DeployError>;

    /// Reads the code deployed at an address; empty if none
    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError>;
}
