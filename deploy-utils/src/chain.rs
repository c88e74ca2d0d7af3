//! An in-memory chain implementing the engine's network client contract.
//!
//! Deployments land at real CREATE/CREATE2 addresses (the CREATE2 factory
//! calling convention matches the deterministic-deployment factory), so
//! address-determinism properties hold exactly as they would on a live
//! network. Every submission is recorded for spy assertions, and reverts can
//! be injected per method selector or per artifact bytecode.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use alloy_primitives::{keccak256, Address, Bytes, B256};
use deploy_common::{
    calldata,
    constants::{DETERMINISTIC_DEPLOY_FACTORY, EIP1967_ADMIN_SLOT, SELECTOR_BYTES},
};
use deploy_core::{
    errors::DeployError,
    interfaces::{NetworkClient, TxReceipt, TxRequest},
};

/// A transaction recorded by the mock chain
#[derive(Clone, Debug)]
pub struct SubmittedTx {
    /// The recipient (`None` for a plain CREATE)
    pub to: Option<Address>,
    /// The raw calldata / init code
    pub data: Bytes,
    /// Whether the transaction deployed a contract (plain CREATE or a
    /// CREATE2 factory call)
    pub is_deploy: bool,
}

/// The mutable chain state behind the mock
#[derive(Default)]
struct ChainState {
    /// The deployer's next CREATE nonce
    nonce: u64,
    /// Monotonic counter feeding transaction hashes
    tx_counter: u64,
    /// Deployed code by address
    code: HashMap<Address, Bytes>,
    /// Storage words by (address, slot)
    storage: HashMap<(Address, B256), B256>,
    /// Receipts by transaction hash
    receipts: HashMap<B256, TxReceipt>,
    /// Every submitted transaction, in order
    submitted: Vec<SubmittedTx>,
    /// Call transactions carrying one of these selectors revert
    reverting_selectors: Vec<[u8; SELECTOR_BYTES]>,
    /// Deployments whose init code starts with one of these revert
    failing_bytecode: Vec<Bytes>,
}

/// An in-memory chain with CREATE/CREATE2 address semantics
pub struct MockChain {
    /// The deployer identity
    deployer: Address,
    /// The chain state
    state: Mutex<ChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A fresh chain with a fixed deployer identity
    pub fn new() -> Self {
        Self {
            deployer: Address::repeat_byte(0xde),
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Injects a revert for every call transaction carrying the selector of
    /// `signature`
    pub fn revert_calls_matching(&self, signature: &str) {
        let sel = calldata::selector(signature).expect("bad signature");
        self.lock().reverting_selectors.push(sel);
    }

    /// Injects a failure for every deployment whose init code starts with
    /// `bytecode`
    pub fn fail_deploys_of(&self, bytecode: Bytes) {
        self.lock().failing_bytecode.push(bytecode);
    }

    /// Clears all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.reverting_selectors.clear();
        state.failing_bytecode.clear();
    }

    /// Every transaction submitted so far, in order
    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.lock().submitted.clone()
    }

    /// The total number of submitted transactions
    pub fn tx_count(&self) -> usize {
        self.lock().submitted.len()
    }

    /// The number of submitted deployment transactions
    pub fn deploy_count(&self) -> usize {
        self.lock().submitted.iter().filter(|tx| tx.is_deploy).count()
    }

    /// The number of call transactions carrying the selector of `signature`
    pub fn calls_matching(&self, signature: &str) -> usize {
        let sel = calldata::selector(signature).expect("bad signature");
        self.lock()
            .submitted
            .iter()
            .filter(|tx| !tx.is_deploy && tx.data.starts_with(&sel))
            .count()
    }

    /// Whether code is live at the address
    pub fn has_code(&self, address: Address) -> bool {
        self.lock().code.contains_key(&address)
    }

    /// The locked chain state
    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("chain lock poisoned")
    }

    /// Installs code at an address, along with a synthetic EIP-1967 admin
    /// slot so proxy admin discovery works against the mock
    fn install_code(state: &mut ChainState, address: Address, init_code: Bytes) {
        let mut preimage = address.to_vec();
        preimage.extend_from_slice(b"admin");
        let admin = Address::from_word(keccak256(&preimage));

        state.code.insert(address, init_code);
        state
            .storage
            .insert((address, EIP1967_ADMIN_SLOT), admin.into_word());
    }
}

impl NetworkClient for MockChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn submit(&self, tx: TxRequest) -> Result<B256, DeployError> {
        let mut state = self.lock();

        state.tx_counter += 1;
        let tx_hash = keccak256(state.tx_counter.to_be_bytes());

        let receipt = match tx.to {
            // CREATE2 through the deterministic-deployment factory:
            // calldata is salt || init_code
            Some(to) if to == DETERMINISTIC_DEPLOY_FACTORY => {
                let salt = B256::from_slice(&tx.data[..B256::len_bytes()]);
                let init_code = Bytes::copy_from_slice(&tx.data[B256::len_bytes()..]);
                let failed =
                    state.failing_bytecode.iter().any(|b| init_code.starts_with(b));

                if !failed {
                    let address =
                        DETERMINISTIC_DEPLOY_FACTORY.create2(salt, keccak256(&init_code));
                    Self::install_code(&mut state, address, init_code);
                }
                state.submitted.push(SubmittedTx {
                    to: tx.to,
                    data: tx.data,
                    is_deploy: true,
                });
                TxReceipt { tx_hash, contract_address: None, success: !failed }
            }
            // Plain CREATE: nonce-derived address
            None => {
                let failed =
                    state.failing_bytecode.iter().any(|b| tx.data.starts_with(b));
                let contract_address = if failed {
                    None
                } else {
                    let address = self.deployer.create(state.nonce);
                    state.nonce += 1;
                    Self::install_code(&mut state, address, tx.data.clone());
                    Some(address)
                };
                state.submitted.push(SubmittedTx {
                    to: None,
                    data: tx.data,
                    is_deploy: true,
                });
                TxReceipt { tx_hash, contract_address, success: !failed }
            }
            // A call transaction; succeeds unless its selector reverts
            Some(to) => {
                let reverted = tx.data.len() >= SELECTOR_BYTES
                    && state
                        .reverting_selectors
                        .iter()
                        .any(|sel| tx.data.starts_with(sel));
                state.submitted.push(SubmittedTx {
                    to: Some(to),
                    data: tx.data,
                    is_deploy: false,
                });
                TxReceipt { tx_hash, contract_address: None, success: !reverted }
            }
        };

        state.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256) -> Result<TxReceipt, DeployError> {
        self.lock()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| DeployError::TransactionFailure(format!("unknown tx {tx_hash:#x}")))
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, DeployError> {
        Ok(Bytes::new())
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, DeployError> {
        Ok(self
            .lock()
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or(B256::ZERO))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        Ok(self.lock().code.get(&address).cloned().unwrap_or_default())
    }
}
