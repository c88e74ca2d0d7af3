//! An alloy-backed implementation of the engine's network client

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use deploy_core::{
    errors::DeployError,
    interfaces::{NetworkClient, TxReceipt, TxRequest},
};
use tracing::debug;

use crate::constants::RECEIPT_POLL_INTERVAL;

/// A network client over an HTTP provider with a local signing wallet.
///
/// Gas estimation, nonce management, and transport live in the provider;
/// the engine only submits, confirms, and probes.
pub struct HttpNetworkClient {
    /// The underlying provider
    provider: DynProvider,
    /// The address transactions are signed with
    deployer: Address,
}

impl HttpNetworkClient {
    /// Connects to `rpc_url` with a wallet derived from `priv_key`
    pub async fn connect(priv_key: &str, rpc_url: &str) -> Result<Self, DeployError> {
        let signer: PrivateKeySigner = priv_key
            .parse()
            .map_err(|e| DeployError::ClientInitialization(format!("bad private key: {e}")))?;
        let deployer = signer.address();

        let url = rpc_url
            .parse()
            .map_err(|e| DeployError::ClientInitialization(format!("bad RPC URL: {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url)
            .erased();

        Ok(Self { provider, deployer })
    }

    /// Builds a provider transaction request from an engine request
    fn build_request(tx: TxRequest) -> TransactionRequest {
        let mut request = TransactionRequest::default().with_value(tx.value);
        request = match tx.to {
            Some(to) => request.with_to(to).with_input(tx.data),
            None => request.with_deploy_code(tx.data),
        };
        if let Some(gas_price) = tx.gas_price {
            request = request.with_gas_price(gas_price);
        }
        request
    }
}

impl NetworkClient for HttpNetworkClient {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn submit(&self, tx: TxRequest) -> Result<B256, DeployError> {
        let request = Self::build_request(tx);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| DeployError::TransactionSubmission(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: B256) -> Result<TxReceipt, DeployError> {
        // Block until the transaction is mined; the poll interval is the
        // only pacing imposed here
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| DeployError::TransactionFailure(e.to_string()))?;

            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    tx_hash,
                    contract_address: receipt.contract_address,
                    success: receipt.status(),
                });
            }

            debug!("tx {:#x} pending, polling again", tx_hash);
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeployError> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(&request)
            .await
            .map_err(|e| DeployError::TransactionFailure(e.to_string()))
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, DeployError> {
        let word: U256 = self
            .provider
            .get_storage_at(address, slot.into())
            .await
            .map_err(|e| DeployError::TransactionFailure(e.to_string()))?;

        Ok(B256::from(word))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| DeployError::TransactionFailure(e.to_string()))
    }
}
