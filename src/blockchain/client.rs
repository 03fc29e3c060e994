// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM JSON-RPC access for every configured chain.
//!
//! [`ChainRpc`] is the seam between the transfer executors and the network.
//! [`AlloyChainRpc`] implements it on top of one alloy HTTP provider per
//! chain, with every call bounded by a client-side timeout.

use std::{collections::HashMap, future::Future, time::Duration};

use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{Address, TxHash, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use super::erc20::Erc20Contract;
use super::registry::ChainRegistry;
use super::transactions::{FeeParams, SignedTransfer, DEFAULT_PRIORITY_FEE_WEI};
use super::types::Chain;

/// HTTP provider type for EVM chains (with all fillers).
pub(crate) type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors from chain interactions.
///
/// The variants are distinct so callers can tell a business failure
/// (`InsufficientFunds`, `ContractCallReverted`) from a transient one
/// (`RpcUnavailable`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Contract call reverted: {0}")]
    ContractCallReverted(String),

    #[error("RPC unavailable: {0}")]
    RpcUnavailable(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Chain error: {0}")]
    Rpc(String),
}

impl ChainError {
    /// Classify a node or transport error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("insufficient funds") {
            Self::InsufficientFunds(message)
        } else if lower.contains("revert") || lower.contains("call exception") {
            Self::ContractCallReverted(message)
        } else if lower.contains("error sending request")
            || lower.contains("connection")
            || lower.contains("timed out")
            || lower.contains("dns error")
            || lower.contains("503 service unavailable")
            || lower.contains("502 bad gateway")
        {
            Self::RpcUnavailable(message)
        } else {
            Self::Rpc(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RpcUnavailable(_))
    }
}

/// Receipt summary for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub success: bool,
}

/// JSON-RPC operations the transfer core depends on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn native_balance(&self, chain: &Chain, address: Address) -> Result<U256, ChainError>;

    async fn token_balance(
        &self,
        chain: &Chain,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError>;

    /// Next nonce including transactions still in the mempool.
    async fn pending_nonce(&self, chain: &Chain, address: Address) -> Result<u64, ChainError>;

    async fn fee_params(&self, chain: &Chain) -> Result<FeeParams, ChainError>;

    async fn estimate_gas(
        &self,
        chain: &Chain,
        request: TransactionRequest,
    ) -> Result<u64, ChainError>;

    /// Broadcast a signed transaction, returning once the node accepts it.
    async fn send_raw_transaction(
        &self,
        chain: &Chain,
        signed: &SignedTransfer,
    ) -> Result<TxHash, ChainError>;

    async fn transaction_receipt(
        &self,
        chain: &Chain,
        hash: TxHash,
    ) -> Result<Option<TxReceipt>, ChainError>;
}

// =============================================================================
// EvmClient
// =============================================================================

/// Client for a single EVM chain.
pub struct EvmClient {
    chain_id: String,
    provider: HttpProvider,
}

impl EvmClient {
    pub fn new(chain: &Chain) -> Result<Self, ChainError> {
        let url = chain
            .rpc_endpoint
            .clone()
            .ok_or_else(|| ChainError::InvalidRpcUrl(format!("{} has no RPC endpoint", chain.id)))?;

        Ok(Self {
            chain_id: chain.id.clone(),
            provider: ProviderBuilder::new().connect_http(url),
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    async fn fee_params(&self) -> Result<FeeParams, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::classify(format!("Failed to get block: {e}")))?;

        match block.and_then(|b| b.header.base_fee_per_gas) {
            Some(base_fee) => {
                let priority_fee = match self.provider.get_max_priority_fee_per_gas().await {
                    Ok(fee) => fee,
                    Err(e) => {
                        tracing::debug!(
                            chain_id = %self.chain_id,
                            error = %e,
                            "eth_maxPriorityFeePerGas unavailable, using default"
                        );
                        DEFAULT_PRIORITY_FEE_WEI
                    }
                };
                Ok(FeeParams::from_base_fee(base_fee as u128, priority_fee))
            }
            None => {
                let gas_price = self
                    .provider
                    .get_gas_price()
                    .await
                    .map_err(|e| ChainError::classify(e.to_string()))?;
                Ok(FeeParams::Legacy { gas_price })
            }
        }
    }
}

// =============================================================================
// AlloyChainRpc
// =============================================================================

/// [`ChainRpc`] over alloy HTTP providers, one per EVM chain.
pub struct AlloyChainRpc {
    clients: HashMap<String, EvmClient>,
    timeout: Duration,
}

impl AlloyChainRpc {
    /// Build a client for every enabled EVM chain in the registry.
    pub fn new(registry: &ChainRegistry, timeout: Duration) -> Result<Self, ChainError> {
        let mut clients = HashMap::new();
        for chain in registry.list_enabled_chains() {
            if chain.is_ledger() {
                continue;
            }
            clients.insert(chain.id.clone(), EvmClient::new(chain)?);
        }
        Ok(Self { clients, timeout })
    }

    pub fn client(&self, chain: &Chain) -> Result<&EvmClient, ChainError> {
        self.clients
            .get(&chain.id)
            .ok_or_else(|| ChainError::InvalidRpcUrl(format!("no RPC client for {}", chain.id)))
    }

    async fn bounded<T>(
        &self,
        chain: &Chain,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                ChainError::RpcUnavailable(format!(
                    "{} RPC timed out after {}s",
                    chain.id,
                    self.timeout.as_secs()
                ))
            })?
    }
}

#[async_trait]
impl ChainRpc for AlloyChainRpc {
    async fn native_balance(&self, chain: &Chain, address: Address) -> Result<U256, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, async {
            client
                .provider
                .get_balance(address)
                .await
                .map_err(|e| ChainError::classify(e.to_string()))
        })
        .await
    }

    async fn token_balance(
        &self,
        chain: &Chain,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        let client = self.client(chain)?;
        let contract = Erc20Contract::new(&client.provider, token);
        self.bounded(chain, contract.balance_of(holder)).await
    }

    async fn pending_nonce(&self, chain: &Chain, address: Address) -> Result<u64, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, async {
            client
                .provider
                .get_transaction_count(address)
                .pending()
                .await
                .map_err(|e| ChainError::classify(e.to_string()))
        })
        .await
    }

    async fn fee_params(&self, chain: &Chain) -> Result<FeeParams, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, client.fee_params()).await
    }

    async fn estimate_gas(
        &self,
        chain: &Chain,
        request: TransactionRequest,
    ) -> Result<u64, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, async {
            client
                .provider
                .estimate_gas(request)
                .await
                .map_err(|e| ChainError::classify(e.to_string()))
        })
        .await
    }

    async fn send_raw_transaction(
        &self,
        chain: &Chain,
        signed: &SignedTransfer,
    ) -> Result<TxHash, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, async {
            let pending = client
                .provider
                .send_raw_transaction(&signed.raw)
                .await
                .map_err(|e| ChainError::classify(e.to_string()))?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        chain: &Chain,
        hash: TxHash,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let client = self.client(chain)?;
        self.bounded(chain, async {
            let receipt = client
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ChainError::classify(format!("Failed to get receipt: {e}")))?;
            Ok(receipt.map(|r| TxReceipt {
                tx_hash: format!("{:?}", r.transaction_hash),
                block_number: r.block_number.unwrap_or(0),
                gas_used: r.gas_used as u64,
                effective_gas_price: r.effective_gas_price,
                success: r.status(),
            }))
        })
        .await
    }
}
