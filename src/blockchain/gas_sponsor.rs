// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binding for the on-chain GasSponsor accounting contract.
//!
//! The contract keeps an escrow per sponsor and one record per sponsored
//! transaction. Registration (`sponsorTransaction`) is signed by the sponsor,
//! execution (`executeSponsoredTransaction`) by the transaction's initiator.
//! The contract enforces the fee ceilings and single execution; this module
//! maps its revert strings onto [`SponsorshipError`].

use std::{future::IntoFuture, time::Duration};

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, TxHash, B256, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionReceipt,
    signers::local::PrivateKeySigner,
    sol,
};
use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use utoipa::ToSchema;

use super::client::{ChainError, HttpProvider};
use super::types::Chain;

sol! {
    #[sol(rpc)]
    interface IGasSponsor {
        event TransactionSponsored(
            bytes32 indexed txHash,
            address indexed from,
            address indexed to,
            address sponsor,
            uint256 gasUsed,
            uint256 gasPrice,
            uint256 totalCost
        );

        function addSponsor(address sponsor) external payable;
        function removeSponsor(address sponsor) external;
        function addFunds() external payable;
        function withdrawFunds(uint256 amount) external;

        function sponsorTransaction(
            address from,
            address to,
            bytes data,
            uint256 gasPrice,
            uint256 gasLimit
        ) external returns (bytes32);
        function executeSponsoredTransaction(bytes32 txHash, bytes data) external;

        function getSponsorInfo(address sponsor)
            external
            view
            returns (uint256 balance, bool isActive, uint256 totalSponsored, uint256 lastSponsored);
        function sponsoredTransactions(bytes32 txHash)
            external
            view
            returns (
                address from,
                address to,
                uint256 gasLimit,
                uint256 gasPrice,
                address sponsor,
                bool executed,
                uint256 actualGasUsed,
                uint256 totalCost
            );

        function minSponsorBalance() external view returns (uint256);
        function maxGasPrice() external view returns (uint256);
        function maxGasLimit() external view returns (uint256);
    }
}

/// How long to wait for a sponsorship transaction to be mined.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SponsorshipError {
    #[error("No gas sponsor contract deployed on {0}")]
    NoSponsorDeployed(String),

    #[error("Gas sponsor signing key is not configured")]
    SponsorKeyMissing,

    #[error("Native token {0} cannot be sponsored; native transfers pay their own gas")]
    NativeNotSponsorable(String),

    #[error("Cannot sponsor self-transaction")]
    SelfSponsorshipForbidden,

    #[error("Gas price too high: {0}")]
    GasPriceTooHigh(String),

    #[error("Gas limit too high: {0}")]
    GasLimitTooHigh(String),

    #[error("Insufficient sponsor balance: {0}")]
    InsufficientSponsorBalance(String),

    #[error("Not an active sponsor")]
    NotActiveSponsor,

    #[error("Sponsor already exists: {0}")]
    SponsorAlreadyExists(String),

    #[error("Transaction already executed: {0}")]
    AlreadyExecuted(String),

    #[error("Only transaction initiator can execute")]
    NotInitiator,

    #[error("Unknown sponsored transaction: {0}")]
    UnknownSponsoredTransaction(String),

    #[error("Sponsorship contract reverted: {0}")]
    ContractReverted(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SponsorshipError {
    /// Map a contract error message onto a typed variant, keeping the
    /// revert reason verbatim where no variant matches.
    pub fn from_contract_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("Cannot sponsor self-transaction") {
            Self::SelfSponsorshipForbidden
        } else if message.contains("Gas price too high") {
            Self::GasPriceTooHigh(message)
        } else if message.contains("Gas limit too high") {
            Self::GasLimitTooHigh(message)
        } else if message.contains("Insufficient sponsor balance")
            || message.contains("Insufficient initial balance")
        {
            Self::InsufficientSponsorBalance(message)
        } else if message.contains("Not an active sponsor") {
            Self::NotActiveSponsor
        } else if message.contains("Sponsor already exists") {
            Self::SponsorAlreadyExists(message)
        } else if message.contains("Transaction already executed") {
            Self::AlreadyExecuted(message)
        } else if message.contains("Only transaction initiator") {
            Self::NotInitiator
        } else if message.to_ascii_lowercase().contains("revert") {
            Self::ContractReverted(message)
        } else {
            Self::Chain(ChainError::classify(message))
        }
    }
}

/// Contract-level safety ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorParameters {
    #[schema(value_type = String)]
    pub min_sponsor_balance: U256,
    #[schema(value_type = String)]
    pub max_gas_price: U256,
    #[schema(value_type = String)]
    pub max_gas_limit: U256,
}

/// A sponsor's escrow account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorInfo {
    #[schema(value_type = String)]
    pub balance: U256,
    pub is_active: bool,
    #[schema(value_type = String)]
    pub total_sponsored: U256,
    /// Unix timestamp of the last successful execution.
    #[schema(value_type = String)]
    pub last_sponsored: U256,
}

/// On-chain record of one sponsor/execute cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredTransaction {
    #[schema(value_type = String)]
    pub from_address: Address,
    #[schema(value_type = String)]
    pub to_address: Address,
    #[schema(value_type = String)]
    pub gas_limit: U256,
    #[schema(value_type = String)]
    pub gas_price: U256,
    #[schema(value_type = String)]
    pub sponsor_address: Address,
    pub executed: bool,
    #[schema(value_type = String)]
    pub actual_gas_used: U256,
    #[schema(value_type = String)]
    pub total_cost: U256,
}

/// Arguments of the sponsor-registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorCall {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub gas_price: u128,
}

impl SponsorCall {
    pub fn estimated_cost(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.gas_price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorReceipt {
    pub sponsored_tx_hash: B256,
    /// Hash of the registration transaction itself.
    pub registration_tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub execution_tx_hash: TxHash,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

/// Operations on a deployed sponsorship contract.
#[async_trait]
pub trait SponsorContract: Send + Sync {
    fn address(&self) -> Address;

    /// Whether code exists at the contract address.
    async fn is_deployed(&self) -> Result<bool, SponsorshipError>;

    async fn parameters(&self) -> Result<SponsorParameters, SponsorshipError>;

    async fn sponsor_info(&self, sponsor: Address) -> Result<SponsorInfo, SponsorshipError>;

    async fn sponsored_transaction(
        &self,
        sponsored_tx_hash: B256,
    ) -> Result<Option<SponsoredTransaction>, SponsorshipError>;

    /// Phase 2: register the transaction, signed by the sponsor.
    async fn sponsor_transaction(
        &self,
        sponsor: &PrivateKeySigner,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, SponsorshipError>;

    /// Phase 3: execute the registered call, signed by the initiator.
    async fn execute_sponsored_transaction(
        &self,
        initiator: &PrivateKeySigner,
        sponsored_tx_hash: B256,
        data: Bytes,
    ) -> Result<ExecutionReceipt, SponsorshipError>;

    async fn add_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError>;

    async fn withdraw_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError>;

    /// Enrol `sponsor` with an initial escrow deposit. Owner only.
    async fn register_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
        deposit: U256,
    ) -> Result<TxHash, SponsorshipError>;

    /// Deactivate `sponsor`; the contract refunds its escrow. Owner only.
    async fn remove_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
    ) -> Result<TxHash, SponsorshipError>;
}

// =============================================================================
// GasSponsorContract
// =============================================================================

/// [`SponsorContract`] backed by an alloy HTTP provider.
pub struct GasSponsorContract {
    address: Address,
    chain_id: String,
    rpc_url: Url,
    reader: IGasSponsor::IGasSponsorInstance<HttpProvider>,
    timeout: Duration,
}

impl GasSponsorContract {
    pub fn new(chain: &Chain, address: Address, timeout: Duration) -> Result<Self, ChainError> {
        let rpc_url = chain
            .rpc_endpoint
            .clone()
            .ok_or_else(|| ChainError::InvalidRpcUrl(format!("{} has no RPC endpoint", chain.id)))?;
        let provider: HttpProvider = ProviderBuilder::new().connect_http(rpc_url.clone());

        Ok(Self {
            address,
            chain_id: chain.id.clone(),
            rpc_url,
            reader: IGasSponsor::new(address, provider),
            timeout,
        })
    }

    fn writer(&self, signer: &PrivateKeySigner) -> IGasSponsor::IGasSponsorInstance<impl Provider> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(self.rpc_url.clone());
        IGasSponsor::new(self.address, provider)
    }

    /// Run one RPC round trip (a view call, or the fill-and-broadcast step
    /// of a write) under the configured timeout.
    async fn bounded<T, E: std::fmt::Display>(
        &self,
        action: &str,
        call: impl IntoFuture<Output = Result<T, E>>,
    ) -> Result<T, SponsorshipError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| SponsorshipError::from_contract_message(e.to_string())),
            Err(_) => Err(ChainError::RpcUnavailable(format!(
                "{} sponsorship contract {action} timed out",
                self.chain_id
            ))
            .into()),
        }
    }

    async fn read<T, E: std::fmt::Display>(
        &self,
        call: impl IntoFuture<Output = Result<T, E>>,
    ) -> Result<T, SponsorshipError> {
        self.bounded("read", call).await
    }
}

fn receipt_error(e: impl std::fmt::Display) -> SponsorshipError {
    SponsorshipError::Chain(ChainError::classify(format!("Failed to get receipt: {e}")))
}

/// Pull the sponsored transaction id out of the registration receipt.
///
/// Prefers the decoded `TransactionSponsored` event and falls back to the
/// first indexed topic of any log emitted by the contract.
fn sponsored_tx_id(receipt: &TransactionReceipt, contract: Address) -> Option<B256> {
    let logs = receipt.inner.logs();
    logs.iter()
        .find_map(|log| {
            log.log_decode::<IGasSponsor::TransactionSponsored>()
                .ok()
                .map(|decoded| decoded.inner.data.txHash)
        })
        .or_else(|| {
            logs.iter()
                .filter(|log| log.address() == contract)
                .find_map(|log| log.topics().get(1).copied())
        })
}

#[async_trait]
impl SponsorContract for GasSponsorContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn is_deployed(&self) -> Result<bool, SponsorshipError> {
        let code = self
            .read(self.reader.provider().get_code_at(self.address))
            .await?;
        Ok(!code.is_empty())
    }

    async fn parameters(&self) -> Result<SponsorParameters, SponsorshipError> {
        let min_call = self.reader.minSponsorBalance();
        let price_call = self.reader.maxGasPrice();
        let limit_call = self.reader.maxGasLimit();
        Ok(SponsorParameters {
            min_sponsor_balance: self.read(min_call.call()).await?,
            max_gas_price: self.read(price_call.call()).await?,
            max_gas_limit: self.read(limit_call.call()).await?,
        })
    }

    async fn sponsor_info(&self, sponsor: Address) -> Result<SponsorInfo, SponsorshipError> {
        let call = self.reader.getSponsorInfo(sponsor);
        let info = self.read(call.call()).await?;
        Ok(SponsorInfo {
            balance: info.balance,
            is_active: info.isActive,
            total_sponsored: info.totalSponsored,
            last_sponsored: info.lastSponsored,
        })
    }

    async fn sponsored_transaction(
        &self,
        sponsored_tx_hash: B256,
    ) -> Result<Option<SponsoredTransaction>, SponsorshipError> {
        let call = self.reader.sponsoredTransactions(sponsored_tx_hash);
        let record = self.read(call.call()).await?;
        if record.from == Address::ZERO {
            return Ok(None);
        }
        Ok(Some(SponsoredTransaction {
            from_address: record.from,
            to_address: record.to,
            gas_limit: record.gasLimit,
            gas_price: record.gasPrice,
            sponsor_address: record.sponsor,
            executed: record.executed,
            actual_gas_used: record.actualGasUsed,
            total_cost: record.totalCost,
        }))
    }

    async fn sponsor_transaction(
        &self,
        sponsor: &PrivateKeySigner,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, SponsorshipError> {
        let contract = self.writer(sponsor);
        let sponsor_call = contract.sponsorTransaction(
            call.from,
            call.to,
            call.data.clone(),
            U256::from(call.gas_price),
            U256::from(call.gas_limit),
        );
        let receipt = self
            .bounded("sponsorTransaction", sponsor_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;

        if !receipt.status() {
            return Err(SponsorshipError::ContractReverted(format!(
                "sponsorTransaction reverted in {:?}",
                receipt.transaction_hash
            )));
        }
        let sponsored_tx_hash = sponsored_tx_id(&receipt, self.address).ok_or_else(|| {
            SponsorshipError::ContractReverted(
                "TransactionSponsored event missing from receipt".into(),
            )
        })?;

        Ok(SponsorReceipt {
            sponsored_tx_hash,
            registration_tx_hash: receipt.transaction_hash,
        })
    }

    async fn execute_sponsored_transaction(
        &self,
        initiator: &PrivateKeySigner,
        sponsored_tx_hash: B256,
        data: Bytes,
    ) -> Result<ExecutionReceipt, SponsorshipError> {
        let contract = self.writer(initiator);
        let execute_call = contract.executeSponsoredTransaction(sponsored_tx_hash, data);
        let receipt = self
            .bounded("executeSponsoredTransaction", execute_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;

        if !receipt.status() {
            return Err(SponsorshipError::ContractReverted(format!(
                "executeSponsoredTransaction reverted in {:?}",
                receipt.transaction_hash
            )));
        }
        Ok(ExecutionReceipt {
            execution_tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
        })
    }

    async fn add_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let contract = self.writer(sponsor);
        let fund_call = contract.addFunds().value(amount);
        let receipt = self
            .bounded("addFunds", fund_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;
        Ok(receipt.transaction_hash)
    }

    async fn withdraw_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let contract = self.writer(sponsor);
        let withdraw_call = contract.withdrawFunds(amount);
        let receipt = self
            .bounded("withdrawFunds", withdraw_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;
        Ok(receipt.transaction_hash)
    }

    async fn register_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
        deposit: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let contract = self.writer(owner);
        let add_call = contract.addSponsor(sponsor).value(deposit);
        let receipt = self
            .bounded("addSponsor", add_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;
        if !receipt.status() {
            return Err(SponsorshipError::ContractReverted(format!(
                "addSponsor reverted in {:?}",
                receipt.transaction_hash
            )));
        }
        Ok(receipt.transaction_hash)
    }

    async fn remove_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
    ) -> Result<TxHash, SponsorshipError> {
        let contract = self.writer(owner);
        let remove_call = contract.removeSponsor(sponsor);
        let receipt = self
            .bounded("removeSponsor", remove_call.send())
            .await?
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(receipt_error)?;
        if !receipt.status() {
            return Err(SponsorshipError::ContractReverted(format!(
                "removeSponsor reverted in {:?}",
                receipt.transaction_hash
            )));
        }
        Ok(receipt.transaction_hash)
    }
}
