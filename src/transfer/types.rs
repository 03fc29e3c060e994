// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request, result and error types shared by the transfer executors.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::gas_sponsor::SponsorshipError;
use crate::blockchain::transactions::parse_amount;
use crate::blockchain::{Chain, ChainError, RegistryError, TokenClass, TokenOnChain};
use crate::ledger::LedgerError;
use crate::models::KeyMaterial;

/// How a request wants gas sponsorship applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SponsorshipMode {
    #[default]
    Off,
    /// Sponsor when the chain supports it, otherwise send a plain transfer.
    IfEligible,
    /// Sponsor or fail.
    Required,
}

/// One transfer, as accepted by [`TransferDispatcher::send_token`].
///
/// [`TransferDispatcher::send_token`]: super::TransferDispatcher::send_token
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    pub amount: String,
    pub receiver_address: String,
    pub token_symbol: String,
    pub sender_address: String,
    pub sender_secret: KeyMaterial,
    pub chain_id: String,
    pub sponsorship: SponsorshipMode,
    pub idempotency_key: Option<String>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Accepted by the node, not yet mined.
    Pending,
    /// Final: ledger transfers and executed sponsored calls.
    Confirmed,
}

/// Details of a sponsored transfer's two on-chain calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipDetails {
    pub contract_address: String,
    pub sponsor_address: String,
    pub sponsored_tx_hash: String,
    pub registration_tx_hash: String,
    pub execution_tx_hash: String,
    pub gas_limit: u64,
    /// Wei per gas declared at registration.
    pub gas_price: String,
    pub gas_used: u64,
    pub effective_gas_price: String,
    /// `gasLimit * gasPrice` at registration.
    pub estimated_cost: String,
}

/// Outcome of one transfer attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    pub chain_id: String,
    pub token_symbol: String,
    pub from_address: String,
    pub to_address: String,
    /// Decimal amount in token units.
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_transfer_id: Option<String>,
    pub gas_sponsored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsorship_details: Option<SponsorshipDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl TransferResult {
    /// Result of a broadcast EVM transaction.
    pub fn broadcast(
        chain: &Chain,
        token: &TokenOnChain,
        from: Address,
        to: Address,
        amount: String,
        tx_hash: String,
    ) -> Self {
        Self {
            success: true,
            chain_id: chain.id.clone(),
            token_symbol: token.symbol.clone(),
            from_address: format!("{from:?}"),
            to_address: format!("{to:?}"),
            amount,
            explorer_url: chain.tx_url(&tx_hash),
            transaction_hash: Some(tx_hash),
            ledger_transfer_id: None,
            gas_sponsored: false,
            sponsorship_details: None,
            status: TransferStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Phase of the sponsorship protocol an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorshipPhase {
    Preflight,
    Sponsor,
    Execute,
}

impl std::fmt::Display for SponsorshipPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Preflight => "pre-flight",
            Self::Sponsor => "registration",
            Self::Execute => "execution",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransferError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Gas sponsorship is not supported for native token {0}")]
    SponsorshipNotSupportedForNative(String),

    #[error("Gas sponsorship service is not available")]
    SponsorshipServiceUnavailable,

    #[error("{chain_id}: {source}")]
    Chain {
        chain_id: String,
        #[source]
        source: ChainError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{chain_id} sponsorship {phase} failed: {source}")]
    Sponsorship {
        chain_id: String,
        phase: SponsorshipPhase,
        /// Registered but unexecuted record a caller can retry against.
        pending_sponsored_tx_hash: Option<String>,
        #[source]
        source: SponsorshipError,
    },
}

impl TransferError {
    pub fn chain(chain: &Chain) -> impl FnOnce(ChainError) -> Self + '_ {
        move |source| Self::Chain {
            chain_id: chain.id.clone(),
            source,
        }
    }

    pub fn sponsorship(chain: &Chain, phase: SponsorshipPhase, source: SponsorshipError) -> Self {
        Self::Sponsorship {
            chain_id: chain.id.clone(),
            phase,
            pending_sponsored_tx_hash: None,
            source,
        }
    }
}

/// Which executor a `(chain, token)` pair is handled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRoute {
    Native,
    Erc20,
    Ledger,
}

impl TransferRoute {
    /// Routing depends only on the chain and the token's deployment on it.
    pub fn classify(chain: &Chain, token: &TokenOnChain) -> Self {
        if chain.is_ledger() {
            return Self::Ledger;
        }
        match (token.class, token.contract_address) {
            (TokenClass::Erc20, Some(_)) => Self::Erc20,
            _ => Self::Native,
        }
    }
}

/// Check that an amount is a positive decimal before anything else runs.
///
/// The exact scaling to base units happens once the token's decimals are
/// known; this only rejects values that no token could accept.
pub fn validate_amount_shape(amount: &str) -> Result<(), TransferError> {
    let amount = amount.trim();
    let fraction_len = amount.split_once('.').map_or(0, |(_, f)| f.len());
    let decimals = u8::try_from(fraction_len)
        .map_err(|_| TransferError::InvalidRequest(format!("amount `{amount}` is not valid")))?;
    let parsed = parse_amount(amount, decimals)
        .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
    if parsed.is_zero() {
        return Err(TransferError::InvalidRequest(
            "amount must be greater than zero".into(),
        ));
    }
    Ok(())
}
