// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Bodies are camelCase JSON;
//! all types derive `ToSchema` for the OpenAPI document.
//!
//! ## Secrets
//!
//! [`KeyMaterial`] wraps the sender's private key (or ledger spend key). Its
//! `Debug` output is redacted and it is never serialized back out.
//!
//! ## Model Categories
//!
//! - **Transfers**: `/wallet/send-token` and `/wallet/send-token-sponsored`
//! - **Balances & chains**: read-only registry and balance views
//! - **Ledger**: NullNet account management

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{TokenClass, TxReceipt};

// =============================================================================
// Secrets and amounts
// =============================================================================

/// Private key or ledger spend key supplied with a transfer.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Amount given either as a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    /// Decimal string form. Numbers in exponent notation are passed through
    /// unchanged and rejected by amount parsing.
    pub fn normalized(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl Default for AmountInput {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

// =============================================================================
// Transfers
// =============================================================================

/// Body of `POST /wallet/send-token` and `POST /wallet/send-token-sponsored`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTokenRequest {
    /// Human-readable amount, e.g. `"1.5"` or `1.5`.
    #[serde(default)]
    #[schema(value_type = String, example = "1.5")]
    pub amount: AmountInput,
    #[serde(default)]
    pub receiver_wallet_address: String,
    /// Token symbol, e.g. `USDC`.
    #[serde(default)]
    pub token_to_send: String,
    #[serde(default)]
    pub sender_wallet_address: String,
    /// Hex or PEM private key; the ledger spend key on `nullnet`.
    #[serde(default)]
    #[schema(value_type = String, format = Password)]
    pub sender_private_key: KeyMaterial,
    /// Registry id (`flowTestnet`) or numeric chain id (`545`).
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub use_gas_sponsorship: bool,
    /// Scopes a sponsored transfer so retries resume instead of re-registering.
    pub idempotency_key: Option<String>,
    /// Gas limit for the sponsored call (default 100000).
    pub gas_limit: Option<u64>,
    /// Gas price in wei for the sponsored call (default from fee data).
    #[schema(value_type = Option<String>)]
    pub gas_price: Option<String>,
}

/// Status of a broadcast transaction.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusResponse {
    pub chain_id: String,
    pub tx_hash: String,
    /// `pending`, `confirmed` or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TxReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

// =============================================================================
// Chains
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub id: String,
    pub display_name: String,
    /// `mainnet` or `testnet`.
    pub network: String,
    pub numeric_chain_id: u64,
    pub native_symbol: String,
    pub native_decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub is_ledger: bool,
    pub gas_sponsorship: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub symbol: String,
    pub class: TokenClass,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

// =============================================================================
// Ledger
// =============================================================================

/// Response of `POST /ledger/accounts`. The spend key is shown only here.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenAccountResponse {
    pub address: String,
    pub spend_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBalancesResponse {
    pub address: String,
    /// Ticker to decimal amount.
    pub balances: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    pub ticker: String,
    #[schema(value_type = String, example = "100")]
    pub amount: AmountInput,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
    pub address: String,
    pub ticker: String,
    pub balance: String,
}

// =============================================================================
// Sponsorship administration
// =============================================================================

/// Body of the sponsor top-up and withdrawal routes. Amount in native units.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorFundsRequest {
    #[schema(value_type = String, example = "0.5")]
    pub amount: AmountInput,
}

/// Sponsor escrow and contract ceilings on one chain. Amounts in wei.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorStatusResponse {
    pub chain_id: String,
    pub contract_address: String,
    pub sponsor_address: String,
    pub is_active: bool,
    pub balance: String,
    /// Escrow balance in native units.
    pub balance_formatted: String,
    pub total_sponsored: String,
    pub last_sponsored: String,
    pub min_sponsor_balance: String,
    pub max_gas_price: String,
    pub max_gas_limit: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorFundsResponse {
    pub chain_id: String,
    pub tx_hash: String,
    pub amount: String,
}

/// Body of the sponsor enrolment route. Deposit in native units.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSponsorRequest {
    #[schema(example = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8")]
    pub sponsor_address: String,
    #[schema(value_type = String, example = "0.1")]
    pub amount: AmountInput,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorMembershipResponse {
    pub chain_id: String,
    pub sponsor_address: String,
    pub tx_hash: String,
    pub is_active: bool,
}
