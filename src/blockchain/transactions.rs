// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction building and signing for EVM transfers.
//!
//! Transfers are built explicitly (nonce, fees and gas limit are set by the
//! caller), signed locally and handed to [`ChainRpc::send_raw_transaction`]
//! as a raw EIP-2718 envelope.
//!
//! [`ChainRpc::send_raw_transaction`]: super::client::ChainRpc::send_raw_transaction

use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};

use super::client::ChainError;

/// Gas limit for a plain value transfer.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Gas limit used for ERC-20 calls when no estimate is available.
pub const DEFAULT_TOKEN_TRANSFER_GAS_LIMIT: u64 = 100_000;

/// Headroom added on top of `eth_estimateGas` for token transfers.
pub const GAS_ESTIMATE_HEADROOM_PERCENT: u64 = 20;

/// Priority fee used when the node does not answer `eth_maxPriorityFeePerGas`.
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_500_000_000;

/// Fee parameters for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    /// Chains without a base fee (e.g. Flow EVM).
    Legacy { gas_price: u128 },
}

impl FeeParams {
    /// EIP-1559 fees from a base fee: `max = 2 * base + priority`.
    pub fn from_base_fee(base_fee: u128, priority_fee: u128) -> Self {
        Self::Eip1559 {
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        }
    }

    /// Upper bound of the price paid per unit of gas.
    pub fn max_price_per_gas(&self) -> u128 {
        match self {
            Self::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            Self::Legacy { gas_price } => *gas_price,
        }
    }

    fn apply(self, request: TransactionRequest) -> TransactionRequest {
        match self {
            Self::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => request
                .with_max_fee_per_gas(max_fee_per_gas)
                .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
            Self::Legacy { gas_price } => request.with_gas_price(gas_price),
        }
    }
}

/// A fully specified transfer, ready to sign.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub fees: FeeParams,
}

impl UnsignedTransfer {
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.input.clone())
            .with_nonce(self.nonce)
            .with_chain_id(self.chain_id)
            .with_gas_limit(self.gas_limit);
        self.fees.apply(request)
    }
}

/// A signed transaction and the fields callers report back.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub raw: Bytes,
}

/// Sign a transfer with the sender's key.
pub async fn sign_transfer(
    transfer: UnsignedTransfer,
    signer: &PrivateKeySigner,
) -> Result<SignedTransfer, ChainError> {
    let from = signer.address();
    let wallet = EthereumWallet::from(signer.clone());
    let envelope = transfer
        .to_request(from)
        .build(&wallet)
        .await
        .map_err(|e| ChainError::Signing(e.to_string()))?;

    Ok(SignedTransfer {
        hash: *envelope.tx_hash(),
        from,
        to: transfer.to,
        value: transfer.value,
        input: transfer.input,
        nonce: transfer.nonce,
        gas_limit: transfer.gas_limit,
        raw: envelope.encoded_2718().into(),
    })
}

/// Apply [`GAS_ESTIMATE_HEADROOM_PERCENT`] to a gas estimate.
pub fn with_headroom(estimate: u64) -> u64 {
    estimate
        .saturating_mul(100 + GAS_ESTIMATE_HEADROOM_PERCENT)
        .div_ceil(100)
}

// =============================================================================
// Amounts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount `{0}` is not a decimal number")]
    NotNumeric(String),

    #[error("too many decimal places (max {0})")]
    TooManyDecimals(u8),

    #[error("amount overflows 256 bits")]
    Overflow,
}

/// Parse a human-readable amount to base units (wei or token units).
///
/// Accepts `123`, `1.5` and `.5`. Signs, exponents and separators are rejected.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }
    let not_numeric = || AmountError::NotNumeric(amount.to_string());

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(not_numeric());
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(not_numeric());
    }
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals(decimals));
    }

    let parse = |digits: &str| -> Result<U256, AmountError> {
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }
        U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow)
    };
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let multiplier = U256::from(10u64).pow(U256::from(decimals));

    let whole = parse(whole)?;
    let fraction = parse(&padded)?;
    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(AmountError::Overflow)
}

/// Format base units as a human-readable amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
    }
}
