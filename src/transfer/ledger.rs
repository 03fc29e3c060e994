// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfers on the internal NullNet ledger.

use alloy::primitives::U256;
use chrono::Utc;

use super::types::{TransferError, TransferResult, TransferStatus};
use crate::blockchain::transactions::format_amount;
use crate::blockchain::{Chain, TokenOnChain};
use crate::ledger::LedgerAccount;
use crate::models::KeyMaterial;

#[derive(Clone)]
pub struct LedgerTransferExecutor {
    ledger: LedgerAccount,
}

impl LedgerTransferExecutor {
    pub fn new(ledger: LedgerAccount) -> Self {
        Self { ledger }
    }

    pub fn execute(
        &self,
        chain: &Chain,
        token: &TokenOnChain,
        from: &str,
        to: &str,
        spend_key: &KeyMaterial,
        amount: U256,
    ) -> Result<TransferResult, TransferError> {
        self.ledger.authorize(from, spend_key.expose_secret())?;
        let transfer = self.ledger.transfer(from, to, &token.symbol, amount)?;

        Ok(TransferResult {
            success: true,
            chain_id: chain.id.clone(),
            token_symbol: transfer.ticker,
            from_address: transfer.from,
            to_address: transfer.to,
            amount: format_amount(transfer.amount, token.decimals),
            transaction_hash: None,
            ledger_transfer_id: Some(transfer.id),
            gas_sponsored: false,
            sponsorship_details: None,
            explorer_url: None,
            status: TransferStatus::Confirmed,
            created_at: Utc::now(),
        })
    }
}
