// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger account service: validation, spend credentials and logging on top
//! of a [`LedgerStore`].
//!
//! Accounts opened through [`LedgerAccount::open_account`] receive a random
//! spend key. Only `HMAC-SHA256(pepper, key)` is stored, and debits from such
//! an account require the key. Accounts that came into existence by being
//! credited carry no credential.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::primitives::U256;
use hmac::{Hmac, Mac};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use sha2::Sha256;
use uuid::Uuid;

use super::address::{generate_address, normalize_ticker, validate_address};
use super::store::LedgerStore;
use super::{LedgerError, LedgerResult};

type HmacSha256 = Hmac<Sha256>;

/// Attempts before giving up on finding an unused generated address.
const OPEN_ACCOUNT_ATTEMPTS: usize = 5;

/// A freshly opened account. `spend_key` is shown exactly once.
#[derive(Clone)]
pub struct OpenedAccount {
    pub address: String,
    pub spend_key: String,
}

impl std::fmt::Debug for OpenedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedAccount")
            .field("address", &self.address)
            .field("spend_key", &"<redacted>")
            .finish()
    }
}

/// Receipt of a completed ledger transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransfer {
    pub id: String,
    pub from: String,
    pub to: String,
    pub ticker: String,
    pub amount: U256,
}

#[derive(Clone)]
pub struct LedgerAccount {
    store: Arc<dyn LedgerStore>,
    pepper: Arc<[u8]>,
}

impl LedgerAccount {
    pub fn new(store: Arc<dyn LedgerStore>, pepper: &[u8]) -> Self {
        Self {
            store,
            pepper: Arc::from(pepper),
        }
    }

    fn mac(&self) -> LedgerResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.pepper)
            .map_err(|e| LedgerError::Storage(format!("invalid credential pepper: {e}")))
    }

    /// Create an account with a fresh address and spend key.
    pub fn open_account(&self) -> LedgerResult<OpenedAccount> {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let spend_key = alloy::hex::encode(key);

        let mut mac = self.mac()?;
        mac.update(spend_key.as_bytes());
        let credential = mac.finalize().into_bytes();

        for _ in 0..OPEN_ACCOUNT_ATTEMPTS {
            let address = generate_address();
            match self.store.create_account(&address, &credential) {
                Ok(()) => {
                    tracing::info!(address = %address, "Opened ledger account");
                    return Ok(OpenedAccount { address, spend_key });
                }
                Err(LedgerError::AccountExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::Storage(
            "could not allocate an unused ledger address".into(),
        ))
    }

    /// Check a spend key against the account's credential.
    ///
    /// Accounts without a credential authenticate by address possession.
    pub fn authorize(&self, address: &str, spend_key: &str) -> LedgerResult<()> {
        validate_address(address)?;
        let Some(credential) = self.store.credential(address)? else {
            tracing::debug!(address = %address, "Ledger account has no credential");
            return Ok(());
        };
        let mut mac = self.mac()?;
        mac.update(spend_key.trim().as_bytes());
        mac.verify_slice(&credential)
            .map_err(|_| LedgerError::Unauthorized(address.to_string()))
    }

    pub fn get_balance(&self, address: &str, ticker: &str) -> LedgerResult<U256> {
        validate_address(address)?;
        let ticker = normalize_ticker(ticker)?;
        self.store.balance(address, &ticker)
    }

    /// Non-zero balances of an account, keyed by ticker.
    pub fn list_balances(&self, address: &str) -> LedgerResult<BTreeMap<String, U256>> {
        validate_address(address)?;
        let mut balances = self.store.balances(address)?;
        balances.retain(|_, amount| !amount.is_zero());
        Ok(balances)
    }

    pub fn credit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        validate_address(address)?;
        let ticker = normalize_ticker(ticker)?;
        ensure_positive(amount)?;
        let balance = self.store.credit(address, &ticker, amount)?;
        tracing::info!(address = %address, ticker = %ticker, amount = %amount, "Ledger credit");
        Ok(balance)
    }

    pub fn debit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        validate_address(address)?;
        let ticker = normalize_ticker(ticker)?;
        ensure_positive(amount)?;
        let balance = self.store.debit(address, &ticker, amount)?;
        tracing::info!(address = %address, ticker = %ticker, amount = %amount, "Ledger debit");
        Ok(balance)
    }

    /// Move `amount` of `ticker` from one account to another atomically.
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        ticker: &str,
        amount: U256,
    ) -> LedgerResult<LedgerTransfer> {
        validate_address(from)?;
        validate_address(to)?;
        let ticker = normalize_ticker(ticker)?;
        ensure_positive(amount)?;
        if from == to {
            return Err(LedgerError::InvalidAmount(
                "sender and receiver are the same account".into(),
            ));
        }

        self.store.transfer(from, to, &ticker, amount)?;

        let id = format!("nullnet_{}", Uuid::new_v4().simple());
        tracing::info!(
            transfer_id = %id,
            from = %from,
            to = %to,
            ticker = %ticker,
            amount = %amount,
            "Ledger transfer completed"
        );
        Ok(LedgerTransfer {
            id,
            from: from.to_string(),
            to: to.to_string(),
            ticker,
            amount,
        })
    }

    pub fn total_supply(&self, ticker: &str) -> LedgerResult<U256> {
        self.store.total_supply(&normalize_ticker(ticker)?)
    }
}

fn ensure_positive(amount: U256) -> LedgerResult<()> {
    if amount.is_zero() {
        Err(LedgerError::InvalidAmount("amount must be greater than zero".into()))
    } else {
        Ok(())
    }
}
