// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger storage trait and the in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::U256;

use super::{LedgerError, LedgerResult};

/// Storage for ledger balances and account credentials.
///
/// Implementations apply every mutating call atomically: a failed call
/// leaves no partial effect, and concurrent calls touching the same
/// account serialize. Inputs are assumed validated by the caller.
pub trait LedgerStore: Send + Sync {
    /// Balance in base units, zero if the account or ticker is absent.
    fn balance(&self, address: &str, ticker: &str) -> LedgerResult<U256>;

    /// Every ticker entry for an account.
    fn balances(&self, address: &str) -> LedgerResult<BTreeMap<String, U256>>;

    /// Increase a balance, returning the new value.
    fn credit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256>;

    /// Decrease a balance, returning the new value.
    /// Fails with `InsufficientBalance` when the balance is below `amount`.
    fn debit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256>;

    /// Debit `from` and credit `to` as one unit.
    fn transfer(&self, from: &str, to: &str, ticker: &str, amount: U256) -> LedgerResult<()>;

    /// Stored spend credential (MAC of the spend key), if any.
    fn credential(&self, address: &str) -> LedgerResult<Option<Vec<u8>>>;

    /// Register a new account. Fails with `AccountExists` if the address
    /// already has a credential or any balance entry.
    fn create_account(&self, address: &str, credential: &[u8]) -> LedgerResult<()>;

    /// Sum of one ticker across all accounts.
    fn total_supply(&self, ticker: &str) -> LedgerResult<U256>;
}

pub(crate) fn insufficient(address: &str, ticker: &str, available: U256, requested: U256) -> LedgerError {
    LedgerError::InsufficientBalance {
        address: address.to_string(),
        ticker: ticker.to_string(),
        available: available.to_string(),
        requested: requested.to_string(),
    }
}

pub(crate) fn overflow() -> LedgerError {
    LedgerError::InvalidAmount("balance overflow".into())
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, BTreeMap<String, U256>>,
    credentials: HashMap<String, Vec<u8>>,
}

impl LedgerState {
    fn get(&self, address: &str, ticker: &str) -> U256 {
        self.balances
            .get(address)
            .and_then(|b| b.get(ticker))
            .copied()
            .unwrap_or_default()
    }

    fn set(&mut self, address: &str, ticker: &str, amount: U256) {
        self.balances
            .entry(address.to_string())
            .or_default()
            .insert(ticker.to_string(), amount);
    }
}

/// Process-local ledger. One lock guards the whole state, so every
/// mutation (including two-account transfers) is a single critical section.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".into()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn balance(&self, address: &str, ticker: &str) -> LedgerResult<U256> {
        Ok(self.lock()?.get(address, ticker))
    }

    fn balances(&self, address: &str) -> LedgerResult<BTreeMap<String, U256>> {
        Ok(self.lock()?.balances.get(address).cloned().unwrap_or_default())
    }

    fn credit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        let mut state = self.lock()?;
        let updated = state
            .get(address, ticker)
            .checked_add(amount)
            .ok_or_else(overflow)?;
        state.set(address, ticker, updated);
        Ok(updated)
    }

    fn debit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        let mut state = self.lock()?;
        let current = state.get(address, ticker);
        let updated = current
            .checked_sub(amount)
            .ok_or_else(|| insufficient(address, ticker, current, amount))?;
        state.set(address, ticker, updated);
        Ok(updated)
    }

    fn transfer(&self, from: &str, to: &str, ticker: &str, amount: U256) -> LedgerResult<()> {
        let mut state = self.lock()?;
        let from_balance = state.get(from, ticker);
        let debited = from_balance
            .checked_sub(amount)
            .ok_or_else(|| insufficient(from, ticker, from_balance, amount))?;
        if from == to {
            return Ok(());
        }
        let credited = state
            .get(to, ticker)
            .checked_add(amount)
            .ok_or_else(overflow)?;
        // Both values are computed before either write.
        state.set(from, ticker, debited);
        state.set(to, ticker, credited);
        Ok(())
    }

    fn credential(&self, address: &str) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.lock()?.credentials.get(address).cloned())
    }

    fn create_account(&self, address: &str, credential: &[u8]) -> LedgerResult<()> {
        let mut state = self.lock()?;
        if state.credentials.contains_key(address) || state.balances.contains_key(address) {
            return Err(LedgerError::AccountExists(address.to_string()));
        }
        state
            .credentials
            .insert(address.to_string(), credential.to_vec());
        state.balances.insert(address.to_string(), BTreeMap::new());
        Ok(())
    }

    fn total_supply(&self, ticker: &str) -> LedgerResult<U256> {
        let state = self.lock()?;
        state
            .balances
            .values()
            .filter_map(|b| b.get(ticker))
            .try_fold(U256::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or_else(overflow)
    }
}
