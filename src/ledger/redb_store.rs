// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable ledger store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `ledger_balances`: `address|TICKER` → 32-byte big-endian base-unit amount
//! - `ledger_credentials`: address → spend-key MAC
//!
//! redb allows one write transaction at a time, so every mutation is
//! serialized and a transfer's debit and credit commit together.

use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::U256;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::store::{insufficient, overflow, LedgerStore};
use super::{LedgerError, LedgerResult};

// =============================================================================
// Table Definitions
// =============================================================================

const BALANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger_balances");

const CREDENTIALS: TableDefinition<&str, &[u8]> = TableDefinition::new("ledger_credentials");

/// `|` sorts directly before `}`, which bounds a prefix scan.
fn balance_key(address: &str, ticker: &str) -> String {
    format!("{address}|{ticker}")
}

fn prefix_range(address: &str) -> (String, String) {
    (format!("{address}|"), format!("{address}}}"))
}

fn read_amount<T>(table: &T, key: &str) -> LedgerResult<U256>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(table
        .get(key)?
        .map(|guard| U256::from_be_slice(guard.value()))
        .unwrap_or_default())
}

// =============================================================================
// RedbLedgerStore
// =============================================================================

pub struct RedbLedgerStore {
    db: Database,
}

impl RedbLedgerStore {
    /// Open (or create) the ledger database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BALANCES)?;
            let _ = write_txn.open_table(CREDENTIALS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl LedgerStore for RedbLedgerStore {
    fn balance(&self, address: &str, ticker: &str) -> LedgerResult<U256> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES)?;
        read_amount(&table, &balance_key(address, ticker))
    }

    fn balances(&self, address: &str) -> LedgerResult<BTreeMap<String, U256>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES)?;
        let (start, end) = prefix_range(address);

        let mut balances = BTreeMap::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, value) = entry?;
            if let Some((_, ticker)) = key.value().split_once('|') {
                balances.insert(ticker.to_string(), U256::from_be_slice(value.value()));
            }
        }
        Ok(balances)
    }

    fn credit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        let key = balance_key(address, ticker);
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(BALANCES)?;
            let updated = read_amount(&table, &key)?
                .checked_add(amount)
                .ok_or_else(overflow)?;
            table.insert(key.as_str(), updated.to_be_bytes::<32>().as_slice())?;
            updated
        };
        write_txn.commit()?;
        Ok(updated)
    }

    fn debit(&self, address: &str, ticker: &str, amount: U256) -> LedgerResult<U256> {
        let key = balance_key(address, ticker);
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(BALANCES)?;
            let current = read_amount(&table, &key)?;
            let updated = current
                .checked_sub(amount)
                .ok_or_else(|| insufficient(address, ticker, current, amount))?;
            table.insert(key.as_str(), updated.to_be_bytes::<32>().as_slice())?;
            updated
        };
        write_txn.commit()?;
        Ok(updated)
    }

    fn transfer(&self, from: &str, to: &str, ticker: &str, amount: U256) -> LedgerResult<()> {
        let from_key = balance_key(from, ticker);
        let to_key = balance_key(to, ticker);
        // Returning early drops the write transaction, which aborts it.
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BALANCES)?;
            let current = read_amount(&table, &from_key)?;
            let debited = current
                .checked_sub(amount)
                .ok_or_else(|| insufficient(from, ticker, current, amount))?;
            table.insert(from_key.as_str(), debited.to_be_bytes::<32>().as_slice())?;

            let credited = read_amount(&table, &to_key)?
                .checked_add(amount)
                .ok_or_else(overflow)?;
            table.insert(to_key.as_str(), credited.to_be_bytes::<32>().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn credential(&self, address: &str) -> LedgerResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        let credential = table.get(address)?.map(|guard| guard.value().to_vec());
        Ok(credential)
    }

    fn create_account(&self, address: &str, credential: &[u8]) -> LedgerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut credentials = write_txn.open_table(CREDENTIALS)?;
            let balances = write_txn.open_table(BALANCES)?;
            let (start, end) = prefix_range(address);
            let has_balances = balances.range(start.as_str()..end.as_str())?.next().is_some();
            if credentials.get(address)?.is_some() || has_balances {
                return Err(LedgerError::AccountExists(address.to_string()));
            }
            credentials.insert(address, credential)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn total_supply(&self, ticker: &str) -> LedgerResult<U256> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BALANCES)?;
        let suffix = format!("|{ticker}");

        let mut total = U256::ZERO;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if key.value().ends_with(&suffix) {
                total = total
                    .checked_add(U256::from_be_slice(value.value()))
                    .ok_or_else(overflow)?;
            }
        }
        Ok(total)
    }
}
