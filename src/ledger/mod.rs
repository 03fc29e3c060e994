// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NullNet: the internal, non-EVM account ledger.
//!
//! Accounts are keyed by a `null_` address and hold a balance per asset
//! ticker, stored in base units. All mutations go through a [`LedgerStore`],
//! which applies each debit, credit or transfer atomically.
//!
//! ## Modules
//!
//! - `address`: address format and generation
//! - `store`: storage trait and the in-memory implementation
//! - `redb_store`: durable implementation backed by redb
//! - `account`: validation, credentials and logging on top of a store

pub mod account;
pub mod address;
pub mod redb_store;
pub mod store;

pub use account::{LedgerAccount, LedgerTransfer, OpenedAccount};
pub use redb_store::RedbLedgerStore;
pub use store::{InMemoryLedgerStore, LedgerStore};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid NullNet address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid asset ticker: {0}")]
    InvalidTicker(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient {ticker} balance on {address}: available {available}, requested {requested}")]
    InsufficientBalance {
        address: String,
        ticker: String,
        available: String,
        requested: String,
    },

    #[error("Ledger authorization failed for {0}")]
    Unauthorized(String),

    #[error("Ledger account already exists: {0}")]
    AccountExists(String),

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

macro_rules! storage_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for LedgerError {
                fn from(e: $source) -> Self {
                    Self::Storage(e.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
