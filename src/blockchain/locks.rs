// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-address submission locks.
//!
//! Nonces are fetched from the node at send time. Holding the sender's lock
//! from nonce fetch until the node accepts the broadcast keeps two requests
//! from the same account from racing for one nonce inside this process.

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock key: one lock per `(chain, address)`.
type LockKey = (u64, Address);

#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, chain_id: u64, address: Address) -> Arc<Mutex<()>> {
        let entry = self
            .locks
            .entry((chain_id, address))
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    /// Wait for exclusive submission rights for `address` on `chain_id`.
    pub async fn acquire(&self, chain_id: u64, address: Address) -> OwnedMutexGuard<()> {
        self.lock_for(chain_id, address).lock_owned().await
    }
}
