// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NullWallet Transfer Service - multi-chain custodial token transfers
//!
//! Accepts transfer requests for EVM chains and the NullNet ledger, routes
//! each one to a native, ERC-20, ledger or gas-sponsored execution path, and
//! reports balances and transaction status.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `balances` - Native and token balance reads with retry and explorer fallback
//! - `blockchain` - Chain registry, RPC client, signing and the sponsorship contract
//! - `ledger` - NullNet internal ledger (redb)
//! - `transfer` - Request validation, routing and execution

pub mod api;
pub mod balances;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod state;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;
