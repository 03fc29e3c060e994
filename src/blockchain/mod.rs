// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM chain integrations and the chain/token registry.

pub mod client;
pub mod erc20;
pub mod explorer;
pub mod gas_sponsor;
pub mod locks;
pub mod registry;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{AlloyChainRpc, ChainError, ChainRpc, TxReceipt};
pub use registry::{ChainRegistry, RegistryError, RegistryOverrides};
pub use types::*;
