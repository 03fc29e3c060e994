// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transfer Core
//!
//! Everything between a validated HTTP body and a broadcast transaction or
//! ledger mutation.
//!
//! ## Routing
//!
//! [`TransferDispatcher::send_token`] resolves the `(chain, token)` pair and
//! picks one path:
//!
//! | Chain | Token | Path |
//! |-------|-------|------|
//! | `nullnet` | any | [`LedgerTransferExecutor`] |
//! | EVM | native | [`NativeTransferExecutor`] |
//! | EVM | ERC-20 | [`TokenTransferExecutor`], or [`GasSponsorshipCoordinator`] when sponsored |
//!
//! ## Nonces
//!
//! All EVM submissions go through [`EvmSubmitter`], which holds the sender's
//! per-address lock from nonce read to broadcast.

pub mod dispatcher;
pub mod evm;
pub mod ledger;
pub mod native;
pub mod sponsorship;
pub mod token;
pub mod types;

pub use dispatcher::TransferDispatcher;
pub use evm::EvmSubmitter;
pub use ledger::LedgerTransferExecutor;
pub use native::NativeTransferExecutor;
pub use sponsorship::{GasSponsorshipCoordinator, SponsoredTransfer, SponsorshipJournal};
pub use token::TokenTransferExecutor;
pub use types::*;
