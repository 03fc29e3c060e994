// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Nonce, fee and broadcast plumbing shared by the native and token executors.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    signers::local::PrivateKeySigner,
};

use crate::blockchain::locks::AccountLocks;
use crate::blockchain::transactions::{
    sign_transfer, with_headroom, UnsignedTransfer, DEFAULT_TOKEN_TRANSFER_GAS_LIMIT,
};
use crate::blockchain::{Chain, ChainError, ChainRpc};

/// How the gas limit of a submission is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasLimit {
    Fixed(u64),
    /// `eth_estimateGas` plus headroom. A revert during estimation fails the
    /// submission before anything is signed.
    Estimate,
}

/// A transaction accepted by the node.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub hash: TxHash,
    pub nonce: u64,
    pub gas_limit: u64,
}

#[derive(Clone)]
pub struct EvmSubmitter {
    rpc: Arc<dyn ChainRpc>,
    locks: AccountLocks,
}

impl EvmSubmitter {
    pub fn new(rpc: Arc<dyn ChainRpc>, locks: AccountLocks) -> Self {
        Self { rpc, locks }
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    /// Sign and broadcast one transaction from `signer`.
    ///
    /// The sender's lock is held from the nonce read until the node has
    /// accepted the raw transaction.
    pub async fn submit(
        &self,
        chain: &Chain,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
        input: Bytes,
        gas: GasLimit,
    ) -> Result<Submitted, ChainError> {
        let from = signer.address();
        let _guard = self.locks.acquire(chain.numeric_chain_id, from).await;

        let nonce = self.rpc.pending_nonce(chain, from).await?;
        let fees = self.rpc.fee_params(chain).await?;
        tracing::debug!(chain_id = %chain.id, nonce, fees = ?fees, "Selected transaction fees");

        let mut unsigned = UnsignedTransfer {
            chain_id: chain.numeric_chain_id,
            nonce,
            to,
            value,
            input,
            gas_limit: DEFAULT_TOKEN_TRANSFER_GAS_LIMIT,
            fees,
        };
        unsigned.gas_limit = match gas {
            GasLimit::Fixed(limit) => limit,
            GasLimit::Estimate => {
                let estimate = self
                    .rpc
                    .estimate_gas(chain, unsigned.to_request(from))
                    .await?;
                with_headroom(estimate)
            }
        };
        let gas_limit = unsigned.gas_limit;

        let signed = sign_transfer(unsigned, signer).await?;
        let hash = self.rpc.send_raw_transaction(chain, &signed).await?;

        Ok(Submitted {
            hash,
            nonce,
            gas_limit,
        })
    }
}
