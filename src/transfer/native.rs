// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plain value transfers of a chain's native currency.

use alloy::{
    primitives::{Address, Bytes, U256},
    signers::local::PrivateKeySigner,
};

use super::evm::{EvmSubmitter, GasLimit};
use super::types::{TransferError, TransferResult};
use crate::blockchain::transactions::{format_amount, NATIVE_TRANSFER_GAS_LIMIT};
use crate::blockchain::{Chain, TokenOnChain};

#[derive(Clone)]
pub struct NativeTransferExecutor {
    submitter: EvmSubmitter,
}

impl NativeTransferExecutor {
    pub fn new(submitter: EvmSubmitter) -> Self {
        Self { submitter }
    }

    /// Send `amount` base units to `receiver`. Returns once the node has
    /// accepted the transaction; confirmation is not awaited.
    pub async fn execute(
        &self,
        chain: &Chain,
        token: &TokenOnChain,
        sender: &PrivateKeySigner,
        receiver: Address,
        amount: U256,
    ) -> Result<TransferResult, TransferError> {
        let submitted = self
            .submitter
            .submit(
                chain,
                sender,
                receiver,
                amount,
                Bytes::new(),
                GasLimit::Fixed(NATIVE_TRANSFER_GAS_LIMIT),
            )
            .await
            .map_err(TransferError::chain(chain))?;

        let tx_hash = format!("{:?}", submitted.hash);
        tracing::info!(
            chain_id = %chain.id,
            token = %token.symbol,
            tx_hash = %tx_hash,
            nonce = submitted.nonce,
            "Native transfer broadcast"
        );

        Ok(TransferResult::broadcast(
            chain,
            token,
            sender.address(),
            receiver,
            format_amount(amount, token.decimals),
            tx_hash,
        ))
    }
}
