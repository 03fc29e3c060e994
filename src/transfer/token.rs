// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 `transfer(address,uint256)` calls paid for by the sender.

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};

use super::evm::{EvmSubmitter, GasLimit};
use super::types::{TransferError, TransferResult};
use crate::blockchain::erc20::transfer_calldata;
use crate::blockchain::transactions::format_amount;
use crate::blockchain::{Chain, TokenOnChain};

#[derive(Clone)]
pub struct TokenTransferExecutor {
    submitter: EvmSubmitter,
}

impl TokenTransferExecutor {
    pub fn new(submitter: EvmSubmitter) -> Self {
        Self { submitter }
    }

    /// Call `transfer` on the token contract. `amount` is already scaled by
    /// the token's decimals.
    pub async fn execute(
        &self,
        chain: &Chain,
        token: &TokenOnChain,
        sender: &PrivateKeySigner,
        receiver: Address,
        amount: U256,
    ) -> Result<TransferResult, TransferError> {
        let contract = token.contract_address.ok_or_else(|| {
            TransferError::InvalidRequest(format!(
                "{} has no contract on {}",
                token.symbol, chain.id
            ))
        })?;

        let submitted = self
            .submitter
            .submit(
                chain,
                sender,
                contract,
                U256::ZERO,
                transfer_calldata(receiver, amount),
                GasLimit::Estimate,
            )
            .await
            .map_err(TransferError::chain(chain))?;

        let tx_hash = format!("{:?}", submitted.hash);
        tracing::info!(
            chain_id = %chain.id,
            token = %token.symbol,
            tx_hash = %tx_hash,
            gas_limit = submitted.gas_limit,
            "Token transfer broadcast"
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
