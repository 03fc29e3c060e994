// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single entry point for every transfer.
//!
//! The dispatcher validates the request, resolves the chain and token
//! through the [`ChainRegistry`], and hands the transfer to exactly one of
//! the native, ERC-20, ledger or sponsored paths. Nothing touches a chain
//! or the ledger until validation has passed.

use std::sync::Arc;

use alloy::{primitives::Address, signers::local::PrivateKeySigner};

use super::ledger::LedgerTransferExecutor;
use super::native::NativeTransferExecutor;
use super::sponsorship::{GasSponsorshipCoordinator, SponsoredTransfer};
use super::token::TokenTransferExecutor;
use super::types::{
    validate_amount_shape, SponsorshipMode, TransferError, TransferRequest, TransferResult,
    TransferRoute,
};
use crate::blockchain::signing::{parse_address, signer_from_key_material};
use crate::blockchain::transactions::parse_amount;
use crate::blockchain::{Chain, ChainRegistry};

pub struct TransferDispatcher {
    registry: Arc<ChainRegistry>,
    native: NativeTransferExecutor,
    token: TokenTransferExecutor,
    ledger: LedgerTransferExecutor,
    sponsorship: Option<Arc<GasSponsorshipCoordinator>>,
}

impl TransferDispatcher {
    pub fn new(
        registry: Arc<ChainRegistry>,
        native: NativeTransferExecutor,
        token: TokenTransferExecutor,
        ledger: LedgerTransferExecutor,
        sponsorship: Option<Arc<GasSponsorshipCoordinator>>,
    ) -> Self {
        Self {
            registry,
            native,
            token,
            ledger,
            sponsorship,
        }
    }

    /// Whether a sponsored transfer could be attempted on `chain_id`.
    pub fn sponsorship_eligible(&self, chain_id: &str) -> bool {
        self.sponsorship
            .as_ref()
            .is_some_and(|coordinator| coordinator.supports(chain_id))
    }

    pub async fn send_token(&self, request: TransferRequest) -> Result<TransferResult, TransferError> {
        validate_fields(&request)?;
        validate_amount_shape(&request.amount)?;

        let (chain, token) = self
            .registry
            .validate_chain_and_token(&request.chain_id, &request.token_symbol)?;
        let amount = parse_amount(&request.amount, token.decimals)
            .map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        let route = TransferRoute::classify(chain, &token);

        tracing::debug!(
            chain_id = %chain.id,
            token = %token.symbol,
            route = ?route,
            sponsorship = ?request.sponsorship,
            "Dispatching transfer"
        );

        match route {
            TransferRoute::Ledger => {
                if request.sponsorship == SponsorshipMode::Required {
                    return Err(TransferError::InvalidRequest(
                        "gas sponsorship does not apply to ledger transfers".into(),
                    ));
                }
                self.ledger.execute(
                    chain,
                    &token,
                    request.sender_address.trim(),
                    request.receiver_address.trim(),
                    &request.sender_secret,
                    amount,
                )
            }
            TransferRoute::Native => {
                if request.sponsorship != SponsorshipMode::Off {
                    return Err(TransferError::SponsorshipNotSupportedForNative(token.symbol));
                }
                let (signer, receiver) = evm_parties(&request)?;
                self.native
                    .execute(chain, &token, &signer, receiver, amount)
                    .await
            }
            TransferRoute::Erc20 => {
                let (signer, receiver) = evm_parties(&request)?;
                match self.sponsorship_target(chain, request.sponsorship)? {
                    Some(coordinator) => {
                        coordinator
                            .sponsor_transfer(SponsoredTransfer {
                                chain,
                                token: &token,
                                initiator: &signer,
                                receiver,
                                amount,
                                gas_limit: request.gas_limit,
                                gas_price: request.gas_price,
                                idempotency_key: request.idempotency_key.as_deref(),
                            })
                            .await
                    }
                    None => {
                        self.token
                            .execute(chain, &token, &signer, receiver, amount)
                            .await
                    }
                }
            }
        }
    }

    /// The coordinator to use for an ERC-20 transfer, or `None` for a plain
    /// transfer paid by the sender.
    fn sponsorship_target(
        &self,
        chain: &Chain,
        mode: SponsorshipMode,
    ) -> Result<Option<&GasSponsorshipCoordinator>, TransferError> {
        match mode {
            SponsorshipMode::Off => Ok(None),
            SponsorshipMode::Required => self
                .sponsorship
                .as_deref()
                .map(Some)
                .ok_or(TransferError::SponsorshipServiceUnavailable),
            SponsorshipMode::IfEligible => match self.sponsorship.as_deref() {
                Some(coordinator) if coordinator.supports(&chain.id) => Ok(Some(coordinator)),
                _ => {
                    tracing::warn!(
                        chain_id = %chain.id,
                        "Gas sponsorship unavailable, sending as a regular token transfer"
                    );
                    Ok(None)
                }
            },
        }
    }
}

fn validate_fields(request: &TransferRequest) -> Result<(), TransferError> {
    let required = [
        ("amount", request.amount.as_str()),
        ("receiverWalletAddress", request.receiver_address.as_str()),
        ("tokenToSend", request.token_symbol.as_str()),
        ("senderWalletAddress", request.sender_address.as_str()),
        ("chainId", request.chain_id.as_str()),
    ];
    if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(TransferError::InvalidRequest(format!("{name} is required")));
    }
    if request.sender_secret.is_blank() {
        return Err(TransferError::InvalidRequest(
            "senderPrivateKey is required".into(),
        ));
    }
    Ok(())
}

/// Parse both EVM addresses and check that the key controls the sender.
fn evm_parties(request: &TransferRequest) -> Result<(PrivateKeySigner, Address), TransferError> {
    let invalid = |e: crate::blockchain::ChainError| TransferError::InvalidRequest(e.to_string());
    let sender = parse_address(&request.sender_address).map_err(invalid)?;
    let receiver = parse_address(&request.receiver_address).map_err(invalid)?;
    let signer = signer_from_key_material(request.sender_secret.expose_secret()).map_err(invalid)?;
    if signer.address() != sender {
        return Err(TransferError::InvalidRequest(
            "senderPrivateKey does not belong to senderWalletAddress".into(),
        ));
    }
    Ok((signer, receiver))
}
