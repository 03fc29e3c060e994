// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer submission and transaction status endpoints.

use alloy::primitives::TxHash;
use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::{ApiError, ApiJson},
    models::{ApiResponse, SendTokenRequest, TransactionStatusResponse},
    state::AppState,
    transfer::{SponsorshipMode, TransferError, TransferRequest, TransferResult},
};

fn into_transfer(
    request: SendTokenRequest,
    sponsorship: SponsorshipMode,
) -> Result<TransferRequest, ApiError> {
    let gas_price = request
        .gas_price
        .as_deref()
        .map(str::trim)
        .map(|raw| {
            raw.parse::<u128>()
                .map_err(|_| ApiError::bad_request(format!("gasPrice `{raw}` is not a wei amount")))
        })
        .transpose()?;

    Ok(TransferRequest {
        amount: request.amount.normalized(),
        receiver_address: request.receiver_wallet_address,
        token_symbol: request.token_to_send,
        sender_address: request.sender_wallet_address,
        sender_secret: request.sender_private_key,
        chain_id: request.chain_id,
        sponsorship,
        idempotency_key: request.idempotency_key.filter(|key| !key.trim().is_empty()),
        gas_limit: request.gas_limit,
        gas_price,
    })
}

fn message_for(result: &TransferResult) -> &'static str {
    if result.gas_sponsored {
        "Sponsored transfer executed"
    } else if result.ledger_transfer_id.is_some() {
        "Ledger transfer completed"
    } else {
        "Transfer submitted"
    }
}

/// Send a token on any supported chain.
///
/// With `useGasSponsorship`, ERC-20 transfers on chains with a sponsorship
/// contract are paid for by the sponsor; elsewhere the transfer is sent
/// normally and `gasSponsored` is `false`.
#[utoipa::path(
    post,
    path = "/v1/wallet/send-token",
    request_body = SendTokenRequest,
    tag = "Wallet",
    responses(
        (status = 200, description = "Transfer accepted", body = TransferResult),
        (status = 400, description = "Invalid request, unsupported chain or token"),
        (status = 403, description = "Ledger credential mismatch"),
        (status = 422, description = "Insufficient funds for value and gas"),
        (status = 502, description = "RPC endpoint unavailable")
    )
)]
pub async fn send_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendTokenRequest>,
) -> Result<Json<ApiResponse<TransferResult>>, ApiError> {
    let mode = if request.use_gas_sponsorship {
        SponsorshipMode::IfEligible
    } else {
        SponsorshipMode::Off
    };
    let result = state.dispatcher.send_token(into_transfer(request, mode)?).await?;
    Ok(Json(ApiResponse::ok(message_for(&result), result)))
}

/// Send an ERC-20 token with gas paid by the sponsor. Fails instead of
/// falling back when the chain is not eligible.
#[utoipa::path(
    post,
    path = "/v1/wallet/send-token-sponsored",
    request_body = SendTokenRequest,
    tag = "Wallet",
    responses(
        (status = 200, description = "Sponsored transfer executed", body = TransferResult),
        (status = 400, description = "Not sponsorable or rejected in pre-flight"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn send_token_sponsored(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendTokenRequest>,
) -> Result<Json<ApiResponse<TransferResult>>, ApiError> {
    let transfer = into_transfer(request, SponsorshipMode::Required)?;
    let result = state.dispatcher.send_token(transfer).await?;
    Ok(Json(ApiResponse::ok(message_for(&result), result)))
}

/// Status of a broadcast EVM transaction.
#[utoipa::path(
    get,
    path = "/v1/wallet/tx/{chain_id}/{tx_hash}",
    tag = "Wallet",
    params(
        ("chain_id" = String, Path, description = "Chain id, e.g. sepolia"),
        ("tx_hash" = String, Path, description = "0x-prefixed transaction hash")
    ),
    responses(
        (status = 200, description = "Transaction status", body = TransactionStatusResponse),
        (status = 400, description = "Unsupported chain or malformed hash"),
        (status = 502, description = "RPC endpoint unavailable")
    )
)]
pub async fn transaction_status(
    State(state): State<AppState>,
    Path((chain_id, tx_hash)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TransactionStatusResponse>>, ApiError> {
    let chain = state.registry.get_chain(&chain_id)?;
    if chain.is_ledger() {
        return Err(ApiError::bad_request(
            "ledger transfers are final and have no transaction hash",
        ));
    }
    let hash: TxHash = tx_hash
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("`{tx_hash}` is not a transaction hash")))?;

    let receipt = state
        .rpc
        .transaction_receipt(chain, hash)
        .await
        .map_err(TransferError::chain(chain))?;
    let status = match &receipt {
        None => "pending",
        Some(r) if r.success => "confirmed",
        Some(_) => "failed",
    };
    let tx_hash = format!("{hash:?}");

    Ok(Json(ApiResponse::ok(
        format!("Transaction {status}"),
        TransactionStatusResponse {
            chain_id: chain.id.clone(),
            explorer_url: chain.tx_url(&tx_hash),
            tx_hash,
            status: status.to_string(),
            receipt,
        },
    )))
}
