// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance query endpoints. Read-only.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    blockchain::TokenBalance, error::ApiError, models::ApiResponse, state::AppState,
};

/// Native currency balance of an address.
///
/// On `nullnet` this is the ledger's `NULL` balance. EVM reads are retried
/// and fall back to the chain's block explorer.
#[utoipa::path(
    get,
    path = "/v1/wallet/balance/{chain_id}/{wallet_address}",
    tag = "Balances",
    params(
        ("chain_id" = String, Path, description = "Chain id or numeric chain id"),
        ("wallet_address" = String, Path, description = "0x address or null_ address")
    ),
    responses(
        (status = 200, description = "Balance retrieved", body = TokenBalance),
        (status = 400, description = "Unsupported chain or malformed address"),
        (status = 502, description = "RPC and explorer unavailable")
    )
)]
pub async fn native_balance(
    State(state): State<AppState>,
    Path((chain_id, wallet_address)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TokenBalance>>, ApiError> {
    let balance = state
        .balances
        .native_balance(&chain_id, &wallet_address)
        .await?;
    Ok(Json(ApiResponse::ok("Balance retrieved", balance)))
}

/// Balance of a specific token.
#[utoipa::path(
    get,
    path = "/v1/wallet/balance/{chain_id}/{token_symbol}/{wallet_address}",
    tag = "Balances",
    params(
        ("chain_id" = String, Path, description = "Chain id or numeric chain id"),
        ("token_symbol" = String, Path, description = "Token symbol, e.g. USDC"),
        ("wallet_address" = String, Path, description = "0x address or null_ address")
    ),
    responses(
        (status = 200, description = "Balance retrieved", body = TokenBalance),
        (status = 400, description = "Unsupported chain or token, or malformed address"),
        (status = 502, description = "RPC endpoint unavailable")
    )
)]
pub async fn token_balance(
    State(state): State<AppState>,
    Path((chain_id, token_symbol, wallet_address)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<TokenBalance>>, ApiError> {
    let balance = state
        .balances
        .token_balance(&chain_id, &token_symbol, &wallet_address)
        .await?;
    Ok(Json(ApiResponse::ok("Balance retrieved", balance)))
}
