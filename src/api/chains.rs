// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain and token directory endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    blockchain::{Chain, Network},
    error::ApiError,
    models::{ApiResponse, ChainSummary, TokenSummary},
    state::AppState,
};

fn summarize(state: &AppState, chain: &Chain) -> ChainSummary {
    ChainSummary {
        id: chain.id.clone(),
        display_name: chain.display_name.clone(),
        network: match chain.network {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
        .to_string(),
        numeric_chain_id: chain.numeric_chain_id,
        native_symbol: chain.native_currency.symbol.clone(),
        native_decimals: chain.native_currency.decimals,
        explorer_url: chain.explorer_url.clone(),
        is_ledger: chain.is_ledger(),
        gas_sponsorship: state.dispatcher.sponsorship_eligible(&chain.id),
    }
}

/// Enabled chains.
#[utoipa::path(
    get,
    path = "/v1/wallet/chains",
    tag = "Chains",
    responses((status = 200, description = "Enabled chains", body = [ChainSummary]))
)]
pub async fn list_chains(State(state): State<AppState>) -> Json<ApiResponse<Vec<ChainSummary>>> {
    let chains = state
        .registry
        .list_enabled_chains()
        .into_iter()
        .map(|chain| summarize(&state, chain))
        .collect();
    Json(ApiResponse::ok("Chains retrieved", chains))
}

/// Tokens available on one chain, native currency first.
#[utoipa::path(
    get,
    path = "/v1/wallet/chains/{chain_id}/tokens",
    tag = "Chains",
    params(("chain_id" = String, Path, description = "Chain id or numeric chain id")),
    responses(
        (status = 200, description = "Tokens on the chain", body = [TokenSummary]),
        (status = 400, description = "Unsupported chain")
    )
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<TokenSummary>>>, ApiError> {
    let tokens = state
        .registry
        .tokens_on_chain(&chain_id)?
        .into_iter()
        .map(|token| TokenSummary {
            symbol: token.symbol,
            class: token.class,
            decimals: token.decimals,
            contract_address: token.contract_address.map(|a| format!("{a:?}")),
        })
        .collect();
    Ok(Json(ApiResponse::ok("Tokens retrieved", tokens)))
}
