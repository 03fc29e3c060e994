// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NullNet ledger account endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::require_admin;
use crate::{
    blockchain::transactions::{format_amount, parse_amount},
    error::{ApiError, ApiJson},
    ledger::address::normalize_ticker,
    models::{
        ApiResponse, CreditRequest, CreditResponse, LedgerBalancesResponse, OpenAccountResponse,
    },
    state::AppState,
    transfer::validate_amount_shape,
};

/// Decimals of every ledger asset.
const LEDGER_DECIMALS: u8 = 18;

/// Open a ledger account. The spend key is returned only in this response.
#[utoipa::path(
    post,
    path = "/v1/ledger/accounts",
    tag = "Ledger",
    responses((status = 200, description = "Account opened", body = OpenAccountResponse))
)]
pub async fn open_account(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OpenAccountResponse>>, ApiError> {
    let account = state.ledger.open_account()?;
    Ok(Json(ApiResponse::ok(
        "Ledger account opened",
        OpenAccountResponse {
            address: account.address,
            spend_key: account.spend_key,
        },
    )))
}

/// Every non-zero balance of a ledger account.
#[utoipa::path(
    get,
    path = "/v1/ledger/accounts/{address}/balances",
    tag = "Ledger",
    params(("address" = String, Path, description = "null_ address")),
    responses(
        (status = 200, description = "Balances", body = LedgerBalancesResponse),
        (status = 400, description = "Malformed address")
    )
)]
pub async fn list_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<LedgerBalancesResponse>>, ApiError> {
    let balances = state
        .ledger
        .list_balances(&address)?
        .into_iter()
        .map(|(ticker, amount)| (ticker, format_amount(amount, LEDGER_DECIMALS)))
        .collect();
    Ok(Json(ApiResponse::ok(
        "Balances retrieved",
        LedgerBalancesResponse { address, balances },
    )))
}

/// Credit an asset to a ledger account. Admin only.
#[utoipa::path(
    post,
    path = "/v1/ledger/accounts/{address}/credit",
    tag = "Ledger",
    request_body = CreditRequest,
    params(
        ("address" = String, Path, description = "null_ address"),
        ("x-admin-token" = String, Header, description = "Admin token")
    ),
    responses(
        (status = 200, description = "Balance after the credit", body = CreditResponse),
        (status = 400, description = "Malformed address, ticker or amount"),
        (status = 403, description = "Missing or wrong admin token")
    )
)]
pub async fn credit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
    ApiJson(request): ApiJson<CreditRequest>,
) -> Result<Json<ApiResponse<CreditResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let ticker = normalize_ticker(&request.ticker)?;
    let raw = request.amount.normalized();
    validate_amount_shape(&raw)?;
    let amount =
        parse_amount(&raw, LEDGER_DECIMALS).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let balance = state.ledger.credit(&address, &ticker, amount)?;
    Ok(Json(ApiResponse::ok(
        "Ledger account credited",
        CreditResponse {
            address,
            ticker,
            balance: format_amount(balance, LEDGER_DECIMALS),
        },
    )))
}
