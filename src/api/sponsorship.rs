// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gas sponsorship inspection and escrow administration.

use alloy::primitives::{B256, U256};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use super::require_admin;
use crate::{
    blockchain::{
        gas_sponsor::SponsoredTransaction,
        signing::parse_address,
        transactions::{format_amount, parse_amount},
        Chain,
    },
    error::{ApiError, ApiJson},
    models::{
        AmountInput, ApiResponse, RegisterSponsorRequest, SponsorFundsRequest,
        SponsorFundsResponse, SponsorMembershipResponse, SponsorStatusResponse,
    },
    state::AppState,
    transfer::{validate_amount_shape, GasSponsorshipCoordinator, TransferError},
};

fn coordinator(state: &AppState) -> Result<&GasSponsorshipCoordinator, ApiError> {
    state
        .sponsorship
        .as_deref()
        .ok_or_else(|| TransferError::SponsorshipServiceUnavailable.into())
}

fn native_amount(chain: &Chain, amount: &AmountInput) -> Result<U256, ApiError> {
    let raw = amount.normalized();
    validate_amount_shape(&raw)?;
    parse_amount(&raw, chain.native_currency.decimals)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Sponsor escrow balance and the contract's gas ceilings.
#[utoipa::path(
    get,
    path = "/v1/wallet/sponsorship/{chain_id}/sponsor",
    tag = "Sponsorship",
    params(("chain_id" = String, Path, description = "Chain id")),
    responses(
        (status = 200, description = "Sponsor status", body = SponsorStatusResponse),
        (status = 400, description = "No sponsorship contract on this chain"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn sponsor_status(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
) -> Result<Json<ApiResponse<SponsorStatusResponse>>, ApiError> {
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let (sponsor, info, params) = coordinator.sponsor_info(chain).await?;
    let contract = coordinator
        .contract_address(&chain.id)
        .map(|a| format!("{a:?}"))
        .unwrap_or_default();

    Ok(Json(ApiResponse::ok(
        "Sponsor status retrieved",
        SponsorStatusResponse {
            chain_id: chain.id.clone(),
            contract_address: contract,
            sponsor_address: format!("{sponsor:?}"),
            is_active: info.is_active,
            balance: info.balance.to_string(),
            balance_formatted: format_amount(info.balance, chain.native_currency.decimals),
            total_sponsored: info.total_sponsored.to_string(),
            last_sponsored: info.last_sponsored.to_string(),
            min_sponsor_balance: params.min_sponsor_balance.to_string(),
            max_gas_price: params.max_gas_price.to_string(),
            max_gas_limit: params.max_gas_limit.to_string(),
        },
    )))
}

/// On-chain record of one sponsored transaction.
#[utoipa::path(
    get,
    path = "/v1/wallet/sponsorship/{chain_id}/tx/{sponsored_tx_hash}",
    tag = "Sponsorship",
    params(
        ("chain_id" = String, Path, description = "Chain id"),
        ("sponsored_tx_hash" = String, Path, description = "Identifier from the registration event")
    ),
    responses(
        (status = 200, description = "Sponsored transaction", body = SponsoredTransaction),
        (status = 404, description = "Unknown sponsored transaction"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn sponsored_transaction(
    State(state): State<AppState>,
    Path((chain_id, sponsored_tx_hash)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SponsoredTransaction>>, ApiError> {
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let hash: B256 = sponsored_tx_hash.trim().parse().map_err(|_| {
        ApiError::bad_request(format!("`{sponsored_tx_hash}` is not a 32-byte hash"))
    })?;

    let record = coordinator
        .sponsored_transaction(chain, hash)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No sponsored transaction {hash:?}")))?;
    Ok(Json(ApiResponse::ok("Sponsored transaction retrieved", record)))
}

/// Add native currency to the sponsor's escrow. Admin only.
#[utoipa::path(
    post,
    path = "/v1/wallet/sponsorship/{chain_id}/funds",
    tag = "Sponsorship",
    request_body = SponsorFundsRequest,
    params(
        ("chain_id" = String, Path, description = "Chain id"),
        ("x-admin-token" = String, Header, description = "Admin token")
    ),
    responses(
        (status = 200, description = "Escrow topped up", body = SponsorFundsResponse),
        (status = 403, description = "Missing or wrong admin token"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn add_funds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chain_id): Path<String>,
    ApiJson(request): ApiJson<SponsorFundsRequest>,
) -> Result<Json<ApiResponse<SponsorFundsResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let amount = native_amount(chain, &request.amount)?;
    let hash = coordinator.add_funds(chain, amount).await?;

    Ok(Json(ApiResponse::ok(
        "Sponsor escrow topped up",
        SponsorFundsResponse {
            chain_id: chain.id.clone(),
            tx_hash: format!("{hash:?}"),
            amount: request.amount.normalized(),
        },
    )))
}

/// Withdraw native currency from the sponsor's escrow. Admin only.
#[utoipa::path(
    post,
    path = "/v1/wallet/sponsorship/{chain_id}/withdraw",
    tag = "Sponsorship",
    request_body = SponsorFundsRequest,
    params(
        ("chain_id" = String, Path, description = "Chain id"),
        ("x-admin-token" = String, Header, description = "Admin token")
    ),
    responses(
        (status = 200, description = "Escrow withdrawn", body = SponsorFundsResponse),
        (status = 400, description = "Amount exceeds the escrow balance"),
        (status = 403, description = "Missing or wrong admin token"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn withdraw_funds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chain_id): Path<String>,
    ApiJson(request): ApiJson<SponsorFundsRequest>,
) -> Result<Json<ApiResponse<SponsorFundsResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let amount = native_amount(chain, &request.amount)?;
    let hash = coordinator.withdraw_funds(chain, amount).await?;

    Ok(Json(ApiResponse::ok(
        "Sponsor escrow withdrawn",
        SponsorFundsResponse {
            chain_id: chain.id.clone(),
            tx_hash: format!("{hash:?}"),
            amount: request.amount.normalized(),
        },
    )))
}

/// Enrol an address as a sponsor with an initial escrow deposit. Admin only.
#[utoipa::path(
    post,
    path = "/v1/wallet/sponsorship/{chain_id}/sponsors",
    tag = "Sponsorship",
    request_body = RegisterSponsorRequest,
    params(
        ("chain_id" = String, Path, description = "Chain id"),
        ("x-admin-token" = String, Header, description = "Admin token")
    ),
    responses(
        (status = 200, description = "Sponsor registered", body = SponsorMembershipResponse),
        (status = 400, description = "Deposit below the contract minimum"),
        (status = 403, description = "Missing or wrong admin token"),
        (status = 409, description = "Sponsor already registered"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn register_sponsor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chain_id): Path<String>,
    ApiJson(request): ApiJson<RegisterSponsorRequest>,
) -> Result<Json<ApiResponse<SponsorMembershipResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let sponsor = parse_address(&request.sponsor_address)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let deposit = native_amount(chain, &request.amount)?;
    let hash = coordinator.register_sponsor(chain, sponsor, deposit).await?;

    Ok(Json(ApiResponse::ok(
        "Sponsor registered",
        SponsorMembershipResponse {
            chain_id: chain.id.clone(),
            sponsor_address: format!("{sponsor:?}"),
            tx_hash: format!("{hash:?}"),
            is_active: true,
        },
    )))
}

/// Deactivate a sponsor and refund its escrow. Admin only.
#[utoipa::path(
    delete,
    path = "/v1/wallet/sponsorship/{chain_id}/sponsors/{sponsor_address}",
    tag = "Sponsorship",
    params(
        ("chain_id" = String, Path, description = "Chain id"),
        ("sponsor_address" = String, Path, description = "Sponsor to remove"),
        ("x-admin-token" = String, Header, description = "Admin token")
    ),
    responses(
        (status = 200, description = "Sponsor removed", body = SponsorMembershipResponse),
        (status = 400, description = "Address is not an active sponsor"),
        (status = 403, description = "Missing or wrong admin token"),
        (status = 503, description = "Gas sponsorship service unavailable")
    )
)]
pub async fn remove_sponsor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((chain_id, sponsor_address)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SponsorMembershipResponse>>, ApiError> {
    require_admin(&state, &headers)?;
    let coordinator = coordinator(&state)?;
    let chain = state.registry.get_chain(&chain_id)?;
    let sponsor =
        parse_address(&sponsor_address).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let hash = coordinator.remove_sponsor(chain, sponsor).await?;

    Ok(Json(ApiResponse::ok(
        "Sponsor removed",
        SponsorMembershipResponse {
            chain_id: chain.id.clone(),
            sponsor_address: format!("{sponsor:?}"),
            tx_hash: format!("{hash:?}"),
            is_active: false,
        },
    )))
}
