// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::blockchain::gas_sponsor::SponsorshipError;
use crate::blockchain::{ChainError, RegistryError};
use crate::ledger::LedgerError;
use crate::transfer::TransferError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    /// Stable snake_case error code.
    pub code: &'static str,
    pub details: String,
    /// Set when a sponsored transfer failed after registration.
    pub sponsored_tx_hash: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sponsored_tx_hash: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, details: impl Into<String>) -> Self {
        Self {
            status,
            code,
            details: details.into(),
            sponsored_tx_hash: None,
        }
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", details)
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", details)
    }

    pub fn forbidden(details: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", details)
    }

    pub fn service_unavailable(details: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", details)
    }
}

/// `Json` body extractor whose rejections use the [`ApiError`] envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Missing content type, unparseable JSON and type mismatches alike.
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, details = %self.details, "Request failed");
        }
        let body = Json(ErrorBody {
            success: false,
            error: self.code,
            details: self.details,
            sponsored_tx_hash: self.sponsored_tx_hash,
        });
        (self.status, body).into_response()
    }
}

fn chain_status(error: &ChainError) -> (StatusCode, &'static str) {
    match error {
        ChainError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "invalid_address"),
        ChainError::InvalidPrivateKey(_) => (StatusCode::BAD_REQUEST, "invalid_private_key"),
        ChainError::InsufficientFunds(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
        }
        ChainError::ContractCallReverted(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "contract_call_reverted")
        }
        ChainError::RpcUnavailable(_) => (StatusCode::BAD_GATEWAY, "rpc_unavailable"),
        ChainError::InvalidRpcUrl(_) | ChainError::Signing(_) | ChainError::Rpc(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "chain_error")
        }
    }
}

fn sponsorship_status(error: &SponsorshipError) -> (StatusCode, &'static str) {
    use SponsorshipError::*;
    match error {
        NoSponsorDeployed(_) => (StatusCode::BAD_REQUEST, "no_sponsor_deployed"),
        SponsorKeyMissing => (StatusCode::SERVICE_UNAVAILABLE, "sponsor_key_missing"),
        NativeNotSponsorable(_) => (StatusCode::BAD_REQUEST, "native_not_sponsorable"),
        SelfSponsorshipForbidden => (StatusCode::BAD_REQUEST, "self_sponsorship_forbidden"),
        GasPriceTooHigh(_) => (StatusCode::BAD_REQUEST, "gas_price_too_high"),
        GasLimitTooHigh(_) => (StatusCode::BAD_REQUEST, "gas_limit_too_high"),
        InsufficientSponsorBalance(_) => {
            (StatusCode::BAD_REQUEST, "insufficient_sponsor_balance")
        }
        NotActiveSponsor => (StatusCode::BAD_REQUEST, "not_active_sponsor"),
        SponsorAlreadyExists(_) => (StatusCode::CONFLICT, "sponsor_already_exists"),
        AlreadyExecuted(_) => (StatusCode::BAD_REQUEST, "already_executed"),
        NotInitiator => (StatusCode::BAD_REQUEST, "not_initiator"),
        UnknownSponsoredTransaction(_) => (StatusCode::NOT_FOUND, "unknown_sponsored_transaction"),
        ContractReverted(_) => (StatusCode::INTERNAL_SERVER_ERROR, "contract_reverted"),
        Chain(e) => chain_status(e),
    }
}

fn ledger_status(error: &LedgerError) -> (StatusCode, &'static str) {
    match error {
        LedgerError::InvalidAddressFormat(_) => {
            (StatusCode::BAD_REQUEST, "invalid_address_format")
        }
        LedgerError::InvalidTicker(_) | LedgerError::InvalidAmount(_) => {
            (StatusCode::BAD_REQUEST, "invalid_request")
        }
        LedgerError::InsufficientBalance { .. } => {
            (StatusCode::BAD_REQUEST, "insufficient_balance")
        }
        LedgerError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
        LedgerError::AccountExists(_) | LedgerError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ledger_error")
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(error: TransferError) -> Self {
        let (status, code) = match &error {
            TransferError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            TransferError::Registry(RegistryError::UnsupportedChain(_)) => {
                (StatusCode::BAD_REQUEST, "unsupported_chain")
            }
            TransferError::Registry(RegistryError::UnsupportedToken { .. }) => {
                (StatusCode::BAD_REQUEST, "unsupported_token")
            }
            TransferError::Registry(RegistryError::InvalidConfiguration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "registry_misconfigured")
            }
            TransferError::SponsorshipNotSupportedForNative(_) => {
                (StatusCode::BAD_REQUEST, "sponsorship_not_supported_for_native")
            }
            TransferError::SponsorshipServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "sponsorship_unavailable")
            }
            TransferError::Chain { source, .. } => chain_status(source),
            TransferError::Ledger(source) => ledger_status(source),
            TransferError::Sponsorship { source, .. } => sponsorship_status(source),
        };

        let sponsored_tx_hash = match &error {
            TransferError::Sponsorship {
                pending_sponsored_tx_hash,
                ..
            } => pending_sponsored_tx_hash.clone(),
            _ => None,
        };

        Self {
            status,
            code,
            details: error.to_string(),
            sponsored_tx_hash,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        TransferError::from(error).into()
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        TransferError::from(error).into()
    }
}
