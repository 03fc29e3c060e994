// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Degraded,
    Unavailable,
    Disabled,
}

/// Component-level readiness.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessReport {
    pub status: ComponentStatus,
    pub ledger: ComponentStatus,
    /// Enabled chains, ledger chain included.
    pub enabled_chains: usize,
    /// Chains with a live sponsorship contract. Empty when sponsorship is off;
    /// never affects readiness.
    pub sponsored_chains: Vec<String>,
    pub gas_sponsorship: ComponentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LivenessReport {
    pub status: ComponentStatus,
    pub version: &'static str,
}

impl ReadinessReport {
    fn collect(state: &AppState) -> Self {
        // A supply scan touches every balance row.
        let ledger = match state.ledger.total_supply("GOLD") {
            Ok(_) => ComponentStatus::Ok,
            Err(e) => {
                tracing::warn!(error = %e, "Ledger readiness check failed");
                ComponentStatus::Unavailable
            }
        };

        let chains = state.registry.list_enabled_chains();
        let sponsored_chains: Vec<String> = match &state.sponsorship {
            Some(coordinator) => chains
                .iter()
                .filter(|chain| coordinator.supports(&chain.id))
                .map(|chain| chain.id.clone())
                .collect(),
            None => Vec::new(),
        };
        let gas_sponsorship = if sponsored_chains.is_empty() {
            ComponentStatus::Disabled
        } else {
            ComponentStatus::Ok
        };

        let ready = ledger == ComponentStatus::Ok && !chains.is_empty();
        Self {
            status: if ready {
                ComponentStatus::Ok
            } else {
                ComponentStatus::Degraded
            },
            ledger,
            enabled_chains: chains.len(),
            sponsored_chains,
            gas_sponsorship,
        }
    }

    fn http_status(&self) -> StatusCode {
        if self.status == ComponentStatus::Ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Full health report, 503 when the ledger is unusable or no chain is enabled.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadinessReport),
        (status = 503, description = "Service is degraded", body = ReadinessReport)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let report = ReadinessReport::collect(&state);
    (report.http_status(), Json(report))
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is up", body = LivenessReport))
)]
pub async fn liveness() -> Json<LivenessReport> {
    Json(LivenessReport {
        status: ComponentStatus::Ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Same checks as `/health`, for orchestrator readiness gating.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready for traffic", body = ReadinessReport),
        (status = 503, description = "Not ready", body = ReadinessReport)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    health(state).await
}
