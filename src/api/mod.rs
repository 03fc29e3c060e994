// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::{
        gas_sponsor::SponsoredTransaction, Network, TokenBalance, TokenClass, TxReceipt,
    },
    error::ApiError,
    models::{
        ChainSummary, CreditRequest, CreditResponse, LedgerBalancesResponse, OpenAccountResponse,
        RegisterSponsorRequest, SendTokenRequest, SponsorFundsRequest, SponsorFundsResponse,
        SponsorMembershipResponse, SponsorStatusResponse, TokenSummary, TransactionStatusResponse,
    },
    state::AppState,
    transfer::{SponsorshipDetails, TransferResult, TransferStatus},
};

pub mod balance;
pub mod chains;
pub mod health;
pub mod ledger;
pub mod sponsorship;
pub mod wallet;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Reject the request unless it carries the configured admin token.
pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if state.is_admin(presented) {
        Ok(())
    } else {
        Err(ApiError::forbidden("A valid x-admin-token header is required"))
    }
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallet/send-token", post(wallet::send_token))
        .route(
            "/wallet/send-token-sponsored",
            post(wallet::send_token_sponsored),
        )
        .route(
            "/wallet/tx/{chain_id}/{tx_hash}",
            get(wallet::transaction_status),
        )
        .route(
            "/wallet/balance/{chain_id}/{wallet_address}",
            get(balance::native_balance),
        )
        .route(
            "/wallet/balance/{chain_id}/{token_symbol}/{wallet_address}",
            get(balance::token_balance),
        )
        .route("/wallet/chains", get(chains::list_chains))
        .route("/wallet/chains/{chain_id}/tokens", get(chains::list_tokens))
        .route(
            "/wallet/sponsorship/{chain_id}/sponsor",
            get(sponsorship::sponsor_status),
        )
        .route(
            "/wallet/sponsorship/{chain_id}/tx/{sponsored_tx_hash}",
            get(sponsorship::sponsored_transaction),
        )
        .route(
            "/wallet/sponsorship/{chain_id}/funds",
            post(sponsorship::add_funds),
        )
        .route(
            "/wallet/sponsorship/{chain_id}/withdraw",
            post(sponsorship::withdraw_funds),
        )
        .route(
            "/wallet/sponsorship/{chain_id}/sponsors",
            post(sponsorship::register_sponsor),
        )
        .route(
            "/wallet/sponsorship/{chain_id}/sponsors/{sponsor_address}",
            delete(sponsorship::remove_sponsor),
        )
        .route("/ledger/accounts", post(ledger::open_account))
        .route(
            "/ledger/accounts/{address}/balances",
            get(ledger::list_balances),
        )
        .route("/ledger/accounts/{address}/credit", post(ledger::credit))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        wallet::send_token,
        wallet::send_token_sponsored,
        wallet::transaction_status,
        balance::native_balance,
        balance::token_balance,
        chains::list_chains,
        chains::list_tokens,
        sponsorship::sponsor_status,
        sponsorship::sponsored_transaction,
        sponsorship::add_funds,
        sponsorship::withdraw_funds,
        sponsorship::register_sponsor,
        sponsorship::remove_sponsor,
        ledger::open_account,
        ledger::list_balances,
        ledger::credit,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            SendTokenRequest,
            TransferResult,
            TransferStatus,
            SponsorshipDetails,
            TransactionStatusResponse,
            TxReceipt,
            TokenBalance,
            ChainSummary,
            TokenSummary,
            TokenClass,
            Network,
            SponsorStatusResponse,
            SponsoredTransaction,
            SponsorFundsRequest,
            SponsorFundsResponse,
            RegisterSponsorRequest,
            SponsorMembershipResponse,
            OpenAccountResponse,
            LedgerBalancesResponse,
            CreditRequest,
            CreditResponse,
            health::ComponentStatus,
            health::ReadinessReport,
            health::LivenessReport
        )
    ),
    tags(
        (name = "Wallet", description = "Token transfers and transaction status"),
        (name = "Balances", description = "Native and token balances"),
        (name = "Chains", description = "Supported chains and tokens"),
        (name = "Sponsorship", description = "Gas sponsorship"),
        (name = "Ledger", description = "NullNet ledger accounts"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{address_of, ether, test_services, MockChainRpc, ALICE_KEY, BOB_KEY};
    use axum::{
        body::to_bytes,
        http::{header, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADMIN: &str = "admin-secret";

    fn app() -> (Router, Arc<MockChainRpc>) {
        let rpc = MockChainRpc::new();
        let state = AppState::new(test_services(rpc.clone(), Some(ADMIN)));
        (router(state), rpc)
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value, admin: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = admin {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_and_docs_are_served() {
        let (app, _) = app();
        let (status, headers, body) = call(&app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(headers.contains_key("x-request-id"));

        let (status, _, body) = call(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ledger"], "ok");
        assert_eq!(body["enabledChains"], 8);
        assert_eq!(body["gasSponsorship"], "disabled");

        let (status, _, body) = call(&app, get("/api-doc/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/v1/wallet/send-token"].is_object());
    }

    #[tokio::test]
    async fn chains_and_tokens_are_listed() {
        let (app, _) = app();
        let (status, _, body) = call(&app, get("/v1/wallet/chains")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let chains = body["data"].as_array().unwrap();
        assert_eq!(chains.len(), 8);
        assert!(chains
            .iter()
            .any(|c| c["id"] == "nullnet" && c["isLedger"] == true));

        let (status, _, body) = call(&app, get("/v1/wallet/chains/56/tokens")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["symbol"], "BNB");

        let (status, _, body) = call(&app, get("/v1/wallet/chains/solana/tokens")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unsupported_chain");
    }

    #[tokio::test]
    async fn ledger_flow_over_http() {
        let (app, rpc) = app();
        let (status, _, opened) = call(&app, post_json("/v1/ledger/accounts", json!({}), None)).await;
        assert_eq!(status, StatusCode::OK);
        let address = opened["data"]["address"].as_str().unwrap().to_string();
        let spend_key = opened["data"]["spendKey"].as_str().unwrap().to_string();

        let credit_uri = format!("/v1/ledger/accounts/{address}/credit");
        let credit = json!({"ticker": "gold", "amount": 100});
        let (status, _, body) = call(&app, post_json(&credit_uri, credit.clone(), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        let (status, _, _) = call(&app, post_json(&credit_uri, credit.clone(), Some("wrong"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, body) = call(&app, post_json(&credit_uri, credit, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], "100");

        let receiver = "null_ABCDEFGHIJ0123456789";
        let transfer = json!({
            "amount": "50",
            "receiverWalletAddress": receiver,
            "tokenToSend": "GOLD",
            "senderWalletAddress": address,
            "senderPrivateKey": spend_key,
            "chainId": "nullnet",
        });
        let (status, _, body) =
            call(&app, post_json("/v1/wallet/send-token", transfer.clone(), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "confirmed");
        assert!(body["data"]["ledgerTransferId"]
            .as_str()
            .unwrap()
            .starts_with("nullnet_"));

        let (_, _, body) = call(&app, get(&format!("/v1/ledger/accounts/{address}/balances"))).await;
        assert_eq!(body["data"]["balances"]["GOLD"], "50");
        let (_, _, body) = call(&app, get(&format!("/v1/wallet/balance/nullnet/GOLD/{receiver}"))).await;
        assert_eq!(body["data"]["balanceFormatted"], "50");

        let mut wrong_key = transfer;
        wrong_key["senderPrivateKey"] = json!("00".repeat(32));
        let (status, _, body) = call(&app, post_json("/v1/wallet/send-token", wrong_key, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn native_transfer_then_status_and_balance() {
        let (app, rpc) = app();
        let alice = address_of(ALICE_KEY);
        let bob = address_of(BOB_KEY);
        rpc.set_native_balance("sepolia", alice, ether(3));

        let (status, _, body) = call(
            &app,
            post_json(
                "/v1/wallet/send-token",
                json!({
                    "amount": 1.5,
                    "receiverWalletAddress": format!("{bob:?}"),
                    "tokenToSend": "ETH",
                    "senderWalletAddress": format!("{alice:?}").to_lowercase(),
                    "senderPrivateKey": ALICE_KEY,
                    "chainId": "sepolia",
                }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["gasSponsored"], false);
        let tx_hash = body["data"]["transactionHash"].as_str().unwrap().to_string();

        let (status, _, body) = call(&app, get(&format!("/v1/wallet/tx/sepolia/{tx_hash}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "confirmed");

        let (_, _, body) = call(&app, get(&format!("/v1/wallet/balance/sepolia/{bob:?}"))).await;
        assert_eq!(body["data"]["balanceFormatted"], "1.5");
        assert_eq!(body["data"]["source"], "rpc");
    }

    #[tokio::test]
    async fn validation_failures_use_error_envelope() {
        let (app, rpc) = app();
        let bob = format!("{:?}", address_of(BOB_KEY));
        let alice = format!("{:?}", address_of(ALICE_KEY));

        let (status, _, body) = call(
            &app,
            post_json(
                "/v1/wallet/send-token",
                json!({
                    "amount": "-1",
                    "receiverWalletAddress": bob,
                    "tokenToSend": "ETH",
                    "senderWalletAddress": alice,
                    "senderPrivateKey": ALICE_KEY,
                    "chainId": "sepolia",
                }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_request");

        let (status, _, body) = call(&app, get(&format!("/v1/wallet/balance/bsc/USDC/{bob}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unsupported_token");
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn sponsorship_routes_without_service_are_unavailable() {
        let (app, rpc) = app();
        let (status, _, body) = call(
            &app,
            post_json(
                "/v1/wallet/send-token-sponsored",
                json!({
                    "amount": "1",
                    "receiverWalletAddress": format!("{:?}", address_of(BOB_KEY)),
                    "tokenToSend": "USDC",
                    "senderWalletAddress": format!("{:?}", address_of(ALICE_KEY)),
                    "senderPrivateKey": ALICE_KEY,
                    "chainId": "sepolia",
                }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "sponsorship_unavailable");

        let (status, _, _) = call(&app, get("/v1/wallet/sponsorship/flowTestnet/sponsor")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _, _) = call(
            &app,
            post_json(
                "/v1/wallet/sponsorship/flowTestnet/funds",
                json!({"amount": "1"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_bodies_use_error_envelope() {
        let (app, rpc) = app();
        let transfer = json!({
            "amount": "1",
            "receiverWalletAddress": format!("{:?}", address_of(BOB_KEY)),
            "tokenToSend": "ETH",
            "senderWalletAddress": format!("{:?}", address_of(ALICE_KEY)),
            "senderPrivateKey": ALICE_KEY,
            "chainId": "sepolia",
        });

        let mut bad_amount = transfer.clone();
        bad_amount["amount"] = json!(true);
        let (status, _, body) =
            call(&app, post_json("/v1/wallet/send-token", bad_amount, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["details"].as_str().is_some_and(|d| !d.is_empty()));

        let mut bad_gas = transfer.clone();
        bad_gas["gasLimit"] = json!("abc");
        let (status, _, body) =
            call(&app, post_json("/v1/wallet/send-token-sponsored", bad_gas, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let garbled = Request::post("/v1/wallet/send-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"amount\": "))
            .unwrap();
        let (status, _, body) = call(&app, garbled).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let untyped = Request::post("/v1/wallet/send-token")
            .body(Body::from(transfer.to_string()))
            .unwrap();
        let (status, _, body) = call(&app, untyped).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (status, _, body) = call(
            &app,
            post_json(
                "/v1/ledger/accounts/null_ABCDEFGHIJ0123456789/credit",
                json!({"ticker": 5, "amount": "1"}),
                Some(ADMIN),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(rpc.calls(), 0);
    }

    fn sponsored_app() -> (Router, Arc<crate::testing::MockSponsorContract>) {
        use crate::blockchain::{gas_sponsor::SponsorContract, locks::AccountLocks};
        use crate::testing::{signer, MockSponsorContract, SPONSOR_KEY};
        use crate::transfer::{sponsorship::DEFAULT_JOURNAL_CAPACITY, GasSponsorshipCoordinator};
        use std::collections::HashMap;

        let rpc = MockChainRpc::new();
        let contract = MockSponsorContract::new(alloy::primitives::Address::repeat_byte(0x5a));
        contract.add_sponsor(address_of(SPONSOR_KEY), ether(1));
        let mut contracts: HashMap<String, Arc<dyn SponsorContract>> = HashMap::new();
        contracts.insert("flowTestnet".into(), contract.clone());

        let mut services = test_services(rpc.clone(), Some(ADMIN));
        services.sponsorship = Some(Arc::new(GasSponsorshipCoordinator::new(
            contracts,
            Some(signer(SPONSOR_KEY)),
            rpc,
            AccountLocks::new(),
            DEFAULT_JOURNAL_CAPACITY,
        )));
        (router(AppState::new(services)), contract)
    }

    #[tokio::test]
    async fn sponsors_are_enrolled_and_removed_by_admin() {
        let (app, contract) = sponsored_app();
        let carol = alloy::primitives::Address::repeat_byte(0xc0);
        let enrol_uri = "/v1/wallet/sponsorship/flowTestnet/sponsors";
        let enrol = json!({"sponsorAddress": format!("{carol:?}"), "amount": "0.5"});

        let (status, _, _) = call(&app, post_json(enrol_uri, enrol.clone(), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(contract.calls(), 0);

        let (status, _, body) = call(&app, post_json(enrol_uri, enrol.clone(), Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["isActive"], true);
        assert_eq!(contract.balance_of(carol), ether(1) / alloy::primitives::U256::from(2));

        let (status, _, body) = call(&app, post_json(enrol_uri, enrol, Some(ADMIN))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "sponsor_already_exists");

        let (status, _, body) = call(
            &app,
            post_json(enrol_uri, json!({"sponsorAddress": "carol", "amount": "1"}), Some(ADMIN)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let remove_uri = format!("{enrol_uri}/{carol:?}");
        let remove = |admin: Option<&str>| {
            let mut builder = Request::delete(remove_uri.as_str());
            if let Some(token) = admin {
                builder = builder.header(ADMIN_TOKEN_HEADER, token);
            }
            builder.body(Body::empty()).unwrap()
        };
        let (status, _, _) = call(&app, remove(Some("wrong"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = call(&app, remove(Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["isActive"], false);
        assert_eq!(contract.balance_of(carol), alloy::primitives::U256::ZERO);

        let (status, _, body) = call(&app, remove(Some(ADMIN))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "not_active_sponsor");
    }
}
