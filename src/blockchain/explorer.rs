// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Etherscan-compatible block explorer client.
//!
//! Used only as the secondary source for native balances once RPC reads
//! have been exhausted.

use std::{str::FromStr, time::Duration};

use alloy::primitives::{Address, U256};
use serde::Deserialize;

use super::client::ChainError;
use super::types::Chain;

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

pub struct ExplorerClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl ExplorerClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Rpc(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_key })
    }

    /// `module=account&action=balance` for one address.
    pub async fn native_balance(&self, chain: &Chain, address: Address) -> Result<U256, ChainError> {
        let api = chain.explorer_api_url.as_deref().ok_or_else(|| {
            ChainError::RpcUnavailable(format!("{} has no explorer API", chain.id))
        })?;

        let address = format!("{address:?}");
        let mut query = vec![
            ("module", "account"),
            ("action", "balance"),
            ("address", address.as_str()),
            ("tag", "latest"),
        ];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("apikey", key));
        }

        let response = self
            .http
            .get(api)
            .query(&query)
            .send()
            .await
            .map_err(|e| ChainError::RpcUnavailable(format!("explorer request failed: {e}")))?;
        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("explorer response malformed: {e}")))?;

        parse_balance_response(body)
    }
}

fn parse_balance_response(body: ExplorerResponse) -> Result<U256, ChainError> {
    if body.status != "1" {
        return Err(ChainError::Rpc(format!(
            "explorer error: {} ({})",
            body.message, body.result
        )));
    }
    let raw = body
        .result
        .as_str()
        .ok_or_else(|| ChainError::Rpc("explorer balance is not a string".into()))?;
    U256::from_str(raw).map_err(|e| ChainError::Rpc(format!("explorer balance `{raw}`: {e}")))
}
