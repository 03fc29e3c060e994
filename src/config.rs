// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Any value
//! that is present but invalid aborts startup with a [`ConfigError`] naming
//! the variable.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; HTTPS when both set | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `DATA_DIR` | Directory for `ledger.redb`; in-memory ledger when unset | unset |
//! | `RPC_TIMEOUT_SECS` | Per-call RPC and explorer timeout | `10` |
//! | `<CHAIN>_RPC_URL` | RPC endpoint override per chain | built-in |
//! | `EXPLORER_API_KEY` | Block explorer API key | unset |
//! | `GAS_SPONSOR_PRIVATE_KEY` | Sponsor signing key (hex or PEM) | unset |
//! | `FLOW_GAS_SPONSOR_ADDRESS` | Sponsorship contract on flowTestnet | deployed address |
//! | `SEPOLIA_GAS_SPONSOR_ADDRESS` | Sponsorship contract on sepolia | unset |
//! | `MUMBAI_GAS_SPONSOR_ADDRESS` | Sponsorship contract on mumbai | unset |
//! | `SPONSORSHIP_JOURNAL_CAPACITY` | Idempotency journal size | `1024` |
//! | `LEDGER_SECRET_PEPPER` | HMAC key for ledger spend credentials | random per process |
//! | `ADMIN_TOKEN` | Enables admin routes via `x-admin-token` | unset |
//! | `EXTRA_TOKEN_DEPLOYMENTS` | `SYMBOL@chain=0xaddr:decimals,...` | unset |
//! | `DISABLED_CHAINS` | Comma-separated chain ids | unset |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use url::Url;

use crate::blockchain::registry::TokenDeploymentOverride;
use crate::blockchain::{RegistryOverrides, CHAINS};
use crate::models::KeyMaterial;
use crate::transfer::sponsorship::DEFAULT_JOURNAL_CAPACITY;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the ledger data directory.
///
/// When set, the NullNet ledger is stored in `$DATA_DIR/ledger.redb` and
/// survives restarts.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const RPC_TIMEOUT_SECS_ENV: &str = "RPC_TIMEOUT_SECS";
pub const EXPLORER_API_KEY_ENV: &str = "EXPLORER_API_KEY";
pub const GAS_SPONSOR_PRIVATE_KEY_ENV: &str = "GAS_SPONSOR_PRIVATE_KEY";
pub const SPONSORSHIP_JOURNAL_CAPACITY_ENV: &str = "SPONSORSHIP_JOURNAL_CAPACITY";
pub const LEDGER_SECRET_PEPPER_ENV: &str = "LEDGER_SECRET_PEPPER";
pub const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";
pub const EXTRA_TOKEN_DEPLOYMENTS_ENV: &str = "EXTRA_TOKEN_DEPLOYMENTS";
pub const DISABLED_CHAINS_ENV: &str = "DISABLED_CHAINS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// `(chain id, env var, default contract address)` for gas sponsorship.
pub const GAS_SPONSOR_CONTRACTS: &[(&str, &str, Option<&str>)] = &[
    (
        "flowTestnet",
        "FLOW_GAS_SPONSOR_ADDRESS",
        Some("0xD85E0Bfd995278F9369d0e7a1385d4114B95a916"),
    ),
    ("sepolia", "SEPOLIA_GAS_SPONSOR_ADDRESS", None),
    ("mumbai", "MUMBAI_GAS_SPONSOR_ADDRESS", None),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
    pub data_dir: Option<PathBuf>,
    pub rpc_timeout: Duration,
    pub registry: RegistryOverrides,
    pub explorer_api_key: Option<String>,
    /// Parsed later so a malformed key disables sponsorship instead of
    /// aborting startup.
    pub gas_sponsor_key: Option<KeyMaterial>,
    /// Chain id to sponsorship contract.
    pub gas_sponsor_contracts: BTreeMap<String, Address>,
    pub journal_capacity: usize,
    pub ledger_pepper: Option<String>,
    pub admin_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            log_format: LogFormat::default(),
            data_dir: None,
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            registry: RegistryOverrides::default(),
            explorer_api_key: None,
            gas_sponsor_key: None,
            gas_sponsor_contracts: BTreeMap::new(),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            ledger_pepper: None,
            admin_token: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| invalid(PORT_ENV, e))?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(TLS_KEY_PATH_ENV, TLS_CERT_PATH_ENV))
            }
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, format!("unknown format `{other}`"))),
        };

        let rpc_timeout = match get(RPC_TIMEOUT_SECS_ENV) {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| invalid(RPC_TIMEOUT_SECS_ENV, e))?;
                if secs == 0 {
                    return Err(invalid(RPC_TIMEOUT_SECS_ENV, "must be at least 1"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        };

        let mut registry = RegistryOverrides::default();
        for def in CHAINS {
            let Some(var) = def.rpc_env else { continue };
            if let Some(raw) = get(var) {
                let url = Url::parse(&raw).map_err(|e| invalid(var, e))?;
                registry.rpc_urls.insert(def.id.to_string(), url);
            }
        }
        if let Some(raw) = get(DISABLED_CHAINS_ENV) {
            registry.disabled_chains = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = get(EXTRA_TOKEN_DEPLOYMENTS_ENV) {
            registry.extra_deployments = TokenDeploymentOverride::parse_list(&raw)
                .map_err(|e| invalid(EXTRA_TOKEN_DEPLOYMENTS_ENV, e))?;
        }

        let mut gas_sponsor_contracts = BTreeMap::new();
        for &(chain_id, var, default) in GAS_SPONSOR_CONTRACTS {
            let raw = get(var).or_else(|| default.map(str::to_string));
            if let Some(raw) = raw {
                let address = raw.parse::<Address>().map_err(|e| invalid(var, e))?;
                gas_sponsor_contracts.insert(chain_id.to_string(), address);
            }
        }

        let journal_capacity = match get(SPONSORSHIP_JOURNAL_CAPACITY_ENV) {
            Some(raw) => {
                let capacity = raw
                    .parse::<usize>()
                    .map_err(|e| invalid(SPONSORSHIP_JOURNAL_CAPACITY_ENV, e))?;
                if capacity == 0 {
                    return Err(invalid(SPONSORSHIP_JOURNAL_CAPACITY_ENV, "must be at least 1"));
                }
                capacity
            }
            None => DEFAULT_JOURNAL_CAPACITY,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            tls,
            log_format,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from),
            rpc_timeout,
            registry,
            explorer_api_key: get(EXPLORER_API_KEY_ENV),
            gas_sponsor_key: get(GAS_SPONSOR_PRIVATE_KEY_ENV).map(KeyMaterial::new),
            gas_sponsor_contracts,
            journal_capacity,
            ledger_pepper: get(LEDGER_SECRET_PEPPER_ENV),
            admin_token: get(ADMIN_TOKEN_ENV),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
