// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.
//!
//! One [`AppState`] is built at startup and cloned into every handler. All
//! collaborators are constructed here and passed down explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use k256::elliptic_curve::rand_core::{OsRng, RngCore};

use crate::balances::BalanceReader;
use crate::blockchain::explorer::ExplorerClient;
use crate::blockchain::gas_sponsor::{GasSponsorContract, SponsorContract};
use crate::blockchain::locks::AccountLocks;
use crate::blockchain::signing::signer_from_key_material;
use crate::blockchain::{AlloyChainRpc, ChainError, ChainRegistry, ChainRpc, RegistryError};
use crate::config::AppConfig;
use crate::ledger::{InMemoryLedgerStore, LedgerAccount, LedgerError, LedgerStore, RedbLedgerStore};
use crate::transfer::{
    EvmSubmitter, GasSponsorshipCoordinator, LedgerTransferExecutor, NativeTransferExecutor,
    TokenTransferExecutor, TransferDispatcher,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("chain client: {0}")]
    Chain(#[from] ChainError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Collaborators an [`AppState`] is assembled from.
pub struct Services {
    pub registry: Arc<ChainRegistry>,
    pub rpc: Arc<dyn ChainRpc>,
    pub explorer: Option<Arc<ExplorerClient>>,
    pub ledger: LedgerAccount,
    pub locks: AccountLocks,
    pub sponsorship: Option<Arc<GasSponsorshipCoordinator>>,
    pub admin_token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChainRegistry>,
    pub rpc: Arc<dyn ChainRpc>,
    pub dispatcher: Arc<TransferDispatcher>,
    pub balances: BalanceReader,
    pub ledger: LedgerAccount,
    pub sponsorship: Option<Arc<GasSponsorshipCoordinator>>,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        let submitter = EvmSubmitter::new(services.rpc.clone(), services.locks);
        let dispatcher = TransferDispatcher::new(
            services.registry.clone(),
            NativeTransferExecutor::new(submitter.clone()),
            TokenTransferExecutor::new(submitter),
            LedgerTransferExecutor::new(services.ledger.clone()),
            services.sponsorship.clone(),
        );
        let balances = BalanceReader::new(
            services.registry.clone(),
            services.rpc.clone(),
            services.explorer,
            services.ledger.clone(),
        );
        Self {
            registry: services.registry,
            rpc: services.rpc,
            dispatcher: Arc::new(dispatcher),
            balances,
            ledger: services.ledger,
            sponsorship: services.sponsorship,
            admin_token: services.admin_token.map(Arc::from),
        }
    }

    /// Build the production state: live RPC clients, the configured ledger
    /// store and the sponsorship coordinator.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let registry = Arc::new(ChainRegistry::standard(&config.registry)?);
        let rpc: Arc<dyn ChainRpc> = Arc::new(AlloyChainRpc::new(&registry, config.rpc_timeout)?);
        let explorer = Arc::new(ExplorerClient::new(
            config.explorer_api_key.clone(),
            config.rpc_timeout,
        )?);
        let ledger = open_ledger(config)?;
        let locks = AccountLocks::new();
        let sponsorship = build_sponsorship(config, &registry, rpc.clone(), locks.clone()).await?;

        tracing::info!(
            chains = registry.list_enabled_chains().len(),
            sponsorship = sponsorship.is_some(),
            durable_ledger = config.data_dir.is_some(),
            "Application state initialized"
        );

        Ok(Self::new(Services {
            registry,
            rpc,
            explorer: Some(explorer),
            ledger,
            locks,
            sponsorship,
            admin_token: config.admin_token.clone(),
        }))
    }

    /// Constant-time check of an `x-admin-token` header value.
    pub fn is_admin(&self, presented: Option<&str>) -> bool {
        let (Some(expected), Some(presented)) = (self.admin_token.as_deref(), presented) else {
            return false;
        };
        let (expected, presented) = (expected.as_bytes(), presented.trim().as_bytes());
        expected.len() == presented.len()
            && expected
                .iter()
                .zip(presented)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn open_ledger(config: &AppConfig) -> Result<LedgerAccount, StartupError> {
    let store: Arc<dyn LedgerStore> = match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join("ledger.redb");
            tracing::info!(path = %path.display(), "Opening durable ledger");
            Arc::new(RedbLedgerStore::open(&path)?)
        }
        None => {
            tracing::warn!("DATA_DIR not set, ledger balances are kept in memory only");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let pepper = match &config.ledger_pepper {
        Some(pepper) => pepper.as_bytes().to_vec(),
        None => {
            if config.data_dir.is_some() {
                tracing::warn!(
                    "LEDGER_SECRET_PEPPER not set, spend keys issued now stop verifying after a restart"
                );
            }
            let mut pepper = vec![0u8; 32];
            OsRng.fill_bytes(&mut pepper);
            pepper
        }
    };
    Ok(LedgerAccount::new(store, &pepper))
}

/// `None` when the sponsor key is present but unusable; the sponsored route
/// then answers 503.
async fn build_sponsorship(
    config: &AppConfig,
    registry: &ChainRegistry,
    rpc: Arc<dyn ChainRpc>,
    locks: AccountLocks,
) -> Result<Option<Arc<GasSponsorshipCoordinator>>, StartupError> {
    let sponsor = match &config.gas_sponsor_key {
        Some(key) => match signer_from_key_material(key.expose_secret()) {
            Ok(signer) => {
                tracing::info!(sponsor = %signer.address(), "Gas sponsor key loaded");
                Some(signer)
            }
            Err(e) => {
                tracing::error!(error = %e, "GAS_SPONSOR_PRIVATE_KEY is malformed, gas sponsorship disabled");
                return Ok(None);
            }
        },
        None => {
            tracing::warn!("GAS_SPONSOR_PRIVATE_KEY not set, sponsored transfers will be refused");
            None
        }
    };

    let mut contracts: HashMap<String, Arc<dyn SponsorContract>> = HashMap::new();
    for (chain_id, address) in &config.gas_sponsor_contracts {
        let Ok(chain) = registry.get_chain(chain_id) else {
            tracing::warn!(chain_id = %chain_id, "Gas sponsor configured for a disabled chain");
            continue;
        };
        let contract = GasSponsorContract::new(chain, *address, config.rpc_timeout)?;
        contracts.insert(chain.id.clone(), Arc::new(contract));
    }
    let contracts = GasSponsorshipCoordinator::retain_deployed(contracts).await;
    tracing::info!(chains = contracts.len(), "Gas sponsorship contracts ready");

    Ok(Some(Arc::new(GasSponsorshipCoordinator::new(
        contracts,
        sponsor,
        rpc,
        locks,
        config.journal_capacity,
    ))))
}
