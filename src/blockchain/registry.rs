// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Directory of supported chains and tokens.
//!
//! Every component resolves chains and tokens here before touching an RPC
//! endpoint or the ledger. Lookups are synchronous and side-effect free.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy::primitives::Address;
use url::Url;

use super::types::{
    Chain, NativeCurrency, Token, TokenClass, TokenDeployment, TokenOnChain, CHAINS, TOKENS,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Chain {0} is not supported")]
    UnsupportedChain(String),

    #[error("Token {symbol} is not supported on chain {chain_id}")]
    UnsupportedToken { symbol: String, chain_id: String },

    #[error("Invalid registry configuration: {0}")]
    InvalidConfiguration(String),
}

/// An additional ERC-20 deployment registered from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDeploymentOverride {
    pub symbol: String,
    pub chain_id: String,
    pub contract_address: Address,
    pub decimals: u8,
}

impl TokenDeploymentOverride {
    /// Parse `SYMBOL@chainId=0xaddress:decimals[,...]`.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, RegistryError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    fn parse(entry: &str) -> Result<Self, RegistryError> {
        let invalid = || {
            RegistryError::InvalidConfiguration(format!(
                "expected SYMBOL@chain=0xaddress:decimals, got `{entry}`"
            ))
        };
        let (symbol, rest) = entry.split_once('@').ok_or_else(invalid)?;
        let (chain_id, rest) = rest.split_once('=').ok_or_else(invalid)?;
        let (address, decimals) = rest.split_once(':').ok_or_else(invalid)?;
        let contract_address = address.trim().parse::<Address>().map_err(|_| invalid())?;
        let decimals = decimals.trim().parse::<u8>().map_err(|_| invalid())?;
        if symbol.trim().is_empty() || chain_id.trim().is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            chain_id: chain_id.trim().to_string(),
            contract_address,
            decimals,
        })
    }
}

/// Startup adjustments applied on top of the static tables.
#[derive(Debug, Clone, Default)]
pub struct RegistryOverrides {
    /// Chain id → RPC endpoint.
    pub rpc_urls: HashMap<String, Url>,
    pub disabled_chains: HashSet<String>,
    pub extra_deployments: Vec<TokenDeploymentOverride>,
}

/// Immutable chain and token directory.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<Chain>,
    tokens: BTreeMap<String, Token>,
}

impl ChainRegistry {
    /// Build from explicit chains and tokens, enforcing the registry invariants.
    pub fn new(chains: Vec<Chain>, tokens: Vec<Token>) -> Result<Self, RegistryError> {
        let registry = Self {
            chains,
            tokens: tokens
                .into_iter()
                .map(|token| (token.symbol.to_ascii_uppercase(), token))
                .collect(),
        };
        registry.check_invariants()?;
        Ok(registry)
    }

    /// The built-in chain and token tables with overrides applied.
    pub fn standard(overrides: &RegistryOverrides) -> Result<Self, RegistryError> {
        let mut chains = Vec::with_capacity(CHAINS.len());
        for def in CHAINS {
            let rpc_endpoint = match overrides.rpc_urls.get(def.id) {
                Some(url) if def.rpc_url.is_some() => Some(url.clone()),
                Some(_) => {
                    return Err(RegistryError::InvalidConfiguration(format!(
                        "chain {} has no RPC endpoint to override",
                        def.id
                    )))
                }
                None => def
                    .rpc_url
                    .map(Url::parse)
                    .transpose()
                    .map_err(|e| RegistryError::InvalidConfiguration(e.to_string()))?,
            };
            chains.push(Chain {
                id: def.id.to_string(),
                display_name: def.display_name.to_string(),
                network: def.network,
                rpc_endpoint,
                numeric_chain_id: def.numeric_chain_id,
                native_currency: NativeCurrency {
                    name: def.native.0.to_string(),
                    symbol: def.native.1.to_string(),
                    decimals: def.native.2,
                },
                explorer_url: def.explorer_url.map(str::to_string),
                explorer_api_url: def.explorer_api_url.map(str::to_string),
                enabled: !overrides.disabled_chains.contains(def.id),
            });
        }

        let mut tokens: BTreeMap<String, Token> = BTreeMap::new();
        for def in TOKENS {
            let mut per_chain = BTreeMap::new();
            for (chain_id, address, decimals) in def.deployments {
                let contract_address = address
                    .map(|a| a.parse::<Address>())
                    .transpose()
                    .map_err(|e| RegistryError::InvalidConfiguration(e.to_string()))?;
                per_chain.insert(
                    chain_id.to_string(),
                    TokenDeployment {
                        contract_address,
                        decimals: *decimals,
                    },
                );
            }
            tokens.insert(
                def.symbol.to_string(),
                Token {
                    symbol: def.symbol.to_string(),
                    display_name: def.display_name.to_string(),
                    global_decimals: def.decimals,
                    class: def.class,
                    per_chain,
                },
            );
        }

        for extra in &overrides.extra_deployments {
            let token = tokens
                .entry(extra.symbol.clone())
                .or_insert_with(|| Token {
                    symbol: extra.symbol.clone(),
                    display_name: extra.symbol.clone(),
                    global_decimals: extra.decimals,
                    class: TokenClass::Erc20,
                    per_chain: BTreeMap::new(),
                });
            if token.class != TokenClass::Erc20 {
                return Err(RegistryError::InvalidConfiguration(format!(
                    "{} is not an ERC-20 token",
                    extra.symbol
                )));
            }
            token.per_chain.insert(
                extra.chain_id.clone(),
                TokenDeployment {
                    contract_address: Some(extra.contract_address),
                    decimals: extra.decimals,
                },
            );
        }

        Self::new(chains, tokens.into_values().collect())
    }

    fn check_invariants(&self) -> Result<(), RegistryError> {
        let ledger_count = self.chains.iter().filter(|c| c.is_ledger()).count();
        if ledger_count > 1 {
            return Err(RegistryError::InvalidConfiguration(
                "more than one ledger chain".into(),
            ));
        }
        for token in self.tokens.values() {
            for (chain_id, deployment) in &token.per_chain {
                let chain = self
                    .chains
                    .iter()
                    .find(|c| &c.id == chain_id)
                    .ok_or_else(|| {
                        RegistryError::InvalidConfiguration(format!(
                            "{} is deployed on unknown chain {chain_id}",
                            token.symbol
                        ))
                    })?;
                let is_native = chain.native_currency.symbol == token.symbol;
                let consistent = match (token.class, deployment.contract_address) {
                    (TokenClass::Native, None) => is_native,
                    (TokenClass::Erc20, Some(_)) => !chain.is_ledger(),
                    (TokenClass::LedgerAsset, None) => chain.is_ledger(),
                    _ => false,
                };
                if !consistent {
                    return Err(RegistryError::InvalidConfiguration(format!(
                        "{} has an inconsistent deployment on {chain_id}",
                        token.symbol
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up an enabled chain by registry key (case-insensitive) or numeric id.
    pub fn get_chain(&self, chain_id: &str) -> Result<&Chain, RegistryError> {
        let needle = chain_id.trim();
        let numeric = needle.parse::<u64>().ok();
        self.chains
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(needle) || Some(c.numeric_chain_id) == numeric)
            .filter(|c| c.enabled)
            .ok_or_else(|| RegistryError::UnsupportedChain(chain_id.to_string()))
    }

    pub fn list_enabled_chains(&self) -> Vec<&Chain> {
        self.chains.iter().filter(|c| c.enabled).collect()
    }

    pub fn ledger_chain(&self) -> Option<&Chain> {
        self.chains.iter().find(|c| c.is_ledger() && c.enabled)
    }

    pub fn get_token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(&symbol.trim().to_ascii_uppercase())
    }

    pub fn get_token_on_chain(
        &self,
        symbol: &str,
        chain_id: &str,
    ) -> Result<TokenOnChain, RegistryError> {
        let chain = self.get_chain(chain_id)?;
        let unsupported = || RegistryError::UnsupportedToken {
            symbol: symbol.to_string(),
            chain_id: chain.id.clone(),
        };
        let token = self.get_token(symbol).ok_or_else(unsupported)?;
        let deployment = token.per_chain.get(&chain.id).ok_or_else(unsupported)?;
        Ok(TokenOnChain {
            symbol: token.symbol.clone(),
            class: token.class,
            contract_address: deployment.contract_address,
            decimals: deployment.decimals,
        })
    }

    /// Resolve both halves of a transfer target in one call.
    pub fn validate_chain_and_token(
        &self,
        chain_id: &str,
        symbol: &str,
    ) -> Result<(&Chain, TokenOnChain), RegistryError> {
        let chain = self.get_chain(chain_id)?;
        let token = self.get_token_on_chain(symbol, &chain.id)?;
        Ok((chain, token))
    }

    /// Tokens available on one chain, native first.
    pub fn tokens_on_chain(&self, chain_id: &str) -> Result<Vec<TokenOnChain>, RegistryError> {
        let chain = self.get_chain(chain_id)?;
        let mut tokens: Vec<TokenOnChain> = self
            .tokens
            .values()
            .filter_map(|token| {
                token.per_chain.get(&chain.id).map(|d| TokenOnChain {
                    symbol: token.symbol.clone(),
                    class: token.class,
                    contract_address: d.contract_address,
                    decimals: d.decimals,
                })
            })
            .collect();
        tokens.sort_by_key(|t| t.class != TokenClass::Native);
        Ok(tokens)
    }

    /// Every `(chain id, token symbol)` pair on enabled chains.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.tokens
            .values()
            .flat_map(|token| {
                token
                    .per_chain
                    .keys()
                    .filter(|chain_id| self.get_chain(chain_id).is_ok())
                    .map(move |chain_id| (chain_id.clone(), token.symbol.clone()))
            })
            .collect()
    }
}
