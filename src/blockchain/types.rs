// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain and token types, plus the static chain/token tables.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Whether a chain is a production network or a test network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

/// A chain's base currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A supported chain.
///
/// `rpc_endpoint` is `None` exactly when the chain is the internal ledger.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Registry key, e.g. `flowTestnet`.
    pub id: String,
    pub display_name: String,
    pub network: Network,
    pub rpc_endpoint: Option<Url>,
    /// EIP-155 chain id (synthetic for the ledger chain).
    pub numeric_chain_id: u64,
    pub native_currency: NativeCurrency,
    pub explorer_url: Option<String>,
    /// Etherscan-compatible API used as the native-balance fallback.
    pub explorer_api_url: Option<String>,
    pub enabled: bool,
}

impl Chain {
    pub fn is_ledger(&self) -> bool {
        self.rpc_endpoint.is_none()
    }

    /// Explorer link for a transaction hash, if the chain has an explorer.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }
}

/// How a token moves on a given chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TokenClass {
    Native,
    Erc20,
    LedgerAsset,
}

/// A token's presence on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeployment {
    /// `None` means the token is the chain's own native asset.
    pub contract_address: Option<Address>,
    pub decimals: u8,
}

/// A supported token with its per-chain deployments.
#[derive(Debug, Clone)]
pub struct Token {
    /// Upper-case symbol.
    pub symbol: String,
    pub display_name: String,
    pub global_decimals: u8,
    pub class: TokenClass,
    /// Keyed by chain id. Absence means unsupported on that chain.
    pub per_chain: BTreeMap<String, TokenDeployment>,
}

/// Result of resolving a token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOnChain {
    pub symbol: String,
    pub class: TokenClass,
    pub contract_address: Option<Address>,
    pub decimals: u8,
}

/// Token balance information.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Token symbol (e.g., "ETH", "USDC")
    pub symbol: String,
    pub chain_id: String,
    pub address: String,
    /// Balance in the smallest unit
    pub balance_raw: String,
    /// Balance formatted with decimals
    pub balance_formatted: String,
    pub decimals: u8,
    /// Contract address (None for native and ledger assets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    /// Where the value came from: `rpc`, `explorer` or `ledger`.
    pub source: String,
}

// =============================================================================
// Static tables
// =============================================================================

/// Static chain definition. `rpc_env` names the variable that overrides the
/// default endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ChainDefinition {
    pub id: &'static str,
    pub display_name: &'static str,
    pub network: Network,
    pub numeric_chain_id: u64,
    pub native: (&'static str, &'static str, u8),
    pub rpc_url: Option<&'static str>,
    pub rpc_env: Option<&'static str>,
    pub explorer_url: Option<&'static str>,
    pub explorer_api_url: Option<&'static str>,
}

/// Static token definition: one row per deployment `(chain id, address, decimals)`.
#[derive(Debug, Clone, Copy)]
pub struct TokenDefinition {
    pub symbol: &'static str,
    pub display_name: &'static str,
    pub decimals: u8,
    pub class: TokenClass,
    pub deployments: &'static [(&'static str, Option<&'static str>, u8)],
}

/// Identifier of the internal ledger chain.
pub const LEDGER_CHAIN_ID: &str = "nullnet";

pub const CHAINS: &[ChainDefinition] = &[
    ChainDefinition {
        id: "ethereum",
        display_name: "Ethereum Mainnet",
        network: Network::Mainnet,
        numeric_chain_id: 1,
        native: ("Ether", "ETH", 18),
        rpc_url: Some("https://eth.llamarpc.com"),
        rpc_env: Some("ETH_RPC_URL"),
        explorer_url: Some("https://etherscan.io"),
        explorer_api_url: Some("https://api.etherscan.io/api"),
    },
    ChainDefinition {
        id: "sepolia",
        display_name: "Sepolia Testnet",
        network: Network::Testnet,
        numeric_chain_id: 11_155_111,
        native: ("Sepolia Ether", "ETH", 18),
        rpc_url: Some("https://rpc.sepolia.org"),
        rpc_env: Some("SEPOLIA_RPC_URL"),
        explorer_url: Some("https://sepolia.etherscan.io"),
        explorer_api_url: Some("https://api-sepolia.etherscan.io/api"),
    },
    ChainDefinition {
        id: "polygon",
        display_name: "Polygon Mainnet",
        network: Network::Mainnet,
        numeric_chain_id: 137,
        native: ("Polygon", "MATIC", 18),
        rpc_url: Some("https://polygon-rpc.com"),
        rpc_env: Some("POLYGON_RPC_URL"),
        explorer_url: Some("https://polygonscan.com"),
        explorer_api_url: Some("https://api.polygonscan.com/api"),
    },
    ChainDefinition {
        id: "mumbai",
        display_name: "Polygon Mumbai",
        network: Network::Testnet,
        numeric_chain_id: 80_001,
        native: ("Polygon", "MATIC", 18),
        rpc_url: Some("https://rpc-mumbai.maticvigil.com"),
        rpc_env: Some("MUMBAI_RPC_URL"),
        explorer_url: Some("https://mumbai.polygonscan.com"),
        explorer_api_url: Some("https://api-testnet.polygonscan.com/api"),
    },
    ChainDefinition {
        id: "bsc",
        display_name: "BNB Smart Chain",
        network: Network::Mainnet,
        numeric_chain_id: 56,
        native: ("BNB", "BNB", 18),
        rpc_url: Some("https://bsc-dataseed.binance.org"),
        rpc_env: Some("BSC_RPC_URL"),
        explorer_url: Some("https://bscscan.com"),
        explorer_api_url: Some("https://api.bscscan.com/api"),
    },
    ChainDefinition {
        id: "bscTestnet",
        display_name: "BNB Smart Chain Testnet",
        network: Network::Testnet,
        numeric_chain_id: 97,
        native: ("BNB", "BNB", 18),
        rpc_url: Some("https://data-seed-prebsc-1-s1.binance.org:8545"),
        rpc_env: Some("BSC_TESTNET_RPC_URL"),
        explorer_url: Some("https://testnet.bscscan.com"),
        explorer_api_url: Some("https://api-testnet.bscscan.com/api"),
    },
    ChainDefinition {
        id: "flowTestnet",
        display_name: "Flow EVM Testnet",
        network: Network::Testnet,
        numeric_chain_id: 545,
        native: ("Flow", "FLOW", 18),
        rpc_url: Some("https://testnet.evm.nodes.onflow.org"),
        rpc_env: Some("FLOW_TESTNET_RPC_URL"),
        explorer_url: Some("https://evm-testnet.flowscan.io"),
        explorer_api_url: Some("https://evm-testnet.flowscan.io/api"),
    },
    ChainDefinition {
        id: LEDGER_CHAIN_ID,
        display_name: "NullNet",
        network: Network::Testnet,
        numeric_chain_id: 999_999,
        native: ("NullNet Token", "NULL", 18),
        rpc_url: None,
        rpc_env: None,
        explorer_url: None,
        explorer_api_url: None,
    },
];

pub const TOKENS: &[TokenDefinition] = &[
    // Native assets
    TokenDefinition {
        symbol: "ETH",
        display_name: "Ether",
        decimals: 18,
        class: TokenClass::Native,
        deployments: &[("ethereum", None, 18), ("sepolia", None, 18)],
    },
    TokenDefinition {
        symbol: "MATIC",
        display_name: "Polygon",
        decimals: 18,
        class: TokenClass::Native,
        deployments: &[("polygon", None, 18), ("mumbai", None, 18)],
    },
    TokenDefinition {
        symbol: "BNB",
        display_name: "BNB",
        decimals: 18,
        class: TokenClass::Native,
        deployments: &[("bsc", None, 18), ("bscTestnet", None, 18)],
    },
    TokenDefinition {
        symbol: "FLOW",
        display_name: "Flow",
        decimals: 18,
        class: TokenClass::Native,
        deployments: &[("flowTestnet", None, 18)],
    },
    TokenDefinition {
        symbol: "NULL",
        display_name: "NullNet Token",
        decimals: 18,
        class: TokenClass::Native,
        deployments: &[(LEDGER_CHAIN_ID, None, 18)],
    },
    // ERC-20 tokens
    TokenDefinition {
        symbol: "USDT",
        display_name: "Tether USD",
        decimals: 6,
        class: TokenClass::Erc20,
        deployments: &[
            ("ethereum", Some("0xdAC17F958D2ee523a2206206994597C13D831ec7"), 6),
            ("sepolia", Some("0x6f14C02Fc1F78322cFd7d707aB90f18baD3B54f5"), 6),
            ("polygon", Some("0xc2132D05D31c914a87C6611C10748AEb04B58e8F"), 6),
            ("mumbai", Some("0xA02f6adc7926efeBBd59Fd43A84f4E0c0c91e832"), 6),
            ("bsc", Some("0x55d398326f99059fF775485246999027B3197955"), 18),
            ("bscTestnet", Some("0x337610d27c682E347C9cD60BD4b3b107C9d34dDd"), 18),
        ],
    },
    TokenDefinition {
        symbol: "USDC",
        display_name: "USD Coin",
        decimals: 6,
        class: TokenClass::Erc20,
        deployments: &[
            ("ethereum", Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6),
            ("sepolia", Some("0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"), 6),
            ("polygon", Some("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"), 6),
            ("mumbai", Some("0xe6b8a5CF854791412c1f6EFC7CAf629f5Df1c747"), 6),
        ],
    },
    TokenDefinition {
        symbol: "BUSD",
        display_name: "Binance USD",
        decimals: 18,
        class: TokenClass::Erc20,
        deployments: &[
            ("bsc", Some("0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56"), 18),
            ("bscTestnet", Some("0x78867BbEeF44f2326bF8DDd1941a4439382EF2A7"), 18),
        ],
    },
    TokenDefinition {
        symbol: "CAKE",
        display_name: "PancakeSwap Token",
        decimals: 18,
        class: TokenClass::Erc20,
        deployments: &[("bsc", Some("0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82"), 18)],
    },
    TokenDefinition {
        symbol: "DAI",
        display_name: "Dai Stablecoin",
        decimals: 18,
        class: TokenClass::Erc20,
        deployments: &[
            ("ethereum", Some("0x6B175474E89094C44Da98b954EedeAC495271d0F"), 18),
            ("polygon", Some("0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063"), 18),
        ],
    },
    // NullNet ledger assets
    TokenDefinition {
        symbol: "GOLD",
        display_name: "Gold",
        decimals: 18,
        class: TokenClass::LedgerAsset,
        deployments: &[(LEDGER_CHAIN_ID, None, 18)],
    },
    TokenDefinition {
        symbol: "SILVER",
        display_name: "Silver",
        decimals: 18,
        class: TokenClass::LedgerAsset,
        deployments: &[(LEDGER_CHAIN_ID, None, 18)],
    },
    TokenDefinition {
        symbol: "PLATINUM",
        display_name: "Platinum",
        decimals: 18,
        class: TokenClass::LedgerAsset,
        deployments: &[(LEDGER_CHAIN_ID, None, 18)],
    },
    TokenDefinition {
        symbol: "DIAMOND",
        display_name: "Diamond",
        decimals: 18,
        class: TokenClass::LedgerAsset,
        deployments: &[(LEDGER_CHAIN_ID, None, 18)],
    },
];
