// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only balance queries across EVM chains and the ledger.
//!
//! Native EVM balances are read with a bounded retry and then fall back to
//! the chain's block explorer. Token balances and ledger balances are read
//! once.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};

use crate::blockchain::signing::parse_address;
use crate::blockchain::transactions::format_amount;
use crate::blockchain::{
    explorer::ExplorerClient, Chain, ChainError, ChainRegistry, ChainRpc, TokenBalance,
    TokenClass, TokenOnChain,
};
use crate::ledger::LedgerAccount;
use crate::transfer::TransferError;

/// Attempts and spacing for native balance reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct BalanceReader {
    registry: Arc<ChainRegistry>,
    rpc: Arc<dyn ChainRpc>,
    explorer: Option<Arc<ExplorerClient>>,
    ledger: LedgerAccount,
    retry: RetryPolicy,
}

impl BalanceReader {
    pub fn new(
        registry: Arc<ChainRegistry>,
        rpc: Arc<dyn ChainRpc>,
        explorer: Option<Arc<ExplorerClient>>,
        ledger: LedgerAccount,
    ) -> Self {
        Self {
            registry,
            rpc,
            explorer,
            ledger,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Balance of the chain's native currency.
    pub async fn native_balance(
        &self,
        chain_id: &str,
        address: &str,
    ) -> Result<TokenBalance, TransferError> {
        let chain = self.registry.get_chain(chain_id)?;
        let symbol = chain.native_currency.symbol.clone();
        let token = self.registry.get_token_on_chain(&symbol, &chain.id)?;
        self.read(chain, &token, address).await
    }

    /// Balance of a named token on a chain.
    pub async fn token_balance(
        &self,
        chain_id: &str,
        symbol: &str,
        address: &str,
    ) -> Result<TokenBalance, TransferError> {
        let (chain, token) = self.registry.validate_chain_and_token(chain_id, symbol)?;
        self.read(chain, &token, address).await
    }

    async fn read(
        &self,
        chain: &Chain,
        token: &TokenOnChain,
        address: &str,
    ) -> Result<TokenBalance, TransferError> {
        if chain.is_ledger() {
            let raw = self.ledger.get_balance(address.trim(), &token.symbol)?;
            return Ok(balance(chain, token, address.trim().to_string(), raw, "ledger"));
        }

        let holder = parse_address(address).map_err(|e| TransferError::InvalidRequest(e.to_string()))?;
        let (raw, source) = match (token.class, token.contract_address) {
            (TokenClass::Erc20, Some(contract)) => {
                let raw = self
                    .rpc
                    .token_balance(chain, contract, holder)
                    .await
                    .map_err(TransferError::chain(chain))?;
                (raw, "rpc")
            }
            _ => self.native_with_fallback(chain, holder).await?,
        };
        Ok(balance(chain, token, format!("{holder:?}"), raw, source))
    }

    async fn native_with_fallback(
        &self,
        chain: &Chain,
        holder: Address,
    ) -> Result<(U256, &'static str), TransferError> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = ChainError::RpcUnavailable("no attempt made".into());

        for attempt in 1..=attempts {
            match self.rpc.native_balance(chain, holder).await {
                Ok(raw) => return Ok((raw, "rpc")),
                Err(e) => {
                    tracing::warn!(
                        chain_id = %chain.id,
                        attempt,
                        error = %e,
                        "Native balance read failed"
                    );
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.retry.backoff).await;
            }
        }

        let Some(explorer) = self.explorer.as_ref() else {
            return Err(TransferError::chain(chain)(last_error));
        };
        match explorer.native_balance(chain, holder).await {
            Ok(raw) => {
                tracing::info!(chain_id = %chain.id, "Native balance served by explorer");
                Ok((raw, "explorer"))
            }
            Err(e) => {
                tracing::warn!(chain_id = %chain.id, error = %e, "Explorer fallback failed");
                Err(TransferError::chain(chain)(last_error))
            }
        }
    }
}

fn balance(
    chain: &Chain,
    token: &TokenOnChain,
    address: String,
    raw: U256,
    source: &str,
) -> TokenBalance {
    TokenBalance {
        symbol: token.symbol.clone(),
        chain_id: chain.id.clone(),
        address,
        balance_raw: raw.to_string(),
        balance_formatted: format_amount(raw, token.decimals),
        decimals: token.decimals,
        contract_address: token.contract_address.map(|a| format!("{a:?}")),
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::RegistryOverrides;
    use crate::ledger::{InMemoryLedgerStore, LedgerError};
    use crate::testing::{address_of, ether, MockChainRpc, ALICE_KEY};

    fn reader(rpc: Arc<MockChainRpc>) -> (BalanceReader, LedgerAccount) {
        let registry = Arc::new(ChainRegistry::standard(&RegistryOverrides::default()).unwrap());
        let ledger = LedgerAccount::new(Arc::new(InMemoryLedgerStore::new()), b"pepper");
        let reader = BalanceReader::new(registry, rpc, None, ledger.clone()).with_retry(RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        });
        (reader, ledger)
    }

    #[tokio::test]
    async fn native_read_retries_transient_failures() {
        let rpc = MockChainRpc::new();
        let alice = address_of(ALICE_KEY);
        rpc.set_native_balance("sepolia", alice, ether(2));
        rpc.fail_native_balance(2);
        let (reader, _) = reader(rpc.clone());

        let balance = reader
            .native_balance("sepolia", &format!("{alice:?}"))
            .await
            .unwrap();
        assert_eq!(balance.symbol, "ETH");
        assert_eq!(balance.balance_formatted, "2");
        assert_eq!(balance.source, "rpc");
        assert_eq!(rpc.calls(), 3);
    }

    #[tokio::test]
    async fn native_read_gives_up_after_three_attempts() {
        let rpc = MockChainRpc::new();
        rpc.fail_native_balance(5);
        let (reader, _) = reader(rpc.clone());

        let err = reader
            .native_balance("11155111", &format!("{:?}", address_of(ALICE_KEY)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Chain {
                source: ChainError::RpcUnavailable(_),
                ..
            }
        ));
        assert_eq!(rpc.calls(), 3);
    }

    #[tokio::test]
    async fn token_read_uses_contract_decimals() {
        let rpc = MockChainRpc::new();
        let alice = address_of(ALICE_KEY);
        let (reader, _) = reader(rpc.clone());
        let usdc = reader
            .registry
            .get_token_on_chain("USDC", "sepolia")
            .unwrap()
            .contract_address
            .unwrap();
        rpc.set_token_balance("sepolia", usdc, alice, U256::from(1_250_000u64));

        let balance = reader
            .token_balance("sepolia", "usdc", &format!("{alice:?}"))
            .await
            .unwrap();
        assert_eq!(balance.balance_formatted, "1.25");
        assert_eq!(balance.decimals, 6);
        assert!(balance.contract_address.is_some());
    }

    #[tokio::test]
    async fn ledger_reads_do_not_touch_rpc() {
        let rpc = MockChainRpc::new();
        let (reader, ledger) = reader(rpc.clone());
        let account = ledger.open_account().unwrap();
        ledger.credit(&account.address, "SILVER", ether(7)).unwrap();

        let balance = reader
            .token_balance("nullnet", "SILVER", &account.address)
            .await
            .unwrap();
        assert_eq!(balance.balance_formatted, "7");
        assert_eq!(balance.source, "ledger");

        let err = reader
            .native_balance("nullnet", "0x1234")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Ledger(LedgerError::InvalidAddressFormat(_))
        ));
        assert_eq!(rpc.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_evm_address_is_rejected() {
        let rpc = MockChainRpc::new();
        let (reader, _) = reader(rpc.clone());
        let err = reader.native_balance("polygon", "not-an-address").await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidRequest(_)));
        assert_eq!(rpc.calls(), 0);
    }
}
