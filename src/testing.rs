// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles for the chain and sponsorship seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::{
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;

use crate::blockchain::erc20::IERC20;
use crate::blockchain::gas_sponsor::{
    ExecutionReceipt, SponsorCall, SponsorContract, SponsorInfo, SponsorParameters,
    SponsorReceipt, SponsoredTransaction, SponsorshipError,
};
use crate::blockchain::signing::signer_from_hex;
use crate::blockchain::transactions::{FeeParams, SignedTransfer};
use crate::blockchain::{Chain, ChainError, ChainRpc, TxReceipt};

/// Hardhat development keys.
pub const ALICE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const BOB_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const SPONSOR_KEY: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub fn signer(key: &str) -> PrivateKeySigner {
    signer_from_hex(key).unwrap()
}

pub fn address_of(key: &str) -> Address {
    signer(key).address()
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

// =============================================================================
// MockChainRpc
// =============================================================================

#[derive(Default)]
struct ChainState {
    native: HashMap<(String, Address), U256>,
    tokens: HashMap<(String, Address, Address), U256>,
    nonces: HashMap<(String, Address), u64>,
    fees: Option<FeeParams>,
    native_balance_failures: usize,
    estimate_failure: Option<ChainError>,
    send_failure: Option<ChainError>,
    receipts: HashMap<TxHash, TxReceipt>,
    sent: Vec<SignedTransfer>,
}

/// In-memory chain: applies broadcast transfers to its own balance book and
/// counts every call.
#[derive(Default)]
pub struct MockChainRpc {
    state: Mutex<ChainState>,
    calls: AtomicUsize,
}

impl MockChainRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn touch(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_native_balance(&self, chain_id: &str, holder: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        state.native.insert((chain_id.to_string(), holder), amount);
    }

    pub fn set_token_balance(&self, chain_id: &str, token: Address, holder: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        state.tokens.insert((chain_id.to_string(), token, holder), amount);
    }

    pub fn set_fees(&self, fees: FeeParams) {
        self.state.lock().unwrap().fees = Some(fees);
    }

    /// Fail the next `times` native balance reads with `RpcUnavailable`.
    pub fn fail_native_balance(&self, times: usize) {
        self.state.lock().unwrap().native_balance_failures = times;
    }

    pub fn fail_estimate(&self, error: ChainError) {
        self.state.lock().unwrap().estimate_failure = Some(error);
    }

    pub fn fail_next_send(&self, error: ChainError) {
        self.state.lock().unwrap().send_failure = Some(error);
    }

    pub fn sent(&self) -> Vec<SignedTransfer> {
        self.state.lock().unwrap().sent.clone()
    }
}

fn token_transfer(input: &[u8]) -> Result<IERC20::transferCall, ChainError> {
    IERC20::transferCall::abi_decode(input)
        .map_err(|e| ChainError::ContractCallReverted(format!("execution reverted: {e}")))
}

fn exceeds_balance() -> ChainError {
    ChainError::classify("execution reverted: ERC20: transfer amount exceeds balance")
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    async fn native_balance(&self, chain: &Chain, address: Address) -> Result<U256, ChainError> {
        let mut state = self.touch();
        if state.native_balance_failures > 0 {
            state.native_balance_failures -= 1;
            return Err(ChainError::RpcUnavailable("error sending request".into()));
        }
        Ok(state
            .native
            .get(&(chain.id.clone(), address))
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(
        &self,
        chain: &Chain,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        let state = self.touch();
        Ok(state
            .tokens
            .get(&(chain.id.clone(), token, holder))
            .copied()
            .unwrap_or_default())
    }

    async fn pending_nonce(&self, chain: &Chain, address: Address) -> Result<u64, ChainError> {
        let state = self.touch();
        Ok(state
            .nonces
            .get(&(chain.id.clone(), address))
            .copied()
            .unwrap_or_default())
    }

    async fn fee_params(&self, _chain: &Chain) -> Result<FeeParams, ChainError> {
        let state = self.touch();
        Ok(state
            .fees
            .unwrap_or(FeeParams::from_base_fee(1_000_000_000, 1_500_000_000)))
    }

    async fn estimate_gas(
        &self,
        chain: &Chain,
        request: TransactionRequest,
    ) -> Result<u64, ChainError> {
        let mut state = self.touch();
        if let Some(error) = state.estimate_failure.take() {
            return Err(error);
        }
        let input = request.input.input().cloned().unwrap_or_default();
        if input.is_empty() {
            return Ok(21_000);
        }
        let call = token_transfer(&input)?;
        let (Some(from), Some(token)) = (request.from, request.to.and_then(|to| to.to().copied()))
        else {
            return Err(ChainError::Rpc("estimate without from/to".into()));
        };
        let balance = state
            .tokens
            .get(&(chain.id.clone(), token, from))
            .copied()
            .unwrap_or_default();
        if balance < call.amount {
            return Err(exceeds_balance());
        }
        Ok(52_000)
    }

    async fn send_raw_transaction(
        &self,
        chain: &Chain,
        signed: &SignedTransfer,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.touch();
        if let Some(error) = state.send_failure.take() {
            return Err(error);
        }

        let nonce_key = (chain.id.clone(), signed.from);
        let expected = state.nonces.get(&nonce_key).copied().unwrap_or_default();
        if signed.nonce != expected {
            return Err(ChainError::classify(format!(
                "nonce too low: next nonce {expected}, tx nonce {}",
                signed.nonce
            )));
        }

        if signed.input.is_empty() {
            let from_key = (chain.id.clone(), signed.from);
            let available = state.native.get(&from_key).copied().unwrap_or_default();
            if available < signed.value {
                return Err(ChainError::classify(
                    "insufficient funds for gas * price + value",
                ));
            }
            state.native.insert(from_key, available - signed.value);
            *state
                .native
                .entry((chain.id.clone(), signed.to))
                .or_default() += signed.value;
        } else {
            let call = token_transfer(&signed.input)?;
            let from_key = (chain.id.clone(), signed.to, signed.from);
            let available = state.tokens.get(&from_key).copied().unwrap_or_default();
            if available < call.amount {
                return Err(exceeds_balance());
            }
            state.tokens.insert(from_key, available - call.amount);
            *state
                .tokens
                .entry((chain.id.clone(), signed.to, call.to))
                .or_default() += call.amount;
        }

        state.nonces.insert(nonce_key, expected + 1);
        let block_number = state.sent.len() as u64 + 1;
        state.receipts.insert(
            signed.hash,
            TxReceipt {
                tx_hash: format!("{:?}", signed.hash),
                block_number,
                gas_used: signed.gas_limit.min(52_000),
                effective_gas_price: 2_500_000_000,
                success: true,
            },
        );
        state.sent.push(signed.clone());
        Ok(signed.hash)
    }

    async fn transaction_receipt(
        &self,
        _chain: &Chain,
        hash: TxHash,
    ) -> Result<Option<TxReceipt>, ChainError> {
        Ok(self.touch().receipts.get(&hash).cloned())
    }
}

// =============================================================================
// MockSponsorContract
// =============================================================================

struct SponsorState {
    deployed: bool,
    owner: Address,
    params: SponsorParameters,
    sponsors: HashMap<Address, SponsorInfo>,
    records: HashMap<B256, SponsoredTransaction>,
    registrations: u64,
    executions: u64,
    gas_used: u64,
    fail_next_execute: Option<SponsorshipError>,
}

fn mock_hash(tag: &str, n: u64) -> B256 {
    keccak256(format!("{tag}:{n}"))
}

/// Models the GasSponsor contract's escrow and single-execution rules.
pub struct MockSponsorContract {
    address: Address,
    state: Mutex<SponsorState>,
    calls: AtomicUsize,
}

impl MockSponsorContract {
    /// Ceilings: 0.01 native minimum balance, 100 gwei, 500 000 gas.
    /// Owned by the `SPONSOR_KEY` account.
    pub fn new(address: Address) -> Arc<Self> {
        Arc::new(Self {
            address,
            state: Mutex::new(SponsorState {
                deployed: true,
                owner: address_of(SPONSOR_KEY),
                params: SponsorParameters {
                    min_sponsor_balance: U256::from(10_000_000_000_000_000u64),
                    max_gas_price: U256::from(100_000_000_000u64),
                    max_gas_limit: U256::from(500_000u64),
                },
                sponsors: HashMap::new(),
                records: HashMap::new(),
                registrations: 0,
                executions: 0,
                gas_used: 48_000,
                fail_next_execute: None,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn touch(&self) -> std::sync::MutexGuard<'_, SponsorState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn add_sponsor(&self, sponsor: Address, balance: U256) {
        self.state.lock().unwrap().sponsors.insert(
            sponsor,
            SponsorInfo {
                balance,
                is_active: true,
                total_sponsored: U256::ZERO,
                last_sponsored: U256::ZERO,
            },
        );
    }

    pub fn set_deployed(&self, deployed: bool) {
        self.state.lock().unwrap().deployed = deployed;
    }

    /// Gas consumed by each successful execution.
    pub fn set_gas_used(&self, gas_used: u64) {
        self.state.lock().unwrap().gas_used = gas_used;
    }

    pub fn fail_next_execute(&self, error: SponsorshipError) {
        self.state.lock().unwrap().fail_next_execute = Some(error);
    }

    pub fn balance_of(&self, sponsor: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .sponsors
            .get(&sponsor)
            .map(|info| info.balance)
            .unwrap_or_default()
    }

    pub fn registrations(&self) -> u64 {
        self.state.lock().unwrap().registrations
    }

    /// Register directly, bypassing any coordinator.
    pub fn register(
        &self,
        sponsor: &PrivateKeySigner,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, SponsorshipError> {
        let mut state = self.state.lock().unwrap();
        Self::register_locked(&mut state, sponsor.address(), call)
    }

    fn register_locked(
        state: &mut SponsorState,
        sponsor: Address,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, SponsorshipError> {
        let params = state.params;
        let info = state
            .sponsors
            .get(&sponsor)
            .filter(|info| info.is_active)
            .copied()
            .ok_or(SponsorshipError::NotActiveSponsor)?;
        if call.from == call.to {
            return Err(SponsorshipError::SelfSponsorshipForbidden);
        }
        if U256::from(call.gas_price) > params.max_gas_price {
            return Err(SponsorshipError::GasPriceTooHigh(call.gas_price.to_string()));
        }
        if U256::from(call.gas_limit) > params.max_gas_limit {
            return Err(SponsorshipError::GasLimitTooHigh(call.gas_limit.to_string()));
        }
        if info.balance < params.min_sponsor_balance || info.balance < call.estimated_cost() {
            return Err(SponsorshipError::InsufficientSponsorBalance(
                info.balance.to_string(),
            ));
        }

        state.registrations += 1;
        let n = state.registrations;
        let id = mock_hash("sponsored", n);
        let registration = mock_hash("register", n);
        state.records.insert(
            id,
            SponsoredTransaction {
                from_address: call.from,
                to_address: call.to,
                gas_limit: U256::from(call.gas_limit),
                gas_price: U256::from(call.gas_price),
                sponsor_address: sponsor,
                executed: false,
                actual_gas_used: U256::ZERO,
                total_cost: U256::ZERO,
            },
        );
        Ok(SponsorReceipt {
            sponsored_tx_hash: id,
            registration_tx_hash: registration,
        })
    }
}

#[async_trait]
impl SponsorContract for MockSponsorContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn is_deployed(&self) -> Result<bool, SponsorshipError> {
        Ok(self.touch().deployed)
    }

    async fn parameters(&self) -> Result<SponsorParameters, SponsorshipError> {
        Ok(self.touch().params)
    }

    async fn sponsor_info(&self, sponsor: Address) -> Result<SponsorInfo, SponsorshipError> {
        Ok(self
            .touch()
            .sponsors
            .get(&sponsor)
            .copied()
            .unwrap_or(SponsorInfo {
                balance: U256::ZERO,
                is_active: false,
                total_sponsored: U256::ZERO,
                last_sponsored: U256::ZERO,
            }))
    }

    async fn sponsored_transaction(
        &self,
        sponsored_tx_hash: B256,
    ) -> Result<Option<SponsoredTransaction>, SponsorshipError> {
        Ok(self.touch().records.get(&sponsored_tx_hash).cloned())
    }

    async fn sponsor_transaction(
        &self,
        sponsor: &PrivateKeySigner,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, SponsorshipError> {
        let mut state = self.touch();
        Self::register_locked(&mut state, sponsor.address(), call)
    }

    async fn execute_sponsored_transaction(
        &self,
        initiator: &PrivateKeySigner,
        sponsored_tx_hash: B256,
        _data: Bytes,
    ) -> Result<ExecutionReceipt, SponsorshipError> {
        let mut state = self.touch();
        let record = state
            .records
            .get(&sponsored_tx_hash)
            .cloned()
            .ok_or_else(|| {
                SponsorshipError::UnknownSponsoredTransaction(format!("{sponsored_tx_hash:?}"))
            })?;
        if record.executed {
            return Err(SponsorshipError::AlreadyExecuted(format!(
                "{sponsored_tx_hash:?}"
            )));
        }
        if initiator.address() != record.from_address {
            return Err(SponsorshipError::NotInitiator);
        }
        if let Some(error) = state.fail_next_execute.take() {
            return Err(error);
        }

        let gas_used = state.gas_used;
        let cost = U256::from(gas_used) * record.gas_price;
        state.executions += 1;
        let executions = state.executions;
        let sponsor = state
            .sponsors
            .get_mut(&record.sponsor_address)
            .ok_or(SponsorshipError::NotActiveSponsor)?;
        if sponsor.balance < cost {
            return Err(SponsorshipError::InsufficientSponsorBalance(
                sponsor.balance.to_string(),
            ));
        }
        sponsor.balance -= cost;
        sponsor.total_sponsored += cost;
        sponsor.last_sponsored = U256::from(executions);

        if let Some(stored) = state.records.get_mut(&sponsored_tx_hash) {
            stored.executed = true;
            stored.actual_gas_used = U256::from(gas_used);
            stored.total_cost = cost;
        }
        Ok(ExecutionReceipt {
            execution_tx_hash: mock_hash("execute", executions),
            gas_used,
            effective_gas_price: record.gas_price.to::<u128>(),
        })
    }

    async fn add_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let mut state = self.touch();
        let info = state
            .sponsors
            .get_mut(&sponsor.address())
            .filter(|info| info.is_active)
            .ok_or(SponsorshipError::NotActiveSponsor)?;
        info.balance += amount;
        Ok(mock_hash("funds", amount.to::<u64>()))
    }

    async fn withdraw_funds(
        &self,
        sponsor: &PrivateKeySigner,
        amount: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let mut state = self.touch();
        let info = state
            .sponsors
            .get_mut(&sponsor.address())
            .filter(|info| info.is_active)
            .ok_or(SponsorshipError::NotActiveSponsor)?;
        if info.balance < amount {
            return Err(SponsorshipError::InsufficientSponsorBalance(
                info.balance.to_string(),
            ));
        }
        info.balance -= amount;
        Ok(mock_hash("funds", amount.to::<u64>()))
    }

    async fn register_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
        deposit: U256,
    ) -> Result<TxHash, SponsorshipError> {
        let mut state = self.touch();
        if owner.address() != state.owner {
            return Err(SponsorshipError::ContractReverted(
                "Ownable: caller is not the owner".into(),
            ));
        }
        if state.sponsors.get(&sponsor).is_some_and(|info| info.is_active) {
            return Err(SponsorshipError::SponsorAlreadyExists(sponsor.to_string()));
        }
        if deposit < state.params.min_sponsor_balance {
            return Err(SponsorshipError::InsufficientSponsorBalance(
                "Insufficient initial balance".into(),
            ));
        }
        state.sponsors.insert(
            sponsor,
            SponsorInfo {
                balance: deposit,
                is_active: true,
                total_sponsored: U256::ZERO,
                last_sponsored: U256::ZERO,
            },
        );
        Ok(keccak256(format!("add-sponsor:{sponsor}")))
    }

    async fn remove_sponsor(
        &self,
        owner: &PrivateKeySigner,
        sponsor: Address,
    ) -> Result<TxHash, SponsorshipError> {
        let mut state = self.touch();
        if owner.address() != state.owner {
            return Err(SponsorshipError::ContractReverted(
                "Ownable: caller is not the owner".into(),
            ));
        }
        let info = state
            .sponsors
            .get_mut(&sponsor)
            .filter(|info| info.is_active)
            .ok_or(SponsorshipError::NotActiveSponsor)?;
        info.is_active = false;
        info.balance = U256::ZERO;
        Ok(keccak256(format!("remove-sponsor:{sponsor}")))
    }
}

// =============================================================================
// Application wiring
// =============================================================================

/// Services backed by `rpc`, an in-memory ledger and no sponsorship.
pub fn test_services(rpc: Arc<MockChainRpc>, admin_token: Option<&str>) -> crate::state::Services {
    use crate::blockchain::{ChainRegistry, RegistryOverrides};
    use crate::ledger::{InMemoryLedgerStore, LedgerAccount};

    crate::state::Services {
        registry: Arc::new(ChainRegistry::standard(&RegistryOverrides::default()).unwrap()),
        rpc,
        explorer: None,
        ledger: LedgerAccount::new(Arc::new(InMemoryLedgerStore::new()), b"pepper"),
        locks: crate::blockchain::locks::AccountLocks::new(),
        sponsorship: None,
        admin_token: admin_token.map(str::to_string),
    }
}
