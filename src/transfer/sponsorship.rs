// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gas-sponsored ERC-20 transfers.
//!
//! A sponsored transfer is two contract calls. The sponsor registers the
//! call (`sponsorTransaction`), which books the gas against its escrow and
//! yields a `sponsoredTxHash`; the user then executes the registered call
//! data (`executeSponsoredTransaction`). Each call is atomic on chain.
//!
//! When a request carries an idempotency key, the [`SponsorshipJournal`]
//! remembers the registration so a retry after a failed execution reuses
//! the same pending record instead of registering a second one.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use alloy::{
    primitives::{Address, TxHash, B256, U256},
    signers::local::PrivateKeySigner,
};
use chrono::Utc;
use lru::LruCache;

use super::types::{
    SponsorshipDetails, SponsorshipPhase, TransferError, TransferResult, TransferStatus,
};
use crate::blockchain::erc20::transfer_calldata;
use crate::blockchain::gas_sponsor::{
    SponsorCall, SponsorContract, SponsorInfo, SponsorParameters, SponsorReceipt,
    SponsoredTransaction, SponsorshipError,
};
use crate::blockchain::locks::AccountLocks;
use crate::blockchain::transactions::{format_amount, DEFAULT_TOKEN_TRANSFER_GAS_LIMIT};
use crate::blockchain::{Chain, ChainRpc, TokenClass, TokenOnChain};

/// Default number of idempotency keys remembered.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

// =============================================================================
// Journal
// =============================================================================

/// `(chain id, sender, idempotency key)`.
type JournalKey = (String, Address, String);

#[derive(Debug, Clone)]
pub enum JournalEntry {
    /// Registered, not yet executed.
    Pending {
        call: SponsorCall,
        receipt: SponsorReceipt,
    },
    Executed {
        call: SponsorCall,
        result: Box<TransferResult>,
    },
}

impl JournalEntry {
    fn call(&self) -> &SponsorCall {
        match self {
            Self::Pending { call, .. } | Self::Executed { call, .. } => call,
        }
    }
}

/// Recent sponsored transfers by idempotency key.
pub struct SponsorshipJournal {
    entries: Mutex<LruCache<JournalKey, JournalEntry>>,
}

impl SponsorshipJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn get(&self, key: &JournalKey) -> Option<JournalEntry> {
        let mut entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn put(&self, key: JournalKey, entry: JournalEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, entry);
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// One sponsored ERC-20 transfer.
#[derive(Debug, Clone, Copy)]
pub struct SponsoredTransfer<'a> {
    pub chain: &'a Chain,
    pub token: &'a TokenOnChain,
    pub initiator: &'a PrivateKeySigner,
    pub receiver: Address,
    /// Base units of the token.
    pub amount: U256,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub idempotency_key: Option<&'a str>,
}

pub struct GasSponsorshipCoordinator {
    contracts: HashMap<String, Arc<dyn SponsorContract>>,
    sponsor: Option<PrivateKeySigner>,
    rpc: Arc<dyn ChainRpc>,
    locks: AccountLocks,
    journal: SponsorshipJournal,
}

impl GasSponsorshipCoordinator {
    pub fn new(
        contracts: HashMap<String, Arc<dyn SponsorContract>>,
        sponsor: Option<PrivateKeySigner>,
        rpc: Arc<dyn ChainRpc>,
        locks: AccountLocks,
        journal_capacity: usize,
    ) -> Self {
        Self {
            contracts,
            sponsor,
            rpc,
            locks,
            journal: SponsorshipJournal::new(journal_capacity),
        }
    }

    /// Keep only contracts that have code on chain.
    ///
    /// A contract whose code cannot be read is kept, so a transient RPC
    /// outage at start-up does not disable sponsorship for the process.
    pub async fn retain_deployed(
        contracts: HashMap<String, Arc<dyn SponsorContract>>,
    ) -> HashMap<String, Arc<dyn SponsorContract>> {
        let mut deployed = HashMap::with_capacity(contracts.len());
        for (chain_id, contract) in contracts {
            match contract.is_deployed().await {
                Ok(true) => {
                    deployed.insert(chain_id, contract);
                }
                Ok(false) => tracing::warn!(
                    chain_id = %chain_id,
                    contract = %contract.address(),
                    "No code at gas sponsor address, sponsorship disabled on this chain"
                ),
                Err(e) => {
                    tracing::warn!(
                        chain_id = %chain_id,
                        error = %e,
                        "Could not verify gas sponsor deployment, keeping it"
                    );
                    deployed.insert(chain_id, contract);
                }
            }
        }
        deployed
    }

    /// Whether `chain_id` has a sponsorship contract.
    pub fn supports(&self, chain_id: &str) -> bool {
        self.contracts.contains_key(chain_id)
    }

    pub fn sponsor_address(&self) -> Option<Address> {
        self.sponsor.as_ref().map(PrivateKeySigner::address)
    }

    pub fn contract_address(&self, chain_id: &str) -> Option<Address> {
        self.contracts.get(chain_id).map(|c| c.address())
    }

    fn contract(&self, chain: &Chain) -> Result<&Arc<dyn SponsorContract>, TransferError> {
        self.contracts.get(&chain.id).ok_or_else(|| {
            TransferError::sponsorship(
                chain,
                SponsorshipPhase::Preflight,
                SponsorshipError::NoSponsorDeployed(chain.id.clone()),
            )
        })
    }

    fn sponsor_key(&self, chain: &Chain) -> Result<&PrivateKeySigner, TransferError> {
        self.sponsor.as_ref().ok_or_else(|| {
            TransferError::sponsorship(
                chain,
                SponsorshipPhase::Preflight,
                SponsorshipError::SponsorKeyMissing,
            )
        })
    }

    /// Run the sponsor/execute protocol for one ERC-20 transfer.
    pub async fn sponsor_transfer(
        &self,
        request: SponsoredTransfer<'_>,
    ) -> Result<TransferResult, TransferError> {
        let chain = request.chain;
        let preflight = |source| TransferError::sponsorship(chain, SponsorshipPhase::Preflight, source);

        let contract = self.contract(chain)?;
        let sponsor = self.sponsor_key(chain)?;
        let token_address = match (request.token.class, request.token.contract_address) {
            (TokenClass::Erc20, Some(address)) => address,
            _ => {
                return Err(preflight(SponsorshipError::NativeNotSponsorable(
                    request.token.symbol.clone(),
                )))
            }
        };

        let from = request.initiator.address();
        let _initiator_guard = self.locks.acquire(chain.numeric_chain_id, from).await;

        let journal_key = request
            .idempotency_key
            .map(|key| (chain.id.clone(), from, key.to_string()));
        let data = transfer_calldata(request.receiver, request.amount);

        let replay = journal_key.as_ref().and_then(|k| self.journal.get(k));
        if let Some(entry) = &replay {
            let recorded = entry.call();
            if recorded.data != data || recorded.to != token_address {
                return Err(TransferError::InvalidRequest(
                    "idempotency key was used for a different transfer".into(),
                ));
            }
        }

        let (call, receipt) = match replay {
            Some(JournalEntry::Executed { result, .. }) => {
                tracing::info!(
                    chain_id = %chain.id,
                    tx_hash = ?result.transaction_hash,
                    "Replaying executed sponsored transfer"
                );
                return Ok(*result);
            }
            Some(JournalEntry::Pending { call, receipt }) => {
                tracing::info!(
                    chain_id = %chain.id,
                    sponsored_tx_hash = %receipt.sponsored_tx_hash,
                    "Resuming sponsored transfer at execution"
                );
                (call, receipt)
            }
            None => {
                let gas_price = match request.gas_price {
                    Some(price) => price,
                    None => self
                        .rpc
                        .fee_params(chain)
                        .await
                        .map_err(|e| preflight(e.into()))?
                        .max_price_per_gas(),
                };
                let call = SponsorCall {
                    from,
                    to: token_address,
                    data,
                    gas_limit: request.gas_limit.unwrap_or(DEFAULT_TOKEN_TRANSFER_GAS_LIMIT),
                    gas_price,
                };
                self.preflight(contract.as_ref(), sponsor.address(), &call)
                    .await
                    .map_err(preflight)?;

                let receipt = self.register(chain, contract.as_ref(), sponsor, &call).await?;
                if let Some(key) = journal_key.clone() {
                    self.journal.put(
                        key,
                        JournalEntry::Pending {
                            call: call.clone(),
                            receipt: receipt.clone(),
                        },
                    );
                }
                (call, receipt)
            }
        };

        let execution = contract
            .execute_sponsored_transaction(
                request.initiator,
                receipt.sponsored_tx_hash,
                call.data.clone(),
            )
            .await
            .map_err(|source| TransferError::Sponsorship {
                chain_id: chain.id.clone(),
                phase: SponsorshipPhase::Execute,
                pending_sponsored_tx_hash: Some(format!("{:?}", receipt.sponsored_tx_hash)),
                source,
            })?;

        let execution_tx_hash = format!("{:?}", execution.execution_tx_hash);
        tracing::info!(
            chain_id = %chain.id,
            token = %request.token.symbol,
            sponsored_tx_hash = %receipt.sponsored_tx_hash,
            tx_hash = %execution_tx_hash,
            gas_used = execution.gas_used,
            "Sponsored transfer executed"
        );

        let result = TransferResult {
            success: true,
            chain_id: chain.id.clone(),
            token_symbol: request.token.symbol.clone(),
            from_address: format!("{from:?}"),
            to_address: format!("{:?}", request.receiver),
            amount: format_amount(request.amount, request.token.decimals),
            explorer_url: chain.tx_url(&execution_tx_hash),
            transaction_hash: Some(execution_tx_hash.clone()),
            ledger_transfer_id: None,
            gas_sponsored: true,
            sponsorship_details: Some(SponsorshipDetails {
                contract_address: format!("{:?}", contract.address()),
                sponsor_address: format!("{:?}", sponsor.address()),
                sponsored_tx_hash: format!("{:?}", receipt.sponsored_tx_hash),
                registration_tx_hash: format!("{:?}", receipt.registration_tx_hash),
                execution_tx_hash,
                gas_limit: call.gas_limit,
                gas_price: call.gas_price.to_string(),
                gas_used: execution.gas_used,
                effective_gas_price: execution.effective_gas_price.to_string(),
                estimated_cost: call.estimated_cost().to_string(),
            }),
            status: TransferStatus::Confirmed,
            created_at: Utc::now(),
        };

        if let Some(key) = journal_key {
            self.journal.put(
                key,
                JournalEntry::Executed {
                    call,
                    result: Box::new(result.clone()),
                },
            );
        }
        Ok(result)
    }

    /// Checks the contract would make at registration, done with reads only.
    async fn preflight(
        &self,
        contract: &dyn SponsorContract,
        sponsor: Address,
        call: &SponsorCall,
    ) -> Result<(), SponsorshipError> {
        if call.from == call.to {
            return Err(SponsorshipError::SelfSponsorshipForbidden);
        }

        let params = contract.parameters().await?;
        if U256::from(call.gas_price) > params.max_gas_price {
            return Err(SponsorshipError::GasPriceTooHigh(format!(
                "{} wei exceeds the {} wei ceiling",
                call.gas_price, params.max_gas_price
            )));
        }
        if U256::from(call.gas_limit) > params.max_gas_limit {
            return Err(SponsorshipError::GasLimitTooHigh(format!(
                "{} exceeds the {} gas ceiling",
                call.gas_limit, params.max_gas_limit
            )));
        }

        let info = contract.sponsor_info(sponsor).await?;
        if !info.is_active {
            return Err(SponsorshipError::NotActiveSponsor);
        }
        let required = params.min_sponsor_balance.max(call.estimated_cost());
        if info.balance < required {
            return Err(SponsorshipError::InsufficientSponsorBalance(format!(
                "escrow {} wei, need {} wei",
                info.balance, required
            )));
        }
        Ok(())
    }

    async fn register(
        &self,
        chain: &Chain,
        contract: &dyn SponsorContract,
        sponsor: &PrivateKeySigner,
        call: &SponsorCall,
    ) -> Result<SponsorReceipt, TransferError> {
        // The initiator's lock is already held when the sponsor is the initiator.
        let _sponsor_guard = if sponsor.address() == call.from {
            None
        } else {
            Some(self.locks.acquire(chain.numeric_chain_id, sponsor.address()).await)
        };

        let receipt = contract
            .sponsor_transaction(sponsor, call)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Sponsor, source))?;
        tracing::info!(
            chain_id = %chain.id,
            sponsored_tx_hash = %receipt.sponsored_tx_hash,
            tx_hash = %receipt.registration_tx_hash,
            gas_limit = call.gas_limit,
            gas_price = call.gas_price,
            "Sponsored transaction registered"
        );
        Ok(receipt)
    }

    pub async fn sponsor_info(
        &self,
        chain: &Chain,
    ) -> Result<(Address, SponsorInfo, SponsorParameters), TransferError> {
        let contract = self.contract(chain)?;
        let sponsor = self.sponsor_key(chain)?.address();
        let read = |source| TransferError::sponsorship(chain, SponsorshipPhase::Preflight, source);
        let info = contract.sponsor_info(sponsor).await.map_err(read)?;
        let params = contract.parameters().await.map_err(read)?;
        Ok((sponsor, info, params))
    }

    pub async fn sponsored_transaction(
        &self,
        chain: &Chain,
        sponsored_tx_hash: B256,
    ) -> Result<Option<SponsoredTransaction>, TransferError> {
        self.contract(chain)?
            .sponsored_transaction(sponsored_tx_hash)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Preflight, source))
    }

    /// Top up the sponsor's escrow with `amount` wei.
    pub async fn add_funds(&self, chain: &Chain, amount: U256) -> Result<TxHash, TransferError> {
        let contract = self.contract(chain)?;
        let sponsor = self.sponsor_key(chain)?;
        let _guard = self.locks.acquire(chain.numeric_chain_id, sponsor.address()).await;
        let hash = contract
            .add_funds(sponsor, amount)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Sponsor, source))?;
        tracing::info!(chain_id = %chain.id, tx_hash = %hash, amount = %amount, "Sponsor escrow topped up");
        Ok(hash)
    }

    /// Withdraw `amount` wei from the sponsor's escrow.
    pub async fn withdraw_funds(&self, chain: &Chain, amount: U256) -> Result<TxHash, TransferError> {
        let contract = self.contract(chain)?;
        let sponsor = self.sponsor_key(chain)?;
        let info = contract
            .sponsor_info(sponsor.address())
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Preflight, source))?;
        if info.balance < amount {
            return Err(TransferError::sponsorship(
                chain,
                SponsorshipPhase::Preflight,
                SponsorshipError::InsufficientSponsorBalance(format!(
                    "escrow {} wei, requested {} wei",
                    info.balance, amount
                )),
            ));
        }

        let _guard = self.locks.acquire(chain.numeric_chain_id, sponsor.address()).await;
        let hash = contract
            .withdraw_funds(sponsor, amount)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Sponsor, source))?;
        tracing::info!(chain_id = %chain.id, tx_hash = %hash, amount = %amount, "Sponsor escrow withdrawn");
        Ok(hash)
    }

    /// Enrol `sponsor` on the chain's contract with `deposit` wei of escrow.
    /// Signed by the service key, which must own the contract.
    pub async fn register_sponsor(
        &self,
        chain: &Chain,
        sponsor: Address,
        deposit: U256,
    ) -> Result<TxHash, TransferError> {
        let contract = self.contract(chain)?;
        let owner = self.sponsor_key(chain)?;
        let _guard = self.locks.acquire(chain.numeric_chain_id, owner.address()).await;
        let hash = contract
            .register_sponsor(owner, sponsor, deposit)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Sponsor, source))?;
        tracing::info!(chain_id = %chain.id, sponsor = %sponsor, tx_hash = %hash, deposit = %deposit, "Sponsor registered");
        Ok(hash)
    }

    /// Deactivate `sponsor`; its remaining escrow is refunded by the contract.
    pub async fn remove_sponsor(&self, chain: &Chain, sponsor: Address) -> Result<TxHash, TransferError> {
        let contract = self.contract(chain)?;
        let owner = self.sponsor_key(chain)?;
        let info = contract
            .sponsor_info(sponsor)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Preflight, source))?;
        if !info.is_active {
            return Err(TransferError::sponsorship(
                chain,
                SponsorshipPhase::Preflight,
                SponsorshipError::NotActiveSponsor,
            ));
        }

        let _guard = self.locks.acquire(chain.numeric_chain_id, owner.address()).await;
        let hash = contract
            .remove_sponsor(owner, sponsor)
            .await
            .map_err(|source| TransferError::sponsorship(chain, SponsorshipPhase::Sponsor, source))?;
        tracing::info!(chain_id = %chain.id, sponsor = %sponsor, tx_hash = %hash, refunded = %info.balance, "Sponsor removed");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;
    use crate::blockchain::registry::TokenDeploymentOverride;
    use crate::blockchain::{ChainRegistry, RegistryOverrides};
    use crate::testing::{
        address_of, ether, signer, MockChainRpc, MockSponsorContract, ALICE_KEY, BOB_KEY,
        SPONSOR_KEY,
    };

    const GAS_PRICE: u128 = 3_500_000_000;

    fn registry_with_token(token: Address) -> ChainRegistry {
        ChainRegistry::standard(&RegistryOverrides {
            extra_deployments: vec![TokenDeploymentOverride {
                symbol: "USDC".into(),
                chain_id: "flowTestnet".into(),
                contract_address: token,
                decimals: 6,
            }],
            ..Default::default()
        })
        .unwrap()
    }

    struct Harness {
        registry: ChainRegistry,
        contract: Arc<MockSponsorContract>,
        coordinator: GasSponsorshipCoordinator,
    }

    fn harness_with(token: Address, sponsor_key: Option<&str>) -> Harness {
        let contract = MockSponsorContract::new(Address::repeat_byte(0x5a));
        contract.add_sponsor(address_of(SPONSOR_KEY), ether(1));
        let mut contracts: HashMap<String, Arc<dyn SponsorContract>> = HashMap::new();
        contracts.insert("flowTestnet".into(), contract.clone());
        let coordinator = GasSponsorshipCoordinator::new(
            contracts,
            sponsor_key.map(signer),
            MockChainRpc::new(),
            AccountLocks::new(),
            DEFAULT_JOURNAL_CAPACITY,
        );
        Harness {
            registry: registry_with_token(token),
            contract,
            coordinator,
        }
    }

    fn harness() -> Harness {
        harness_with(Address::repeat_byte(0xaa), Some(SPONSOR_KEY))
    }

    fn request<'a>(
        chain: &'a Chain,
        token: &'a TokenOnChain,
        initiator: &'a PrivateKeySigner,
    ) -> SponsoredTransfer<'a> {
        SponsoredTransfer {
            chain,
            token,
            initiator,
            receiver: address_of(BOB_KEY),
            amount: U256::from(25_000_000u64),
            gas_limit: None,
            gas_price: None,
            idempotency_key: None,
        }
    }

    fn source(err: &TransferError) -> &SponsorshipError {
        match err {
            TransferError::Sponsorship { source, .. } => source,
            other => panic!("expected a sponsorship error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn executes_once_and_charges_actual_gas() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        let sponsor = address_of(SPONSOR_KEY);
        let before = h.contract.balance_of(sponsor);

        let result = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap();
        assert!(result.gas_sponsored);
        assert_eq!(result.amount, "25");
        let details = result.sponsorship_details.unwrap();
        assert_eq!(details.gas_limit, DEFAULT_TOKEN_TRANSFER_GAS_LIMIT);
        assert_eq!(details.gas_price, GAS_PRICE.to_string());

        let charged = before - h.contract.balance_of(sponsor);
        assert_eq!(charged, U256::from(48_000u64) * U256::from(GAS_PRICE));

        let id: B256 = details.sponsored_tx_hash.parse().unwrap();
        let again = h
            .contract
            .execute_sponsored_transaction(&alice, id, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(again, SponsorshipError::AlreadyExecuted(_)));
        assert_eq!(before - h.contract.balance_of(sponsor), charged);

        let record = h.coordinator.sponsored_transaction(chain, id).await.unwrap().unwrap();
        assert!(record.executed);
        assert_eq!(record.total_cost, charged);
    }

    #[tokio::test]
    async fn ceilings_are_enforced_before_registration() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        let before = h.contract.balance_of(address_of(SPONSOR_KEY));

        let mut pricey = request(chain, &token, &alice);
        pricey.gas_price = Some(200_000_000_000);
        let err = h.coordinator.sponsor_transfer(pricey).await.unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::GasPriceTooHigh(_)));

        let mut heavy = request(chain, &token, &alice);
        heavy.gas_limit = Some(600_000);
        let err = h.coordinator.sponsor_transfer(heavy).await.unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::GasLimitTooHigh(_)));

        assert_eq!(h.contract.registrations(), 0);
        assert_eq!(h.contract.balance_of(address_of(SPONSOR_KEY)), before);
    }

    #[tokio::test]
    async fn contract_rejects_ceiling_violations_on_its_own() {
        let h = harness();
        let call = SponsorCall {
            from: address_of(ALICE_KEY),
            to: Address::repeat_byte(0xaa),
            data: Bytes::new(),
            gas_limit: 600_000,
            gas_price: 1,
        };
        assert!(matches!(
            h.contract.register(&signer(SPONSOR_KEY), &call),
            Err(SponsorshipError::GasLimitTooHigh(_))
        ));
    }

    #[tokio::test]
    async fn self_sponsorship_is_forbidden() {
        let h = harness_with(address_of(ALICE_KEY), Some(SPONSOR_KEY));
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);

        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap_err();
        assert_eq!(source(&err), &SponsorshipError::SelfSponsorshipForbidden);

        let call = SponsorCall {
            from: alice.address(),
            to: alice.address(),
            data: Bytes::new(),
            gas_limit: 50_000,
            gas_price: 1,
        };
        assert_eq!(
            h.contract.register(&signer(SPONSOR_KEY), &call).unwrap_err(),
            SponsorshipError::SelfSponsorshipForbidden
        );
    }

    #[tokio::test]
    async fn native_token_is_rejected_without_contract_calls() {
        let h = harness();
        let (chain, flow) = h.registry.validate_chain_and_token("flowTestnet", "FLOW").unwrap();
        let alice = signer(ALICE_KEY);

        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &flow, &alice))
            .await
            .unwrap_err();
        assert_eq!(
            source(&err),
            &SponsorshipError::NativeNotSponsorable("FLOW".into())
        );
        assert_eq!(h.contract.calls(), 0);
    }

    #[tokio::test]
    async fn missing_key_and_missing_contract_fail_preflight() {
        let h = harness_with(Address::repeat_byte(0xaa), None);
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap_err();
        assert_eq!(source(&err), &SponsorshipError::SponsorKeyMissing);

        let h = harness();
        let (sepolia, usdc) = h.registry.validate_chain_and_token("sepolia", "USDC").unwrap();
        let err = h
            .coordinator
            .sponsor_transfer(request(sepolia, &usdc, &alice))
            .await
            .unwrap_err();
        assert_eq!(
            source(&err),
            &SponsorshipError::NoSponsorDeployed("sepolia".into())
        );
    }

    #[tokio::test]
    async fn inactive_or_underfunded_sponsor_is_caught_early() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        h.contract.add_sponsor(address_of(SPONSOR_KEY), U256::from(1_000u64));

        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap_err();
        assert!(matches!(
            source(&err),
            SponsorshipError::InsufficientSponsorBalance(_)
        ));

        let h = harness_with(Address::repeat_byte(0xaa), Some(BOB_KEY));
        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap_err();
        assert_eq!(source(&err), &SponsorshipError::NotActiveSponsor);
    }

    #[tokio::test]
    async fn failed_execution_resumes_on_retry_with_same_key() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        h.contract
            .fail_next_execute(SponsorshipError::Chain(crate::blockchain::ChainError::RpcUnavailable(
                "timed out".into(),
            )));

        let mut first = request(chain, &token, &alice);
        first.idempotency_key = Some("order-42");
        let err = h.coordinator.sponsor_transfer(first).await.unwrap_err();
        let pending = match &err {
            TransferError::Sponsorship {
                phase: SponsorshipPhase::Execute,
                pending_sponsored_tx_hash: Some(hash),
                ..
            } => hash.clone(),
            other => panic!("unexpected error {other:?}"),
        };

        let retried = h.coordinator.sponsor_transfer(first).await.unwrap();
        assert_eq!(h.contract.registrations(), 1);
        assert_eq!(
            retried.sponsorship_details.as_ref().unwrap().sponsored_tx_hash,
            pending
        );

        let replayed = h.coordinator.sponsor_transfer(first).await.unwrap();
        assert_eq!(replayed.transaction_hash, retried.transaction_hash);
        assert_eq!(h.contract.registrations(), 1);

        let mut different = first;
        different.amount = U256::from(1u64);
        different.idempotency_key = Some("order-43");
        h.coordinator.sponsor_transfer(different).await.unwrap();
        assert_eq!(h.contract.registrations(), 2);
    }

    #[tokio::test]
    async fn reused_key_with_other_parameters_is_rejected() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        h.contract.fail_next_execute(SponsorshipError::ContractReverted("boom".into()));

        let mut first = request(chain, &token, &alice);
        first.idempotency_key = Some("k");
        h.coordinator.sponsor_transfer(first).await.unwrap_err();

        let mut changed = first;
        changed.amount = U256::from(7u64);
        assert!(matches!(
            h.coordinator.sponsor_transfer(changed).await,
            Err(TransferError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn executed_key_replays_only_the_same_transfer() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);

        let mut first = request(chain, &token, &alice);
        first.idempotency_key = Some("k");
        let executed = h.coordinator.sponsor_transfer(first).await.unwrap();

        let replayed = h.coordinator.sponsor_transfer(first).await.unwrap();
        assert_eq!(replayed.transaction_hash, executed.transaction_hash);
        assert_eq!(h.contract.registrations(), 1);

        let mut other_amount = first;
        other_amount.amount = U256::from(7u64);
        assert!(matches!(
            h.coordinator.sponsor_transfer(other_amount).await,
            Err(TransferError::InvalidRequest(_))
        ));

        let mut other_receiver = first;
        other_receiver.receiver = Address::repeat_byte(0x77);
        assert!(matches!(
            h.coordinator.sponsor_transfer(other_receiver).await,
            Err(TransferError::InvalidRequest(_))
        ));
        assert_eq!(h.contract.registrations(), 1);
    }

    #[tokio::test]
    async fn escrow_is_charged_for_reported_gas_only() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let alice = signer(ALICE_KEY);
        let sponsor = address_of(SPONSOR_KEY);
        h.contract.set_gas_used(31_500);
        let before = h.contract.balance_of(sponsor);

        let result = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap();
        assert_eq!(result.sponsorship_details.unwrap().gas_used, 31_500);
        assert_eq!(
            before - h.contract.balance_of(sponsor),
            U256::from(31_500u64) * U256::from(GAS_PRICE)
        );
    }

    #[tokio::test]
    async fn undeployed_contracts_are_dropped() {
        let live = MockSponsorContract::new(Address::repeat_byte(1));
        let empty = MockSponsorContract::new(Address::repeat_byte(2));
        empty.set_deployed(false);
        let mut contracts: HashMap<String, Arc<dyn SponsorContract>> = HashMap::new();
        contracts.insert("flowTestnet".into(), live);
        contracts.insert("sepolia".into(), empty);

        let kept = GasSponsorshipCoordinator::retain_deployed(contracts).await;
        assert!(kept.contains_key("flowTestnet"));
        assert!(!kept.contains_key("sepolia"));
    }

    #[tokio::test]
    async fn escrow_top_up_and_withdrawal() {
        let h = harness();
        let chain = h.registry.get_chain("flowTestnet").unwrap();
        let sponsor = address_of(SPONSOR_KEY);

        h.coordinator.add_funds(chain, ether(1)).await.unwrap();
        assert_eq!(h.contract.balance_of(sponsor), ether(2));

        let err = h.coordinator.withdraw_funds(chain, ether(3)).await.unwrap_err();
        assert!(matches!(
            source(&err),
            SponsorshipError::InsufficientSponsorBalance(_)
        ));
        h.coordinator.withdraw_funds(chain, ether(2)).await.unwrap();
        assert_eq!(h.contract.balance_of(sponsor), U256::ZERO);
    }

    #[tokio::test]
    async fn sponsor_enrolment_and_removal() {
        let h = harness();
        let (chain, token) = h.registry.validate_chain_and_token("flowTestnet", "USDC").unwrap();
        let service = address_of(SPONSOR_KEY);
        let carol = Address::repeat_byte(0xc0);

        h.coordinator.register_sponsor(chain, carol, ether(1)).await.unwrap();
        assert_eq!(h.contract.balance_of(carol), ether(1));

        let err = h
            .coordinator
            .register_sponsor(chain, carol, ether(1))
            .await
            .unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::SponsorAlreadyExists(_)));

        let err = h
            .coordinator
            .register_sponsor(chain, Address::repeat_byte(0xc1), U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(
            source(&err),
            SponsorshipError::InsufficientSponsorBalance(_)
        ));

        // The service account stops sponsoring once removed.
        h.coordinator.remove_sponsor(chain, service).await.unwrap();
        assert_eq!(h.contract.balance_of(service), U256::ZERO);
        let alice = signer(ALICE_KEY);
        let err = h
            .coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::NotActiveSponsor));
        assert_eq!(h.contract.registrations(), 0);

        let err = h.coordinator.remove_sponsor(chain, service).await.unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::NotActiveSponsor));

        h.coordinator.register_sponsor(chain, service, ether(1)).await.unwrap();
        h.coordinator
            .sponsor_transfer(request(chain, &token, &alice))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn only_the_owner_manages_sponsors() {
        let h = harness_with(Address::repeat_byte(0xaa), Some(ALICE_KEY));
        let chain = h.registry.get_chain("flowTestnet").unwrap();

        let err = h
            .coordinator
            .register_sponsor(chain, Address::repeat_byte(0xc0), ether(1))
            .await
            .unwrap_err();
        assert!(matches!(
            source(&err),
            SponsorshipError::ContractReverted(m) if m.contains("not the owner")
        ));
        let err = h
            .coordinator
            .remove_sponsor(chain, address_of(SPONSOR_KEY))
            .await
            .unwrap_err();
        assert!(matches!(source(&err), SponsorshipError::ContractReverted(_)));
        assert_eq!(h.contract.balance_of(address_of(SPONSOR_KEY)), ether(1));
    }
}
