//! Share-token event handling.
//!
//! Vault `Transfer` events move direct shares, reward-pool `Transfer` events and boost
//! `Staked`/`Withdrawn` events move shares held through the staking contract. Each applied
//! leg triggers the reactive breakdown for that investor. Factory deployments onboard new vaults ahead of their first transfer. All work
//! for one event runs under the chain's lane.

use super::lanes::ChainLanes;
use super::onboarding::{Admission, Onboarder};
use super::orchestrator::{BreakdownOrchestrator, EpisodeOutcome};
use super::tokens::TokenError;
use crate::chain::ChainClient;
use crate::db::{EntityStore, StoreError};
use crate::domain::{
    Address, BlacklistStatus, BlockNumber, Decimal, Timestamp, Vault, VaultKind, BURN_ADDRESS,
    MINT_ADDRESS, U256,
};
use crate::engine::{transfer_legs, InvestorPositionLedger, ShareKind};
use crate::gate::{detect_role, ContractRole, DetectionError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where and when an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub contract: Address,
    pub block: BlockNumber,
    pub timestamp: Timestamp,
    pub log_index: u64,
}

/// ERC-20 `Transfer(from, to, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// Boost `Staked(user, amount)` or `Withdrawn(user, amount)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostStake {
    pub user: Address,
    pub amount: U256,
}

/// Vault `UpgradeStrat(implementation)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeStrat {
    pub implementation: Address,
}

/// A contract created by the vault factory and the input of the deploying transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDeployed {
    pub address: Address,
    pub transaction_input: Vec<u8>,
}

#[derive(Debug)]
pub enum EventOutcome {
    /// Legs were applied; one breakdown episode per leg.
    Applied { episodes: Vec<EpisodeOutcome> },
    /// A freshly deployed vault is now tracked.
    Onboarded,
    /// The vault now points at a new strategy.
    StrategyUpdated,
    /// Zero amount, self transfer or only non-investor sides.
    NoOp,
    /// The contract is denylisted, blacklisted or unknown.
    Ignored,
    /// A transient read failed; the dispatcher should redeliver the event.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct TransferProcessor {
    store: Arc<dyn EntityStore>,
    onboarder: Onboarder,
    ledger: InvestorPositionLedger,
    orchestrator: Arc<BreakdownOrchestrator>,
    lanes: ChainLanes,
}

impl TransferProcessor {
    pub fn new(
        store: Arc<dyn EntityStore>,
        onboarder: Onboarder,
        orchestrator: Arc<BreakdownOrchestrator>,
        lanes: ChainLanes,
    ) -> Self {
        Self {
            ledger: InvestorPositionLedger::new(store.clone()),
            store,
            onboarder,
            orchestrator,
            lanes,
        }
    }

    /// Handle a `Transfer` of vault shares.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_vault_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
    ) -> Result<EventOutcome, ProcessingError> {
        let _lane = self.lanes.acquire(client.chain_id()).await;
        let vault = match self
            .onboarder
            .ensure_vault(client, event.block, event.contract)
            .await?
        {
            Admission::Ready(vault) => vault,
            Admission::Blocked => return Ok(EventOutcome::Ignored),
            Admission::Deferred => return Ok(EventOutcome::Deferred),
        };
        self.apply_transfer(client, event, transfer, &vault, vault.address, ShareKind::Direct)
            .await
    }

    /// Handle a `Transfer` of a reward pool's receipt token.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_reward_pool_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
    ) -> Result<EventOutcome, ProcessingError> {
        let _lane = self.lanes.acquire(client.chain_id()).await;
        let (_pool, vault) = match self
            .onboarder
            .ensure_reward_pool(client, event.block, event.contract)
            .await?
        {
            Admission::Ready(found) => found,
            Admission::Blocked => return Ok(EventOutcome::Ignored),
            Admission::Deferred => return Ok(EventOutcome::Deferred),
        };
        // Pool receipts are minted 1:1 against staked vault shares.
        self.apply_transfer(client, event, transfer, &vault, vault.shares_token, ShareKind::RewardPool)
            .await
    }

    /// Handle a `Transfer` of LST vault shares.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_lst_vault_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
    ) -> Result<EventOutcome, ProcessingError> {
        self.handle_erc4626_transfer(client, event, transfer, VaultKind::LstVault)
            .await
    }

    /// Handle a `Transfer` of an ERC-4626 adapter's shares.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_erc4626_adapter_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
    ) -> Result<EventOutcome, ProcessingError> {
        self.handle_erc4626_transfer(client, event, transfer, VaultKind::Erc4626Adapter)
            .await
    }

    async fn handle_erc4626_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
        kind: VaultKind,
    ) -> Result<EventOutcome, ProcessingError> {
        let _lane = self.lanes.acquire(client.chain_id()).await;
        let vault = match self
            .onboarder
            .ensure_erc4626_vault(client, event.block, event.contract, kind)
            .await?
        {
            Admission::Ready(vault) => vault,
            Admission::Blocked => return Ok(EventOutcome::Ignored),
            Admission::Deferred => return Ok(EventOutcome::Deferred),
        };
        self.apply_transfer(client, event, transfer, &vault, vault.address, ShareKind::Direct)
            .await
    }

    /// Credit vault shares staked into a boost to the staker.
    ///
    /// The vault-side `Transfer` into the boost is skipped because the boost is not an
    /// investor, so total shares stay constant.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_boost_staked(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        stake: BoostStake,
    ) -> Result<EventOutcome, ProcessingError> {
        let transfer = Transfer {
            from: MINT_ADDRESS,
            to: stake.user,
            value: stake.amount,
        };
        self.apply_boost(client, event, transfer).await
    }

    /// Release vault shares withdrawn from a boost.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_boost_withdrawn(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        stake: BoostStake,
    ) -> Result<EventOutcome, ProcessingError> {
        let transfer = Transfer {
            from: stake.user,
            to: BURN_ADDRESS,
            value: stake.amount,
        };
        self.apply_boost(client, event, transfer).await
    }

    async fn apply_boost(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
    ) -> Result<EventOutcome, ProcessingError> {
        let _lane = self.lanes.acquire(client.chain_id()).await;
        let (_boost, vault) = match self
            .onboarder
            .ensure_boost(client, event.block, event.contract)
            .await?
        {
            Admission::Ready(found) => found,
            Admission::Blocked => return Ok(EventOutcome::Ignored),
            Admission::Deferred => return Ok(EventOutcome::Deferred),
        };
        self.apply_transfer(client, event, transfer, &vault, vault.shares_token, ShareKind::RewardPool)
            .await
    }

    /// Point the vault at its new strategy.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_upgrade_strat(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        upgrade: UpgradeStrat,
    ) -> Result<EventOutcome, ProcessingError> {
        let chain_id = client.chain_id();
        let _lane = self.lanes.acquire(chain_id).await;
        let Some(mut vault) = self.store.get_vault(chain_id, &event.contract).await? else {
            warn!(chain_id = %chain_id, vault = %event.contract, "UpgradeStrat for unknown vault, skipping");
            return Ok(EventOutcome::Ignored);
        };
        info!(
            chain_id = %chain_id,
            vault = %vault.address,
            block_number = %event.block,
            previous = %vault.strategy_address,
            strategy = %upgrade.implementation,
            "Strategy upgraded"
        );
        vault.strategy_address = upgrade.implementation;
        self.store.save_vault(&vault).await?;
        Ok(EventOutcome::StrategyUpdated)
    }

    /// Onboard a factory-deployed vault or boost.
    ///
    /// Strategies need no ledger state. A contract answering several role reads is
    /// blacklisted.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn handle_contract_deployed(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        deployed: ContractDeployed,
    ) -> Result<EventOutcome, ProcessingError> {
        let chain_id = client.chain_id();
        let _lane = self.lanes.acquire(chain_id).await;
        let role = match detect_role(
            client,
            event.block,
            deployed.address,
            &deployed.transaction_input,
        )
        .await
        {
            Ok(role) => role,
            Err(e @ DetectionError::Ambiguous { .. }) => {
                self.onboarder
                    .gate()
                    .record(
                        chain_id,
                        deployed.address,
                        BlacklistStatus::Blacklisted,
                        "contract",
                        e.to_string(),
                    )
                    .await?;
                return Ok(EventOutcome::Ignored);
            }
            Err(DetectionError::Read(e)) => {
                warn!(chain_id = %chain_id, contract = %deployed.address, error = %e, "Role read failed, deferring deployment");
                return Ok(EventOutcome::Deferred);
            }
        };

        let admission = match role {
            ContractRole::Vault => self
                .onboarder
                .ensure_vault(client, event.block, deployed.address)
                .await?
                .map(|_| ()),
            ContractRole::Boost => self
                .onboarder
                .ensure_boost(client, event.block, deployed.address)
                .await?
                .map(|_| ()),
            ContractRole::Strategy | ContractRole::None => {
                debug!(chain_id = %chain_id, contract = %deployed.address, role = %role, "Deployed contract holds no shares");
                return Ok(EventOutcome::NoOp);
            }
        };
        Ok(match admission {
            Admission::Ready(()) => EventOutcome::Onboarded,
            Admission::Blocked => EventOutcome::Ignored,
            Admission::Deferred => EventOutcome::Deferred,
        })
    }

    async fn apply_transfer(
        &self,
        client: &dyn ChainClient,
        event: EventContext,
        transfer: Transfer,
        vault: &Vault,
        amount_token: Address,
        kind: ShareKind,
    ) -> Result<EventOutcome, ProcessingError> {
        let chain_id = client.chain_id();
        let token = match self
            .orchestrator
            .tokens()
            .ensure(client, event.block, amount_token)
            .await
        {
            Ok(token) => token,
            Err(TokenError::Store(e)) => return Err(e.into()),
            Err(TokenError::Read(e)) => {
                warn!(chain_id = %chain_id, vault = %vault.address, token = %amount_token, error = %e, "Share token metadata unavailable, deferring transfer");
                return Ok(EventOutcome::Deferred);
            }
        };
        let amount = Decimal::from_raw(transfer.value, token.decimals);

        let mut episodes = Vec::new();
        for leg in transfer_legs(transfer.from, transfer.to, &amount) {
            if self
                .onboarder
                .gate()
                .is_excluded_account(vault, &leg.investor)
                .await?
            {
                debug!(chain_id = %chain_id, vault = %vault.address, account = %leg.investor, "Skipping non-investor account");
                continue;
            }
            self.ledger
                .apply_leg(chain_id, &vault.address, &leg, kind)
                .await?;
            let outcome = self
                .orchestrator
                .refresh_investor(client, vault.address, leg.investor, event.block, event.timestamp)
                .await?;
            episodes.push(outcome);
        }

        if episodes.is_empty() {
            return Ok(EventOutcome::NoOp);
        }
        debug!(
            chain_id = %chain_id,
            vault = %vault.address,
            block_number = %event.block,
            log_index = event.log_index,
            legs = episodes.len(),
            "Transfer applied"
        );
        Ok(EventOutcome::Applied { episodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::{IBeefyVault, IContractRole, IErc20, IRewardPool, IVaultFactory};
    use crate::chain::MockChainClient;
    use crate::db::MemoryStore;
    use crate::chain::abi::IErc4626;
    use crate::domain::{BoostConfig, ChainId, ProtocolType, StakingKind, VaultConfig};
    use crate::gate::{ContractGate, Denylist};
    use crate::metadata::{StaticMetadataSource, VaultCatalog};
    use crate::orchestration::orchestrator::OrchestratorSettings;
    use crate::orchestration::tokens::TokenRegistry;
    use alloy_sol_types::{SolCall, SolValue};

    const CHAIN: ChainId = ChainId(10);
    const VAULT: Address = Address::repeat_byte(0x10);
    const WANT: Address = Address::repeat_byte(0x11);
    const STRATEGY: Address = Address::repeat_byte(0x12);
    const POOL: Address = Address::repeat_byte(0x13);
    const BOOST: Address = Address::repeat_byte(0x14);
    const LST: Address = Address::repeat_byte(0x20);
    const ALICE: Address = Address::repeat_byte(0xA1);
    const BOB: Address = Address::repeat_byte(0xB0);

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn processor(store: Arc<MemoryStore>) -> TransferProcessor {
        let config = VaultConfig {
            id: "aave-usdc".to_string(),
            chain_id: CHAIN,
            vault_address: VAULT,
            strategy_address: STRATEGY,
            underlying_lp_address: WANT,
            protocol_type: ProtocolType::Aave,
            reward_pools: vec![],
            boosts: vec![BoostConfig {
                id: "moo-aave-usdc-boost".to_string(),
                address: BOOST,
            }],
            platform_id: "aave".to_string(),
            is_active: true,
        };
        let catalog = VaultCatalog::new(Arc::new(
            StaticMetadataSource::new().with_configs(CHAIN, vec![config]),
        ));
        let tokens = TokenRegistry::new(store.clone());
        let gate = ContractGate::new(Arc::new(Denylist::empty()), store.clone());
        let onboarder = Onboarder::new(store.clone(), catalog.clone(), tokens.clone(), gate);
        let orchestrator = Arc::new(BreakdownOrchestrator::new(
            store.clone(),
            catalog,
            tokens,
            OrchestratorSettings::default(),
        ));
        TransferProcessor::new(store, onboarder, orchestrator, ChainLanes::new())
    }

    fn vault_client() -> MockChainClient {
        MockChainClient::new(CHAIN)
            .with_return(VAULT, &IBeefyVault::wantCall {}, (WANT,).abi_encode_params())
            .with_return(VAULT, &IBeefyVault::strategyCall {}, (STRATEGY,).abi_encode_params())
            .with_return(VAULT, &IErc20::decimalsCall {}, (U256::from(18u8),).abi_encode_params())
            .with_return(WANT, &IErc20::decimalsCall {}, (U256::from(18u8),).abi_encode_params())
    }

    fn at(contract: Address, block: u64) -> EventContext {
        EventContext {
            contract,
            block: BlockNumber(block),
            timestamp: Timestamp(block * 10),
            log_index: 0,
        }
    }

    #[tokio::test]
    async fn test_mint_then_transfer_moves_direct_shares() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client();

        let mint = Transfer {
            from: Address::ZERO,
            to: ALICE,
            value: e18(250),
        };
        processor.handle_vault_transfer(&client, at(VAULT, 1), mint).await.unwrap();

        let send = Transfer {
            from: ALICE,
            to: BOB,
            value: e18(100),
        };
        let outcome = processor.handle_vault_transfer(&client, at(VAULT, 2), send).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Applied { ref episodes } if episodes.len() == 2));

        let alice = store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
        let bob = store.get_position(CHAIN, &VAULT, &BOB).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("150"));
        assert_eq!(bob.direct_shares_balance(), &d("100"));
        assert_eq!(bob.total_shares_balance(), &d("100"));
    }

    #[tokio::test]
    async fn test_strategy_and_self_transfers_are_not_positions() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client();

        let to_strategy = Transfer {
            from: Address::ZERO,
            to: STRATEGY,
            value: e18(5),
        };
        let outcome = processor
            .handle_vault_transfer(&client, at(VAULT, 1), to_strategy)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::NoOp));
        assert!(store.get_position(CHAIN, &VAULT, &STRATEGY).await.unwrap().is_none());

        let to_self = Transfer {
            from: ALICE,
            to: ALICE,
            value: e18(5),
        };
        let outcome = processor.handle_vault_transfer(&client, at(VAULT, 2), to_self).await.unwrap();
        assert!(matches!(outcome, EventOutcome::NoOp));
    }

    #[tokio::test]
    async fn test_staking_keeps_total_constant() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client().with_return(
            POOL,
            &IRewardPool::stakedTokenCall {},
            (VAULT,).abi_encode_params(),
        );

        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 1),
                Transfer {
                    from: Address::ZERO,
                    to: ALICE,
                    value: e18(10),
                },
            )
            .await
            .unwrap();
        // Onboard the pool so the vault-side transfer into it is recognized.
        processor
            .handle_reward_pool_transfer(
                &client,
                at(POOL, 2),
                Transfer {
                    from: Address::ZERO,
                    to: ALICE,
                    value: e18(4),
                },
            )
            .await
            .unwrap();
        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 2),
                Transfer {
                    from: ALICE,
                    to: POOL,
                    value: e18(4),
                },
            )
            .await
            .unwrap();

        let alice = store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("6"));
        assert_eq!(alice.reward_pool_shares_balance(), &d("4"));
        assert_eq!(alice.total_shares_balance(), &d("10"));
        assert!(store.get_position(CHAIN, &VAULT, &POOL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deferred_when_strategy_unreadable() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = MockChainClient::new(CHAIN)
            .with_return(VAULT, &IBeefyVault::wantCall {}, (WANT,).abi_encode_params());
        let outcome = processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 1),
                Transfer {
                    from: Address::ZERO,
                    to: ALICE,
                    value: e18(1),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Deferred));
        assert!(store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upgrade_strat_updates_vault() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client();
        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 1),
                Transfer {
                    from: Address::ZERO,
                    to: ALICE,
                    value: e18(1),
                },
            )
            .await
            .unwrap();

        let new_strategy = Address::repeat_byte(0x55);
        processor
            .handle_upgrade_strat(
                &client,
                at(VAULT, 2),
                UpgradeStrat {
                    implementation: new_strategy,
                },
            )
            .await
            .unwrap();
        let vault = store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
        assert_eq!(vault.strategy_address, new_strategy);

        let unknown = processor
            .handle_upgrade_strat(
                &client,
                at(Address::repeat_byte(0x66), 3),
                UpgradeStrat {
                    implementation: new_strategy,
                },
            )
            .await
            .unwrap();
        assert!(matches!(unknown, EventOutcome::Ignored));
    }

    #[tokio::test]
    async fn test_factory_vault_is_onboarded() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let deployed = ContractDeployed {
            address: VAULT,
            transaction_input: IVaultFactory::cloneVaultCall {}.abi_encode(),
        };
        let outcome = processor
            .handle_contract_deployed(&vault_client(), at(VAULT, 1), deployed)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Onboarded));
        let vault = store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
        assert_eq!(vault.vault_id, "aave-usdc");
    }

    #[tokio::test]
    async fn test_detected_strategy_is_not_onboarded() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = MockChainClient::new(CHAIN).with_return(
            STRATEGY,
            &IContractRole::vaultCall {},
            (VAULT,).abi_encode_params(),
        );
        let deployed = ContractDeployed {
            address: STRATEGY,
            transaction_input: vec![0xde, 0xad],
        };
        let outcome = processor
            .handle_contract_deployed(&client, at(STRATEGY, 1), deployed)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::NoOp));
        assert!(store.get_vault(CHAIN, &STRATEGY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_contract_is_blacklisted() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let odd = Address::repeat_byte(0x77);
        let client = MockChainClient::new(CHAIN)
            .with_return(odd, &IContractRole::vaultCall {}, (VAULT,).abi_encode_params())
            .with_return(odd, &IContractRole::strategyCall {}, (STRATEGY,).abi_encode_params());
        let deployed = ContractDeployed {
            address: odd,
            transaction_input: Vec::new(),
        };
        let outcome = processor
            .handle_contract_deployed(&client, at(odd, 1), deployed)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored));
        let status = store.get_contract_status(CHAIN, &odd).await.unwrap().unwrap();
        assert_eq!(status.status, BlacklistStatus::Blacklisted);
    }

    fn mint(to: Address, value: U256) -> Transfer {
        Transfer {
            from: Address::ZERO,
            to,
            value,
        }
    }

    #[tokio::test]
    async fn test_boost_stake_credits_the_staker() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client();

        processor
            .handle_vault_transfer(&client, at(VAULT, 1), mint(ALICE, e18(250)))
            .await
            .unwrap();
        let boost = store.get_reward_pool(CHAIN, &BOOST).await.unwrap().unwrap();
        assert_eq!(boost.kind, StakingKind::Boost);

        // Staking emits the vault-side transfer into the boost and the boost's Staked event.
        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 2),
                Transfer {
                    from: ALICE,
                    to: BOOST,
                    value: e18(250),
                },
            )
            .await
            .unwrap();
        let outcome = processor
            .handle_boost_staked(
                &client,
                at(BOOST, 2),
                BoostStake {
                    user: ALICE,
                    amount: e18(250),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Applied { ref episodes } if episodes.len() == 1));

        let alice = store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("0"));
        assert_eq!(alice.reward_pool_shares_balance(), &d("250"));
        assert_eq!(alice.total_shares_balance(), &d("250"));
        assert!(store.get_position(CHAIN, &VAULT, &BOOST).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_boost_withdraw_returns_direct_shares() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client();
        let stake = BoostStake {
            user: ALICE,
            amount: e18(100),
        };

        processor
            .handle_vault_transfer(&client, at(VAULT, 1), mint(ALICE, e18(250)))
            .await
            .unwrap();
        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 2),
                Transfer {
                    from: ALICE,
                    to: BOOST,
                    value: e18(100),
                },
            )
            .await
            .unwrap();
        processor.handle_boost_staked(&client, at(BOOST, 2), stake).await.unwrap();
        processor.handle_boost_withdrawn(&client, at(BOOST, 3), stake).await.unwrap();
        processor
            .handle_vault_transfer(
                &client,
                at(VAULT, 3),
                Transfer {
                    from: BOOST,
                    to: ALICE,
                    value: e18(100),
                },
            )
            .await
            .unwrap();

        let alice = store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("250"));
        assert_eq!(alice.reward_pool_shares_balance(), &d("0"));
        assert_eq!(alice.total_shares_balance(), &d("250"));
    }

    #[tokio::test]
    async fn test_factory_boost_is_onboarded() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = vault_client().with_return(
            BOOST,
            &IRewardPool::stakedTokenCall {},
            (VAULT,).abi_encode_params(),
        );
        let deployed = ContractDeployed {
            address: BOOST,
            transaction_input: IVaultFactory::booooostCall {
                mooToken: VAULT,
                rewardToken: WANT,
                duration_in_sec: U256::from(86_400u64),
            }
            .abi_encode(),
        };
        let outcome = processor
            .handle_contract_deployed(&client, at(BOOST, 1), deployed)
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Onboarded));
        let boost = store.get_reward_pool(CHAIN, &BOOST).await.unwrap().unwrap();
        assert_eq!(boost.vault_address, VAULT);
    }

    fn lst_client() -> MockChainClient {
        MockChainClient::new(CHAIN)
            .with_return(LST, &IErc4626::assetCall {}, (WANT,).abi_encode_params())
            .with_return(LST, &IErc4626::totalAssetsCall {}, (e18(1100),).abi_encode_params())
            .with_return(LST, &IErc20::totalSupplyCall {}, (e18(1000),).abi_encode_params())
            .with_return(LST, &IErc20::decimalsCall {}, (U256::from(18u8),).abi_encode_params())
            .with_return(WANT, &IErc20::decimalsCall {}, (U256::from(18u8),).abi_encode_params())
    }

    #[tokio::test]
    async fn test_lst_mint_opens_position_with_breakdown() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());

        let outcome = processor
            .handle_lst_vault_transfer(&lst_client(), at(LST, 5), mint(ALICE, e18(100)))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Applied { ref episodes } if episodes.len() == 1));

        let vault = store.get_vault(CHAIN, &LST).await.unwrap().unwrap();
        assert_eq!(vault.kind, VaultKind::LstVault);
        let alice = store.get_position(CHAIN, &LST, &ALICE).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("100"));
        assert_eq!(alice.last_breakdown_balances, vec![d("110")]);
    }

    #[tokio::test]
    async fn test_adapter_transfer_moves_direct_shares() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(store.clone());
        let client = lst_client();

        processor
            .handle_erc4626_adapter_transfer(&client, at(LST, 1), mint(ALICE, e18(40)))
            .await
            .unwrap();
        processor
            .handle_erc4626_adapter_transfer(
                &client,
                at(LST, 2),
                Transfer {
                    from: ALICE,
                    to: BOB,
                    value: e18(15),
                },
            )
            .await
            .unwrap();

        let vault = store.get_vault(CHAIN, &LST).await.unwrap().unwrap();
        assert_eq!(vault.kind, VaultKind::Erc4626Adapter);
        let bob = store.get_position(CHAIN, &LST, &BOB).await.unwrap().unwrap();
        assert_eq!(bob.direct_shares_balance(), &d("15"));
        let alice = store.get_position(CHAIN, &LST, &ALICE).await.unwrap().unwrap();
        assert_eq!(alice.direct_shares_balance(), &d("25"));
    }
}
