//! Lazy vault and staking-contract onboarding.
//!
//! A contract is onboarded the first time one of its events is processed. Reads that can
//! never succeed blacklist the contract permanently. Transient failures mark it
//! `maybe_blacklisted` and defer the event so the dispatcher can retry it.

use super::tokens::{TokenError, TokenRegistry};
use crate::breakdown::batch::ReadBatch;
use crate::chain::abi::{IBeefyVault, IClmManager, IErc4626, IRewardPool};
use crate::chain::ChainClient;
use crate::db::{EntityStore, StoreError};
use crate::domain::entities::synthetic_vault_id;
use crate::domain::{
    Address, BlacklistStatus, BlockNumber, RewardPool, StakingKind, Vault, VaultKind,
};
use crate::gate::ContractGate;
use crate::metadata::VaultCatalog;
use std::sync::Arc;
use tracing::{info, warn};

/// Platform recorded for vaults the catalog does not know.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// Whether a contract can be used for the event at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission<T> {
    Ready(T),
    /// Denylisted or permanently blacklisted.
    Blocked,
    /// A transient read failed; retry the event later.
    Deferred,
}

impl<T> Admission<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Admission<U> {
        match self {
            Admission::Ready(value) => Admission::Ready(f(value)),
            Admission::Blocked => Admission::Blocked,
            Admission::Deferred => Admission::Deferred,
        }
    }
}

/// What the share-token reads revealed about a contract.
enum Discovery {
    Found {
        kind: VaultKind,
        underlying: Vec<Address>,
        strategy: Address,
    },
    Broken(String),
    Transient(String),
}

/// Classic vaults expose `want()`, or `token()` before V5. CLM managers expose the
/// `wants()` pair instead.
async fn discover_beefy(client: &dyn ChainClient, block: BlockNumber, address: Address) -> Discovery {
    let mut batch = ReadBatch::new();
    let token = batch.push("vault.token", address, IBeefyVault::tokenCall {});
    let want = batch.push("vault.want", address, IBeefyVault::wantCall {});
    let wants = batch.push("manager.wants", address, IClmManager::wantsCall {});
    let strategy = batch.push("vault.strategy", address, IBeefyVault::strategyCall {});
    let results = match batch.execute(client, block, true).await {
        Ok(results) => results,
        Err(e) => return Discovery::Transient(e.to_string()),
    };

    let single = results
        .optional(&want)
        .map(|r| r._0)
        .or_else(|| results.optional(&token).map(|r| r._0));
    let (kind, underlying) = match (single, results.optional(&wants)) {
        (Some(want), _) => (VaultKind::Classic, vec![want]),
        (None, Some(pair)) if pair.token0 != Address::ZERO && pair.token1 != Address::ZERO => {
            (VaultKind::ClmManager, vec![pair.token0, pair.token1])
        }
        (None, Some(_)) => return Discovery::Broken("wants() returned the zero address".to_string()),
        (None, None) => {
            return Discovery::Broken("want(), token() and wants() all failed".to_string())
        }
    };
    match results.optional(&strategy) {
        Some(strategy) => Discovery::Found {
            kind,
            underlying,
            strategy: strategy._0,
        },
        None => Discovery::Transient("strategy() failed".to_string()),
    }
}

/// LST vaults and ERC-4626 adapters have no Beefy strategy; `asset()` is their only read.
async fn discover_erc4626(
    client: &dyn ChainClient,
    block: BlockNumber,
    address: Address,
    kind: VaultKind,
) -> Discovery {
    let mut batch = ReadBatch::new();
    let asset = batch.push("vault.asset", address, IErc4626::assetCall {});
    let results = match batch.execute(client, block, true).await {
        Ok(results) => results,
        Err(e) => return Discovery::Transient(e.to_string()),
    };
    match results.optional(&asset).map(|r| r._0) {
        Some(asset) if asset != Address::ZERO => Discovery::Found {
            kind,
            underlying: vec![asset],
            strategy: Address::ZERO,
        },
        Some(_) => Discovery::Broken("asset() returned the zero address".to_string()),
        None => Discovery::Broken("asset() failed".to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct Onboarder {
    store: Arc<dyn EntityStore>,
    catalog: VaultCatalog,
    tokens: TokenRegistry,
    gate: ContractGate,
}

impl Onboarder {
    pub fn new(
        store: Arc<dyn EntityStore>,
        catalog: VaultCatalog,
        tokens: TokenRegistry,
        gate: ContractGate,
    ) -> Self {
        Self {
            store,
            catalog,
            tokens,
            gate,
        }
    }

    pub fn gate(&self) -> &ContractGate {
        &self.gate
    }

    /// Load a Beefy share vault or CLM manager, onboarding it from chain reads on first
    /// sight.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn ensure_vault(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
    ) -> Result<Admission<Vault>, StoreError> {
        self.admit_vault(client, block, address, None).await
    }

    /// Load an LST vault or ERC-4626 adapter, onboarding it from its `asset()`.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn ensure_erc4626_vault(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
        kind: VaultKind,
    ) -> Result<Admission<Vault>, StoreError> {
        self.admit_vault(client, block, address, Some(kind)).await
    }

    async fn admit_vault(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
        erc4626: Option<VaultKind>,
    ) -> Result<Admission<Vault>, StoreError> {
        let chain_id = client.chain_id();
        if self.gate.is_blocked(chain_id, &address).await? {
            return Ok(Admission::Blocked);
        }
        if let Some(vault) = self.store.get_vault(chain_id, &address).await? {
            return Ok(Admission::Ready(vault));
        }

        info!(chain_id = %chain_id, vault = %address, block_number = %block, "Onboarding vault");

        let (label, discovery) = match erc4626 {
            Some(kind) => (kind.as_str(), discover_erc4626(client, block, address, kind).await),
            None => ("vault", discover_beefy(client, block, address).await),
        };
        let (kind, underlying, strategy_address) = match discovery {
            Discovery::Found {
                kind,
                underlying,
                strategy,
            } => (kind, underlying, strategy),
            Discovery::Broken(reason) => {
                self.gate
                    .record(chain_id, address, BlacklistStatus::Blacklisted, label, reason)
                    .await?;
                return Ok(Admission::Blocked);
            }
            Discovery::Transient(reason) => {
                self.gate
                    .record(chain_id, address, BlacklistStatus::MaybeBlacklisted, label, reason)
                    .await?;
                return Ok(Admission::Deferred);
            }
        };

        for token in std::iter::once(address).chain(underlying.iter().copied()) {
            match self.tokens.ensure(client, block, token).await {
                Ok(_) => {}
                Err(TokenError::Store(e)) => return Err(e),
                Err(TokenError::Read(e)) => {
                    self.gate
                        .record(
                            chain_id,
                            address,
                            BlacklistStatus::MaybeBlacklisted,
                            label,
                            format!("token {} metadata: {}", token, e),
                        )
                        .await?;
                    return Ok(Admission::Deferred);
                }
            }
        }

        let config = match self.catalog.config_for_address(chain_id, &address).await {
            Ok(config) => config,
            Err(e) => {
                warn!(chain_id = %chain_id, vault = %address, error = %e, "Catalog unavailable at onboarding, using synthetic id");
                None
            }
        };
        let (vault_id, platform) = match &config {
            Some(c) => (c.id.clone(), c.platform_id.clone()),
            None => (synthetic_vault_id(chain_id, &address), UNKNOWN_PLATFORM.to_string()),
        };

        let primary = underlying.first().copied().unwrap_or_default();
        let vault = Vault::new(chain_id, address, primary, strategy_address, vault_id, platform)
            .with_kind(kind, underlying);
        self.store.save_vault(&vault).await?;
        if let Some(config) = &config {
            for pool in &config.reward_pools {
                self.store
                    .save_reward_pool(&RewardPool::new(chain_id, pool.address, address))
                    .await?;
            }
            for boost in &config.boosts {
                self.store
                    .save_reward_pool(&RewardPool::boost(chain_id, boost.address, address))
                    .await?;
            }
        }
        self.gate
            .record(chain_id, address, BlacklistStatus::Ok, label, "")
            .await?;

        info!(
            chain_id = %chain_id,
            vault = %address,
            kind = %vault.kind,
            vault_id = %vault.vault_id,
            platform = %vault.underlying_platform,
            strategy = %strategy_address,
            "Vault onboarded"
        );
        Ok(Admission::Ready(vault))
    }

    /// Load a reward pool and its vault, onboarding both as needed.
    ///
    /// The pool's `stakedToken()` is the vault share token, which is the vault itself.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn ensure_reward_pool(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
    ) -> Result<Admission<(RewardPool, Vault)>, StoreError> {
        self.ensure_staking(client, block, address, StakingKind::RewardPool)
            .await
    }

    /// Load a boost and the vault whose shares it stakes.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn ensure_boost(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
    ) -> Result<Admission<(RewardPool, Vault)>, StoreError> {
        self.ensure_staking(client, block, address, StakingKind::Boost)
            .await
    }

    async fn ensure_staking(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
        address: Address,
        kind: StakingKind,
    ) -> Result<Admission<(RewardPool, Vault)>, StoreError> {
        let chain_id = client.chain_id();
        let label = kind.as_str();
        if self.gate.is_blocked(chain_id, &address).await? {
            return Ok(Admission::Blocked);
        }

        let vault_address = match self.store.get_reward_pool(chain_id, &address).await? {
            Some(pool) => pool.vault_address,
            None => {
                let mut batch = ReadBatch::new();
                let staked = batch.push("pool.stakedToken", address, IRewardPool::stakedTokenCall {});
                let results = match batch.execute(client, block, true).await {
                    Ok(results) => results,
                    Err(e) => {
                        self.gate
                            .record(chain_id, address, BlacklistStatus::MaybeBlacklisted, label, e.to_string())
                            .await?;
                        return Ok(Admission::Deferred);
                    }
                };
                match results.optional(&staked).map(|r| r._0) {
                    Some(vault) if vault != Address::ZERO => vault,
                    _ => {
                        self.gate
                            .record(
                                chain_id,
                                address,
                                BlacklistStatus::Blacklisted,
                                label,
                                "stakedToken() failed",
                            )
                            .await?;
                        return Ok(Admission::Blocked);
                    }
                }
            }
        };

        let vault = match self.ensure_vault(client, block, vault_address).await? {
            Admission::Ready(vault) => vault,
            Admission::Deferred => return Ok(Admission::Deferred),
            Admission::Blocked => {
                self.gate
                    .record(
                        chain_id,
                        address,
                        BlacklistStatus::Blacklisted,
                        label,
                        format!("staked token {} is not a tracked vault", vault_address),
                    )
                    .await?;
                return Ok(Admission::Blocked);
            }
        };

        let pool = match self.store.get_reward_pool(chain_id, &address).await? {
            Some(pool) => pool,
            None => {
                let pool = RewardPool {
                    kind,
                    ..RewardPool::new(chain_id, address, vault.address)
                };
                self.store.save_reward_pool(&pool).await?;
                self.gate
                    .record(chain_id, address, BlacklistStatus::Ok, label, "")
                    .await?;
                info!(chain_id = %chain_id, contract = %address, kind = %kind, vault = %vault.address, "Staking contract onboarded");
                pool
            }
        };
        Ok(Admission::Ready((pool, vault)))
    }
}
