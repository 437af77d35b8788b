//! Breakdown episodes: resolve a vault once, then allocate and accumulate per position.
//!
//! An episode moves through config lookup, resolution and allocation before persisting.
//! Recoverable failures end the episode as `Failed` and leave the last valid snapshot in
//! place. Only store failures escalate to the caller.

use super::tokens::{TokenError, TokenRegistry};
use crate::breakdown::{self, BreakdownError};
use crate::chain::{ChainClient, ChainError};
use crate::db::{EntityStore, StoreError};
use crate::domain::{
    Address, BlockNumber, Decimal, InvestorPosition, InvestorPositionBreakdown, Timestamp, Vault,
    VaultBalanceBreakdown,
};
use crate::engine::{accumulate, allocate, AccumulationKind, PreviousSnapshot};
use crate::metadata::{MetadataError, VaultCatalog};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("vault config unavailable: {0}")]
    ConfigUnavailable(#[from] MetadataError),
    #[error("vault {0} is not in the catalog")]
    ConfigMissing(Address),
    #[error("breakdown unavailable: {0}")]
    ResolutionUnavailable(#[from] BreakdownError),
    #[error("resolver timed out after {0:?}")]
    ResolverTimeout(Duration),
    #[error("token metadata unavailable: {0}")]
    TokenUnavailable(BreakdownError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TokenError> for EpisodeError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Read(e) => EpisodeError::TokenUnavailable(e),
            TokenError::Store(e) => EpisodeError::Store(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Vault share supply is zero; the last snapshot stays valid.
    ZeroSupply,
    /// Investor holds no shares.
    NoShares,
    /// Vault was never onboarded.
    UnknownVault,
    /// A later block was already applied to the position.
    StaleBlock,
}

#[derive(Debug)]
pub enum EpisodeOutcome {
    Persisted { positions: usize, resets: usize },
    Skipped(SkipReason),
    Failed(EpisodeError),
}

impl EpisodeOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, EpisodeOutcome::Persisted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Positions refreshed concurrently during a periodic episode.
    pub concurrency: usize,
    pub resolver_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            concurrency: 16,
            resolver_timeout: Duration::from_secs(30),
        }
    }
}

/// Vault-level result shared by every position in one episode.
#[derive(Debug, Clone)]
struct VaultSnapshot {
    block: BlockNumber,
    timestamp: Timestamp,
    total_supply: Decimal,
    balances: Vec<Decimal>,
}

enum VaultStep {
    Ready(VaultSnapshot),
    Skip(SkipReason),
}

enum PositionUpdate {
    Updated { reset: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct BreakdownOrchestrator {
    store: Arc<dyn EntityStore>,
    catalog: VaultCatalog,
    tokens: TokenRegistry,
    settings: OrchestratorSettings,
}

impl BreakdownOrchestrator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        catalog: VaultCatalog,
        tokens: TokenRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            tokens,
            settings,
        }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn catalog(&self) -> &VaultCatalog {
        &self.catalog
    }

    /// Reactive path: refresh one investor's breakdown after a share transfer.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn refresh_investor(
        &self,
        client: &dyn ChainClient,
        vault_address: Address,
        investor: Address,
        block: BlockNumber,
        timestamp: Timestamp,
    ) -> Result<EpisodeOutcome, StoreError> {
        let chain_id = client.chain_id();
        let Some(position) = self.store.get_position(chain_id, &vault_address, &investor).await?
        else {
            return Ok(EpisodeOutcome::Skipped(SkipReason::NoShares));
        };
        if !position.total_shares_balance().is_positive() {
            debug!(chain_id = %chain_id, vault = %vault_address, investor = %investor, "Investor holds no shares, skipping breakdown");
            return Ok(EpisodeOutcome::Skipped(SkipReason::NoShares));
        }

        let episode = async {
            let snapshot = match self
                .snapshot_vault(client, vault_address, block, timestamp)
                .await?
            {
                VaultStep::Ready(snapshot) => snapshot,
                VaultStep::Skip(reason) => return Ok(EpisodeOutcome::Skipped(reason)),
            };
            Ok::<_, EpisodeError>(match self.update_position(position, &snapshot).await? {
                PositionUpdate::Updated { reset } => EpisodeOutcome::Persisted {
                    positions: 1,
                    resets: usize::from(reset),
                },
                PositionUpdate::Skipped(reason) => EpisodeOutcome::Skipped(reason),
            })
        };
        let outcome = settle(episode.await)?;
        log_outcome("reactive", &outcome, client, vault_address, block);
        Ok(outcome)
    }

    /// Periodic path: refresh the vault and every position holding shares.
    ///
    /// Positions with no shares are still refreshed when their breakdown vector no
    /// longer matches the vault's token order, so the lengths stay aligned.
    ///
    /// # Errors
    /// Returns an error only when the store fails.
    pub async fn refresh_vault(
        &self,
        client: &dyn ChainClient,
        vault_address: Address,
        block: BlockNumber,
        timestamp: Timestamp,
    ) -> Result<EpisodeOutcome, StoreError> {
        let chain_id = client.chain_id();
        let episode = async {
            let snapshot = match self
                .snapshot_vault(client, vault_address, block, timestamp)
                .await?
            {
                VaultStep::Ready(snapshot) => snapshot,
                VaultStep::Skip(reason) => return Ok(EpisodeOutcome::Skipped(reason)),
            };

            let width = snapshot.balances.len();
            let positions: Vec<InvestorPosition> = self
                .store
                .list_positions_for_vault(chain_id, &vault_address)
                .await?
                .into_iter()
                .filter(|p| {
                    p.total_shares_balance().is_positive()
                        || (p.has_breakdown() && p.last_breakdown_balances.len() != width)
                })
                .collect();

            let results: Vec<Result<PositionUpdate, EpisodeError>> = stream::iter(positions)
                .map(|position| self.update_position(position, &snapshot))
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

            let mut updated = 0;
            let mut resets = 0;
            for result in results {
                match result? {
                    PositionUpdate::Updated { reset } => {
                        updated += 1;
                        resets += usize::from(reset);
                    }
                    PositionUpdate::Skipped(_) => {}
                }
            }
            Ok::<_, EpisodeError>(EpisodeOutcome::Persisted {
                positions: updated,
                resets,
            })
        };
        let outcome = settle(episode.await)?;
        log_outcome("periodic", &outcome, client, vault_address, block);
        Ok(outcome)
    }

    /// Resolve the vault, persist its snapshot and return the normalized balances.
    async fn snapshot_vault(
        &self,
        client: &dyn ChainClient,
        vault_address: Address,
        block: BlockNumber,
        timestamp: Timestamp,
    ) -> Result<VaultStep, EpisodeError> {
        let chain_id = client.chain_id();
        let Some(mut vault) = self.store.get_vault(chain_id, &vault_address).await? else {
            return Ok(VaultStep::Skip(SkipReason::UnknownVault));
        };
        // Vaults the catalog does not list still resolve when their kind implies a recipe.
        let config = match self.catalog.config_for_address(chain_id, &vault_address).await? {
            Some(config) => config,
            None => vault
                .implied_config()
                .ok_or(EpisodeError::ConfigMissing(vault_address))?,
        };

        let resolved = tokio::time::timeout(
            self.settings.resolver_timeout,
            breakdown::resolve(client, block, &config),
        )
        .await
        .map_err(|_| EpisodeError::ResolverTimeout(self.settings.resolver_timeout))??;

        let share_token = self.tokens.ensure(client, block, vault.shares_token).await?;
        let total_supply = Decimal::from_raw(resolved.vault_total_supply, share_token.decimals);

        let mut tokens = Vec::with_capacity(resolved.balances.len());
        let mut balances = Vec::with_capacity(resolved.balances.len());
        for entry in &resolved.balances {
            let token = self.tokens.ensure(client, block, entry.token).await?;
            tokens.push(entry.token);
            balances.push(Decimal::from_raw(entry.raw_balance, token.decimals));
        }

        if !total_supply.is_positive() {
            return Ok(VaultStep::Skip(SkipReason::ZeroSupply));
        }

        self.persist_vault(
            &mut vault,
            &tokens,
            &balances,
            &total_supply,
            block,
            timestamp,
            resolved.is_liquidity_eligible,
        )
        .await?;

        Ok(VaultStep::Ready(VaultSnapshot {
            block,
            timestamp,
            total_supply,
            balances,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_vault(
        &self,
        vault: &mut Vault,
        tokens: &[Address],
        balances: &[Decimal],
        total_supply: &Decimal,
        block: BlockNumber,
        timestamp: Timestamp,
        is_liquidity_eligible: bool,
    ) -> Result<(), StoreError> {
        if vault.breakdown_tokens_order != tokens && !vault.breakdown_tokens_order.is_empty() {
            warn!(
                chain_id = %vault.chain_id,
                vault = %vault.address,
                previous = vault.breakdown_tokens_order.len(),
                current = tokens.len(),
                "Vault breakdown token set changed"
            );
        }
        vault.breakdown_tokens_order = tokens.to_vec();
        vault.shares_token_total_supply = total_supply.clone();
        vault.last_breakdown_update_block = block;
        vault.last_breakdown_update_timestamp = timestamp;
        self.store.save_vault(vault).await?;

        self.store
            .save_vault_breakdown(&VaultBalanceBreakdown {
                id: VaultBalanceBreakdown::id_for(vault.chain_id, &vault.address, block),
                chain_id: vault.chain_id,
                vault_address: vault.address,
                block_number: block,
                timestamp,
                tokens: tokens.to_vec(),
                balances: balances.to_vec(),
                is_liquidity_eligible,
            })
            .await
    }

    async fn update_position(
        &self,
        mut position: InvestorPosition,
        snapshot: &VaultSnapshot,
    ) -> Result<PositionUpdate, EpisodeError> {
        if position.has_breakdown() && position.last_breakdown_block > snapshot.block {
            return Ok(PositionUpdate::Skipped(SkipReason::StaleBlock));
        }
        let Some(balances) = allocate(
            position.total_shares_balance(),
            &snapshot.total_supply,
            &snapshot.balances,
        ) else {
            return Ok(PositionUpdate::Skipped(SkipReason::ZeroSupply));
        };

        let accumulation = accumulate(
            PreviousSnapshot {
                balances: &position.last_breakdown_balances,
                time_weighted: &position.last_breakdown_time_weighted_balances,
                timestamp: position.last_breakdown_timestamp,
            },
            balances,
            snapshot.timestamp,
        );
        if let AccumulationKind::Reset {
            previous_len,
            new_len,
        } = accumulation.kind
        {
            warn!(
                chain_id = %position.chain_id,
                vault = %position.vault_address,
                investor = %position.investor_address,
                previous_len,
                new_len,
                "Breakdown token set changed, time-weighted balances reset"
            );
        }
        let reset = accumulation.is_reset();

        position.last_breakdown_balances = accumulation.balances;
        position.last_breakdown_time_weighted_balances = accumulation.time_weighted;
        position.last_breakdown_timestamp = snapshot.timestamp;
        position.last_breakdown_block = snapshot.block;

        self.store
            .save_position_breakdown(&InvestorPositionBreakdown {
                id: InvestorPositionBreakdown::id_for(&position.id, snapshot.block),
                position_id: position.id.clone(),
                chain_id: position.chain_id,
                block_number: snapshot.block,
                timestamp: snapshot.timestamp,
                balances: position.last_breakdown_balances.clone(),
                time_weighted_balances: position.last_breakdown_time_weighted_balances.clone(),
            })
            .await?;
        self.store.save_position(&position).await?;

        Ok(PositionUpdate::Updated { reset })
    }
}

/// Turn recoverable episode errors into a `Failed` outcome; store errors escalate.
fn settle(result: Result<EpisodeOutcome, EpisodeError>) -> Result<EpisodeOutcome, StoreError> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(EpisodeError::Store(e)) => Err(e),
        Err(other) => Ok(EpisodeOutcome::Failed(other)),
    }
}

fn log_outcome(
    path: &'static str,
    outcome: &EpisodeOutcome,
    client: &dyn ChainClient,
    vault: Address,
    block: BlockNumber,
) {
    let chain_id = client.chain_id();
    match outcome {
        EpisodeOutcome::Persisted { positions, resets } => info!(
            chain_id = %chain_id,
            vault = %vault,
            block_number = %block,
            positions,
            resets,
            path,
            "Breakdown episode persisted"
        ),
        EpisodeOutcome::Skipped(reason) => warn!(
            chain_id = %chain_id,
            vault = %vault,
            block_number = %block,
            reason = ?reason,
            path,
            "Breakdown episode skipped"
        ),
        EpisodeOutcome::Failed(error) => warn!(
            chain_id = %chain_id,
            vault = %vault,
            block_number = %block,
            error = %error,
            path,
            "Breakdown episode failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::IBeefyVault;
    use crate::chain::MockChainClient;
    use crate::db::MemoryStore;
    use crate::domain::{ChainId, ProtocolType, Token, VaultConfig, U256};
    use crate::metadata::StaticMetadataSource;
    use alloy_sol_types::SolValue;

    const CHAIN: ChainId = ChainId(10);
    const VAULT: Address = Address::repeat_byte(0x10);
    const USDC: Address = Address::repeat_byte(0x20);
    const ALICE: Address = Address::repeat_byte(0xA1);

    fn config() -> VaultConfig {
        VaultConfig {
            id: "aave-usdc".to_string(),
            chain_id: CHAIN,
            vault_address: VAULT,
            strategy_address: Address::repeat_byte(0x12),
            underlying_lp_address: USDC,
            protocol_type: ProtocolType::Aave,
            reward_pools: vec![],
            boosts: vec![],
            platform_id: "aave".to_string(),
            is_active: true,
        }
    }

    async fn setup(
        configs: Vec<VaultConfig>,
        settings: OrchestratorSettings,
    ) -> (Arc<MemoryStore>, BreakdownOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        store
            .save_vault(&Vault::new(
                CHAIN,
                VAULT,
                USDC,
                Address::repeat_byte(0x12),
                "aave-usdc".to_string(),
                "aave".to_string(),
            ))
            .await
            .unwrap();
        store.save_token(&Token::new(CHAIN, VAULT, 18, "mooUSDC".to_string())).await.unwrap();
        store.save_token(&Token::new(CHAIN, USDC, 6, "USDC".to_string())).await.unwrap();
        let position = InvestorPosition::new(CHAIN, VAULT, ALICE)
            .with_share_balances(Decimal::from(10u64), Decimal::zero());
        store.save_position(&position).await.unwrap();

        let catalog = VaultCatalog::new(Arc::new(
            StaticMetadataSource::new().with_configs(CHAIN, configs),
        ));
        let orchestrator = BreakdownOrchestrator::new(
            store.clone(),
            catalog,
            TokenRegistry::new(store.clone()),
            settings,
        );
        (store, orchestrator)
    }

    /// 100 shares over 50 USDC.
    fn vault_reads() -> MockChainClient {
        let supply = U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64));
        MockChainClient::new(CHAIN)
            .with_return(
                VAULT,
                &IBeefyVault::totalSupplyCall {},
                (supply,).abi_encode_params(),
            )
            .with_return(
                VAULT,
                &IBeefyVault::balanceCall {},
                (U256::from(50_000_000u64),).abi_encode_params(),
            )
    }

    #[tokio::test]
    async fn test_reactive_refresh_allocates_share() {
        let (store, orchestrator) = setup(vec![config()], OrchestratorSettings::default()).await;
        let outcome = orchestrator
            .refresh_investor(&vault_reads(), VAULT, ALICE, BlockNumber::new(2), Timestamp::new(100))
            .await
            .unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Persisted { positions: 1, resets: 0 }));

        let position = store.get_position(CHAIN, &VAULT, &ALICE).await.unwrap().unwrap();
        assert_eq!(position.last_breakdown_balances, vec![Decimal::from(5u64)]);
    }

    #[tokio::test]
    async fn test_slow_resolver_times_out() {
        let settings = OrchestratorSettings {
            concurrency: 1,
            resolver_timeout: Duration::from_millis(10),
        };
        let (store, orchestrator) = setup(vec![config()], settings).await;
        let client = vault_reads().with_latency(Duration::from_millis(200));

        let outcome = orchestrator
            .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(100))
            .await
            .unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Failed(EpisodeError::ResolverTimeout(_))));
        let vault = store.get_vault(CHAIN, &VAULT).await.unwrap().unwrap();
        assert!(vault.breakdown_tokens_order.is_empty());
    }

    #[tokio::test]
    async fn test_reverting_read_fails_episode() {
        let (_store, orchestrator) = setup(vec![config()], OrchestratorSettings::default()).await;
        let client = vault_reads().with_revert(VAULT, &IBeefyVault::balanceCall {});

        let outcome = orchestrator
            .refresh_vault(&client, VAULT, BlockNumber::new(2), Timestamp::new(100))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            EpisodeOutcome::Failed(EpisodeError::ResolutionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_config_fails_episode() {
        let (_store, orchestrator) = setup(vec![], OrchestratorSettings::default()).await;
        let outcome = orchestrator
            .refresh_vault(&vault_reads(), VAULT, BlockNumber::new(2), Timestamp::new(100))
            .await
            .unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Failed(EpisodeError::ConfigMissing(_))));
    }

    #[tokio::test]
    async fn test_stale_block_is_skipped() {
        let (_store, orchestrator) = setup(vec![config()], OrchestratorSettings::default()).await;
        let client = vault_reads();
        orchestrator
            .refresh_investor(&client, VAULT, ALICE, BlockNumber::new(5), Timestamp::new(500))
            .await
            .unwrap();

        let outcome = orchestrator
            .refresh_investor(&client, VAULT, ALICE, BlockNumber::new(4), Timestamp::new(400))
            .await
            .unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Skipped(SkipReason::StaleBlock)));
    }

    #[tokio::test]
    async fn test_unknown_vault_is_skipped() {
        let (_store, orchestrator) = setup(vec![config()], OrchestratorSettings::default()).await;
        let outcome = orchestrator
            .refresh_vault(
                &vault_reads(),
                Address::repeat_byte(0x99),
                BlockNumber::new(2),
                Timestamp::new(100),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Skipped(SkipReason::UnknownVault)));
    }
}
