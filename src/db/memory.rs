//! In-memory entity store for tests and dry runs.

use super::store::{EntityStore, StoreError};
use crate::domain::entities::{position_entity_id, token_entity_id, vault_entity_id};
use crate::domain::{
    address_key, Address, ChainId, ClockTick, ContractStatus, Investor, InvestorPosition,
    InvestorPositionBreakdown, RewardPool, Token, Vault, VaultBalanceBreakdown,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    vaults: BTreeMap<String, Vault>,
    investors: HashMap<String, Investor>,
    positions: BTreeMap<String, InvestorPosition>,
    clock_ticks: HashMap<String, ClockTick>,
    tokens: HashMap<String, Token>,
    reward_pools: HashMap<String, RewardPool>,
    vault_breakdowns: HashMap<String, VaultBalanceBreakdown>,
    position_breakdowns: BTreeMap<String, InvestorPositionBreakdown>,
    contract_statuses: HashMap<(ChainId, String), ContractStatus>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_vault(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Vault>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.vaults.get(&vault_entity_id(chain_id, address)).cloned())
    }

    async fn save_vault(&self, vault: &Vault) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.vaults.insert(vault.id.clone(), vault.clone());
        Ok(())
    }

    async fn list_vaults(&self, chain_id: ChainId) -> Result<Vec<Vault>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .vaults
            .values()
            .filter(|v| v.chain_id == chain_id)
            .cloned()
            .collect())
    }

    async fn get_investor(&self, address: &Address) -> Result<Option<Investor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.investors.get(&address_key(address)).cloned())
    }

    async fn save_investor(&self, investor: &Investor) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.investors.insert(investor.id.clone(), investor.clone());
        Ok(())
    }

    async fn get_position(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
    ) -> Result<Option<InvestorPosition>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .positions
            .get(&position_entity_id(chain_id, vault, investor))
            .cloned())
    }

    async fn save_position(&self, position: &InvestorPosition) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.positions.insert(position.id.clone(), position.clone());
        Ok(())
    }

    async fn list_positions_for_vault(
        &self,
        chain_id: ChainId,
        vault: &Address,
    ) -> Result<Vec<InvestorPosition>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .positions
            .values()
            .filter(|p| p.chain_id == chain_id && p.vault_address == *vault)
            .cloned()
            .collect())
    }

    async fn get_clock_tick(&self, id: &str) -> Result<Option<ClockTick>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.clock_ticks.get(id).cloned())
    }

    async fn insert_clock_tick(&self, tick: &ClockTick) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.clock_ticks.contains_key(&tick.id) {
            return Ok(false);
        }
        tables.clock_ticks.insert(tick.id.clone(), tick.clone());
        Ok(true)
    }

    async fn get_token(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Token>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.get(&token_entity_id(chain_id, address)).cloned())
    }

    async fn save_token(&self, token: &Token) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn get_reward_pool(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<RewardPool>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reward_pools
            .get(&vault_entity_id(chain_id, address))
            .cloned())
    }

    async fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.reward_pools.insert(pool.id.clone(), pool.clone());
        Ok(())
    }

    async fn save_vault_breakdown(
        &self,
        breakdown: &VaultBalanceBreakdown,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .vault_breakdowns
            .insert(breakdown.id.clone(), breakdown.clone());
        Ok(())
    }

    async fn get_vault_breakdown(
        &self,
        id: &str,
    ) -> Result<Option<VaultBalanceBreakdown>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.vault_breakdowns.get(id).cloned())
    }

    async fn save_position_breakdown(
        &self,
        breakdown: &InvestorPositionBreakdown,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .position_breakdowns
            .insert(breakdown.id.clone(), breakdown.clone());
        Ok(())
    }

    async fn list_position_breakdowns(
        &self,
        position_id: &str,
    ) -> Result<Vec<InvestorPositionBreakdown>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<InvestorPositionBreakdown> = tables
            .position_breakdowns
            .values()
            .filter(|b| b.position_id == position_id)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.block_number);
        Ok(rows)
    }

    async fn get_contract_status(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<ContractStatus>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .contract_statuses
            .get(&(chain_id, address_key(address)))
            .cloned())
    }

    async fn save_contract_status(&self, status: &ContractStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .contract_statuses
            .insert((status.chain_id, address_key(&status.address)), status.clone());
        Ok(())
    }
}
