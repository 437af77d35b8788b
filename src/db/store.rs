//! Entity store abstraction shared by the in-memory and SQLite backends.
//!
//! Implementations must be read-your-writes: a `save_*` followed by a `get_*` on the same
//! store observes the saved value.

use crate::domain::{
    Address, ChainId, ClockTick, ContractStatus, Investor, InvestorPosition,
    InvestorPositionBreakdown, RewardPool, Token, Vault, VaultBalanceBreakdown,
};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row {id}: {message}")]
    Corrupt { id: String, message: String },
}

#[async_trait]
pub trait EntityStore: Send + Sync + fmt::Debug {
    async fn get_vault(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Vault>, StoreError>;

    async fn save_vault(&self, vault: &Vault) -> Result<(), StoreError>;

    /// All vaults on a chain, ordered by id.
    async fn list_vaults(&self, chain_id: ChainId) -> Result<Vec<Vault>, StoreError>;

    async fn get_investor(&self, address: &Address) -> Result<Option<Investor>, StoreError>;

    async fn save_investor(&self, investor: &Investor) -> Result<(), StoreError>;

    async fn get_position(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
    ) -> Result<Option<InvestorPosition>, StoreError>;

    async fn save_position(&self, position: &InvestorPosition) -> Result<(), StoreError>;

    /// All positions of a vault, ordered by id.
    async fn list_positions_for_vault(
        &self,
        chain_id: ChainId,
        vault: &Address,
    ) -> Result<Vec<InvestorPosition>, StoreError>;

    async fn get_clock_tick(&self, id: &str) -> Result<Option<ClockTick>, StoreError>;

    /// Write the marker if absent. Returns false if it already existed.
    async fn insert_clock_tick(&self, tick: &ClockTick) -> Result<bool, StoreError>;

    async fn get_token(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Token>, StoreError>;

    async fn save_token(&self, token: &Token) -> Result<(), StoreError>;

    async fn get_reward_pool(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<RewardPool>, StoreError>;

    async fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), StoreError>;

    /// Upsert keyed by `(vault, block)`.
    async fn save_vault_breakdown(
        &self,
        breakdown: &VaultBalanceBreakdown,
    ) -> Result<(), StoreError>;

    async fn get_vault_breakdown(
        &self,
        id: &str,
    ) -> Result<Option<VaultBalanceBreakdown>, StoreError>;

    /// Upsert keyed by `(position, block)`.
    async fn save_position_breakdown(
        &self,
        breakdown: &InvestorPositionBreakdown,
    ) -> Result<(), StoreError>;

    /// History of a position's breakdowns, ordered by block.
    async fn list_position_breakdowns(
        &self,
        position_id: &str,
    ) -> Result<Vec<InvestorPositionBreakdown>, StoreError>;

    async fn get_contract_status(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<ContractStatus>, StoreError>;

    async fn save_contract_status(&self, status: &ContractStatus) -> Result<(), StoreError>;
}
