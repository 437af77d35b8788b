//! SQLite-backed entity store.
//!
//! Methods are organized across submodules by entity:
//! - `vaults.rs` - vaults, investors, tokens, reward pools
//! - `positions.rs` - investor positions and breakdown history
//! - `markers.rs` - clock ticks and contract statuses
//!
//! Addresses are stored as lowercase hex, decimals as canonical strings and decimal
//! vectors as JSON arrays of strings.

mod markers;
mod positions;
mod vaults;

use super::store::{EntityStore, StoreError};
use crate::domain::{
    address_key, Address, ChainId, ClockTick, ContractStatus, Decimal, Investor,
    InvestorPosition, InvestorPositionBreakdown, RewardPool, Token, Vault, VaultBalanceBreakdown,
};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;

/// Repository for ledger persistence.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn u64_col(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn u64_from_col(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn parse_address(id: &str, raw: &str) -> Result<Address, StoreError> {
    Address::from_str(raw).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        message: format!("bad address {}: {}", raw, e),
    })
}

fn parse_decimal(id: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str_canonical(raw).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        message: format!("bad decimal {}: {}", raw, e),
    })
}

/// Parse a snake_case enum tag such as a blacklist status or vault kind.
fn parse_tag<T: FromStr<Err = String>>(id: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(|message| StoreError::Corrupt {
        id: id.to_string(),
        message,
    })
}

fn decimals_json(values: &[Decimal]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(values)?)
}

fn decimals_from_json(raw: &str) -> Result<Vec<Decimal>, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn addresses_json(values: &[Address]) -> Result<String, StoreError> {
    let keys: Vec<String> = values.iter().map(address_key).collect();
    Ok(serde_json::to_string(&keys)?)
}

fn addresses_from_json(id: &str, raw: &str) -> Result<Vec<Address>, StoreError> {
    let keys: Vec<String> = serde_json::from_str(raw)?;
    keys.iter().map(|k| parse_address(id, k)).collect()
}

#[async_trait]
impl EntityStore for Repository {
    async fn get_vault(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Vault>, StoreError> {
        Repository::get_vault(self, chain_id, address).await
    }

    async fn save_vault(&self, vault: &Vault) -> Result<(), StoreError> {
        Repository::save_vault(self, vault).await
    }

    async fn list_vaults(&self, chain_id: ChainId) -> Result<Vec<Vault>, StoreError> {
        Repository::list_vaults(self, chain_id).await
    }

    async fn get_investor(&self, address: &Address) -> Result<Option<Investor>, StoreError> {
        Repository::get_investor(self, address).await
    }

    async fn save_investor(&self, investor: &Investor) -> Result<(), StoreError> {
        Repository::save_investor(self, investor).await
    }

    async fn get_position(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
    ) -> Result<Option<InvestorPosition>, StoreError> {
        Repository::get_position(self, chain_id, vault, investor).await
    }

    async fn save_position(&self, position: &InvestorPosition) -> Result<(), StoreError> {
        Repository::save_position(self, position).await
    }

    async fn list_positions_for_vault(
        &self,
        chain_id: ChainId,
        vault: &Address,
    ) -> Result<Vec<InvestorPosition>, StoreError> {
        Repository::list_positions_for_vault(self, chain_id, vault).await
    }

    async fn get_clock_tick(&self, id: &str) -> Result<Option<ClockTick>, StoreError> {
        Repository::get_clock_tick(self, id).await
    }

    async fn insert_clock_tick(&self, tick: &ClockTick) -> Result<bool, StoreError> {
        Repository::insert_clock_tick(self, tick).await
    }

    async fn get_token(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Token>, StoreError> {
        Repository::get_token(self, chain_id, address).await
    }

    async fn save_token(&self, token: &Token) -> Result<(), StoreError> {
        Repository::save_token(self, token).await
    }

    async fn get_reward_pool(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<RewardPool>, StoreError> {
        Repository::get_reward_pool(self, chain_id, address).await
    }

    async fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), StoreError> {
        Repository::save_reward_pool(self, pool).await
    }

    async fn save_vault_breakdown(
        &self,
        breakdown: &VaultBalanceBreakdown,
    ) -> Result<(), StoreError> {
        Repository::save_vault_breakdown(self, breakdown).await
    }

    async fn get_vault_breakdown(
        &self,
        id: &str,
    ) -> Result<Option<VaultBalanceBreakdown>, StoreError> {
        Repository::get_vault_breakdown(self, id).await
    }

    async fn save_position_breakdown(
        &self,
        breakdown: &InvestorPositionBreakdown,
    ) -> Result<(), StoreError> {
        Repository::save_position_breakdown(self, breakdown).await
    }

    async fn list_position_breakdowns(
        &self,
        position_id: &str,
    ) -> Result<Vec<InvestorPositionBreakdown>, StoreError> {
        Repository::list_position_breakdowns(self, position_id).await
    }

    async fn get_contract_status(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<ContractStatus>, StoreError> {
        Repository::get_contract_status(self, chain_id, address).await
    }

    async fn save_contract_status(&self, status: &ContractStatus) -> Result<(), StoreError> {
        Repository::save_contract_status(self, status).await
    }
}
