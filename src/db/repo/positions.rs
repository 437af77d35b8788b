//! Investor position and breakdown history operations for the repository.

use crate::db::store::StoreError;
use crate::domain::entities::position_entity_id;
use crate::domain::{
    address_key, Address, BlockNumber, ChainId, InvestorPosition, InvestorPositionBreakdown,
    Timestamp, VaultBalanceBreakdown,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    addresses_from_json, addresses_json, decimals_from_json, decimals_json, parse_address,
    parse_decimal, u64_col, u64_from_col, Repository,
};

fn position_from_row(row: &SqliteRow) -> Result<InvestorPosition, StoreError> {
    let id: String = row.try_get("id")?;
    let chain_id = ChainId::new(u64_from_col(row.try_get("chain_id")?));
    let vault = parse_address(&id, &row.try_get::<String, _>("vault_address")?)?;
    let investor = parse_address(&id, &row.try_get::<String, _>("investor_address")?)?;
    let direct = parse_decimal(&id, &row.try_get::<String, _>("direct_shares_balance")?)?;
    let reward_pool = parse_decimal(&id, &row.try_get::<String, _>("reward_pool_shares_balance")?)?;

    let mut position =
        InvestorPosition::new(chain_id, vault, investor).with_share_balances(direct, reward_pool);
    position.last_breakdown_balances =
        decimals_from_json(&row.try_get::<String, _>("last_breakdown_balances")?)?;
    position.last_breakdown_time_weighted_balances = decimals_from_json(
        &row.try_get::<String, _>("last_breakdown_time_weighted_balances")?,
    )?;
    position.last_breakdown_timestamp =
        Timestamp::new(u64_from_col(row.try_get("last_breakdown_timestamp")?));
    position.last_breakdown_block =
        BlockNumber::new(u64_from_col(row.try_get("last_breakdown_block")?));

    if position.id != id {
        return Err(StoreError::Corrupt {
            id,
            message: "position id does not match its chain, vault and investor".to_string(),
        });
    }
    Ok(position)
}

fn position_breakdown_from_row(row: &SqliteRow) -> Result<InvestorPositionBreakdown, StoreError> {
    Ok(InvestorPositionBreakdown {
        id: row.try_get("id")?,
        position_id: row.try_get("position_id")?,
        chain_id: ChainId::new(u64_from_col(row.try_get("chain_id")?)),
        block_number: BlockNumber::new(u64_from_col(row.try_get("block_number")?)),
        timestamp: Timestamp::new(u64_from_col(row.try_get("timestamp")?)),
        balances: decimals_from_json(&row.try_get::<String, _>("balances")?)?,
        time_weighted_balances: decimals_from_json(
            &row.try_get::<String, _>("time_weighted_balances")?,
        )?,
    })
}

impl Repository {
    // ===== Position operations =====

    /// Load the position of `investor` in `vault`.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_position(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
    ) -> Result<Option<InvestorPosition>, StoreError> {
        let row = sqlx::query("SELECT * FROM investor_positions WHERE id = ?")
            .bind(position_entity_id(chain_id, vault, investor))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    /// Upsert a position. The stored total is always the sum of its components.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn save_position(&self, position: &InvestorPosition) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO investor_positions (
                id, chain_id, vault_address, investor_address,
                direct_shares_balance, reward_pool_shares_balance, total_shares_balance,
                last_breakdown_balances, last_breakdown_time_weighted_balances,
                last_breakdown_timestamp, last_breakdown_block
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                direct_shares_balance = excluded.direct_shares_balance,
                reward_pool_shares_balance = excluded.reward_pool_shares_balance,
                total_shares_balance = excluded.total_shares_balance,
                last_breakdown_balances = excluded.last_breakdown_balances,
                last_breakdown_time_weighted_balances = excluded.last_breakdown_time_weighted_balances,
                last_breakdown_timestamp = excluded.last_breakdown_timestamp,
                last_breakdown_block = excluded.last_breakdown_block
            "#,
        )
        .bind(&position.id)
        .bind(u64_col(position.chain_id.as_u64()))
        .bind(address_key(&position.vault_address))
        .bind(address_key(&position.investor_address))
        .bind(position.direct_shares_balance().to_canonical_string())
        .bind(position.reward_pool_shares_balance().to_canonical_string())
        .bind(position.total_shares_balance().to_canonical_string())
        .bind(decimals_json(&position.last_breakdown_balances)?)
        .bind(decimals_json(&position.last_breakdown_time_weighted_balances)?)
        .bind(u64_col(position.last_breakdown_timestamp.as_secs()))
        .bind(u64_col(position.last_breakdown_block.as_u64()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All positions of a vault, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_positions_for_vault(
        &self,
        chain_id: ChainId,
        vault: &Address,
    ) -> Result<Vec<InvestorPosition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM investor_positions
            WHERE chain_id = ? AND vault_address = ?
            ORDER BY id ASC
            "#,
        )
        .bind(u64_col(chain_id.as_u64()))
        .bind(address_key(vault))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(position_from_row).collect()
    }

    // ===== Breakdown history =====

    pub async fn save_vault_breakdown(
        &self,
        breakdown: &VaultBalanceBreakdown,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO vault_balance_breakdowns (
                id, chain_id, vault_address, block_number, timestamp, tokens, balances,
                is_liquidity_eligible
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                timestamp = excluded.timestamp,
                tokens = excluded.tokens,
                balances = excluded.balances,
                is_liquidity_eligible = excluded.is_liquidity_eligible
            "#,
        )
        .bind(&breakdown.id)
        .bind(u64_col(breakdown.chain_id.as_u64()))
        .bind(address_key(&breakdown.vault_address))
        .bind(u64_col(breakdown.block_number.as_u64()))
        .bind(u64_col(breakdown.timestamp.as_secs()))
        .bind(addresses_json(&breakdown.tokens)?)
        .bind(decimals_json(&breakdown.balances)?)
        .bind(i32::from(breakdown.is_liquidity_eligible))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_vault_breakdown(
        &self,
        id: &str,
    ) -> Result<Option<VaultBalanceBreakdown>, StoreError> {
        let row = sqlx::query("SELECT * FROM vault_balance_breakdowns WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let chain_id = ChainId::new(u64_from_col(row.try_get("chain_id")?));
        let vault_address = parse_address(id, &row.try_get::<String, _>("vault_address")?)?;
        let block_number = BlockNumber::new(u64_from_col(row.try_get("block_number")?));
        Ok(Some(VaultBalanceBreakdown {
            id: row.try_get("id")?,
            chain_id,
            vault_address,
            block_number,
            timestamp: Timestamp::new(u64_from_col(row.try_get("timestamp")?)),
            tokens: addresses_from_json(id, &row.try_get::<String, _>("tokens")?)?,
            balances: decimals_from_json(&row.try_get::<String, _>("balances")?)?,
            is_liquidity_eligible: row.try_get::<i32, _>("is_liquidity_eligible")? != 0,
        }))
    }

    pub async fn save_position_breakdown(
        &self,
        breakdown: &InvestorPositionBreakdown,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO investor_position_breakdowns (
                id, position_id, chain_id, block_number, timestamp, balances,
                time_weighted_balances
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                timestamp = excluded.timestamp,
                balances = excluded.balances,
                time_weighted_balances = excluded.time_weighted_balances
            "#,
        )
        .bind(&breakdown.id)
        .bind(&breakdown.position_id)
        .bind(u64_col(breakdown.chain_id.as_u64()))
        .bind(u64_col(breakdown.block_number.as_u64()))
        .bind(u64_col(breakdown.timestamp.as_secs()))
        .bind(decimals_json(&breakdown.balances)?)
        .bind(decimals_json(&breakdown.time_weighted_balances)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// History of a position's breakdowns, ordered by block.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_position_breakdowns(
        &self,
        position_id: &str,
    ) -> Result<Vec<InvestorPositionBreakdown>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM investor_position_breakdowns
            WHERE position_id = ?
            ORDER BY block_number ASC
            "#,
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(position_breakdown_from_row).collect()
    }
}
