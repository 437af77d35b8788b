//! Clock tick markers and contract status operations for the repository.

use crate::db::store::StoreError;
use crate::domain::{
    address_key, Address, BlacklistStatus, BlockNumber, ChainId, ClockTick, ContractStatus,
    Timestamp,
};
use sqlx::Row;

use super::{parse_address, parse_tag, u64_col, u64_from_col, Repository};

impl Repository {
    // ===== Clock ticks =====

    pub async fn get_clock_tick(&self, id: &str) -> Result<Option<ClockTick>, StoreError> {
        let row = sqlx::query("SELECT * FROM clock_ticks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(ClockTick {
                id: row.try_get("id")?,
                chain_id: ChainId::new(u64_from_col(row.try_get("chain_id")?)),
                rounded_timestamp: Timestamp::new(u64_from_col(row.try_get("rounded_timestamp")?)),
                period_secs: u64_from_col(row.try_get("period_secs")?),
                block_number: BlockNumber::new(u64_from_col(row.try_get("block_number")?)),
            })),
            None => Ok(None),
        }
    }

    /// Write the marker if absent.
    ///
    /// Returns false when a marker with the same id already exists; the existing row
    /// is left untouched.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_clock_tick(&self, tick: &ClockTick) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO clock_ticks (id, chain_id, rounded_timestamp, period_secs, block_number)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&tick.id)
        .bind(u64_col(tick.chain_id.as_u64()))
        .bind(u64_col(tick.rounded_timestamp.as_secs()))
        .bind(u64_col(tick.period_secs))
        .bind(u64_col(tick.block_number.as_u64()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Contract statuses =====

    pub async fn get_contract_status(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<ContractStatus>, StoreError> {
        let key = address_key(address);
        let row = sqlx::query(
            "SELECT status, reason FROM contract_statuses WHERE chain_id = ? AND address = ?",
        )
        .bind(u64_col(chain_id.as_u64()))
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let status: BlacklistStatus = parse_tag(&key, &row.try_get::<String, _>("status")?)?;
        Ok(Some(ContractStatus {
            chain_id,
            address: parse_address(&key, &key)?,
            status,
            reason: row.try_get("reason")?,
        }))
    }

    pub async fn save_contract_status(&self, status: &ContractStatus) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contract_statuses (chain_id, address, status, reason)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chain_id, address) DO UPDATE SET
                status = excluded.status,
                reason = excluded.reason
            "#,
        )
        .bind(u64_col(status.chain_id.as_u64()))
        .bind(address_key(&status.address))
        .bind(status.status.as_str())
        .bind(&status.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
