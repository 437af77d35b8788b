//! Vault, investor, token and reward pool operations for the repository.

use crate::db::store::StoreError;
use crate::domain::entities::{token_entity_id, vault_entity_id};
use crate::domain::{
    address_key, Address, BlockNumber, ChainId, Investor, RewardPool, Timestamp, Token, Vault,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    addresses_from_json, addresses_json, parse_address, parse_decimal, parse_tag, u64_col,
    u64_from_col, Repository,
};

fn vault_from_row(row: &SqliteRow) -> Result<Vault, StoreError> {
    let id: String = row.try_get("id")?;
    Ok(Vault {
        chain_id: ChainId::new(u64_from_col(row.try_get("chain_id")?)),
        address: parse_address(&id, &row.try_get::<String, _>("address")?)?,
        kind: parse_tag(&id, &row.try_get::<String, _>("kind")?)?,
        shares_token: parse_address(&id, &row.try_get::<String, _>("shares_token")?)?,
        underlying_tokens: addresses_from_json(
            &id,
            &row.try_get::<String, _>("underlying_tokens")?,
        )?,
        strategy_address: parse_address(&id, &row.try_get::<String, _>("strategy_address")?)?,
        underlying_platform: row.try_get("underlying_platform")?,
        vault_id: row.try_get("vault_id")?,
        breakdown_tokens_order: addresses_from_json(
            &id,
            &row.try_get::<String, _>("breakdown_tokens_order")?,
        )?,
        shares_token_total_supply: parse_decimal(
            &id,
            &row.try_get::<String, _>("shares_token_total_supply")?,
        )?,
        last_breakdown_update_block: BlockNumber::new(u64_from_col(
            row.try_get("last_breakdown_update_block")?,
        )),
        last_breakdown_update_timestamp: Timestamp::new(u64_from_col(
            row.try_get("last_breakdown_update_timestamp")?,
        )),
        id,
    })
}

impl Repository {
    // ===== Vault operations =====

    /// Load a vault by chain and address.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_vault(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Vault>, StoreError> {
        let row = sqlx::query("SELECT * FROM vaults WHERE id = ?")
            .bind(vault_entity_id(chain_id, address))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(vault_from_row).transpose()
    }

    /// Upsert a vault.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn save_vault(&self, vault: &Vault) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO vaults (
                id, chain_id, address, kind, shares_token, underlying_tokens, strategy_address,
                underlying_platform, vault_id, breakdown_tokens_order, shares_token_total_supply,
                last_breakdown_update_block, last_breakdown_update_timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                shares_token = excluded.shares_token,
                underlying_tokens = excluded.underlying_tokens,
                strategy_address = excluded.strategy_address,
                underlying_platform = excluded.underlying_platform,
                vault_id = excluded.vault_id,
                breakdown_tokens_order = excluded.breakdown_tokens_order,
                shares_token_total_supply = excluded.shares_token_total_supply,
                last_breakdown_update_block = excluded.last_breakdown_update_block,
                last_breakdown_update_timestamp = excluded.last_breakdown_update_timestamp
            "#,
        )
        .bind(&vault.id)
        .bind(u64_col(vault.chain_id.as_u64()))
        .bind(address_key(&vault.address))
        .bind(vault.kind.as_str())
        .bind(address_key(&vault.shares_token))
        .bind(addresses_json(&vault.underlying_tokens)?)
        .bind(address_key(&vault.strategy_address))
        .bind(&vault.underlying_platform)
        .bind(&vault.vault_id)
        .bind(addresses_json(&vault.breakdown_tokens_order)?)
        .bind(vault.shares_token_total_supply.to_canonical_string())
        .bind(u64_col(vault.last_breakdown_update_block.as_u64()))
        .bind(u64_col(vault.last_breakdown_update_timestamp.as_secs()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All vaults on a chain, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_vaults(&self, chain_id: ChainId) -> Result<Vec<Vault>, StoreError> {
        let rows = sqlx::query("SELECT * FROM vaults WHERE chain_id = ? ORDER BY id ASC")
            .bind(u64_col(chain_id.as_u64()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(vault_from_row).collect()
    }

    // ===== Investor operations =====

    pub async fn get_investor(&self, address: &Address) -> Result<Option<Investor>, StoreError> {
        let row = sqlx::query("SELECT id, address FROM investors WHERE id = ?")
            .bind(address_key(address))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                let address = parse_address(&id, &row.try_get::<String, _>("address")?)?;
                Ok(Some(Investor { id, address }))
            }
            None => Ok(None),
        }
    }

    pub async fn save_investor(&self, investor: &Investor) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO investors (id, address) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(&investor.id)
            .bind(address_key(&investor.address))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Token operations =====

    pub async fn get_token(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<Token>, StoreError> {
        let row = sqlx::query("SELECT * FROM tokens WHERE id = ?")
            .bind(token_entity_id(chain_id, address))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                let decimals: i64 = row.try_get("decimals")?;
                Ok(Some(Token {
                    chain_id: ChainId::new(u64_from_col(row.try_get("chain_id")?)),
                    address: parse_address(&id, &row.try_get::<String, _>("address")?)?,
                    decimals: u8::try_from(decimals).map_err(|_| StoreError::Corrupt {
                        id: id.clone(),
                        message: format!("decimals out of range: {}", decimals),
                    })?,
                    symbol: row.try_get("symbol")?,
                    id,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save_token(&self, token: &Token) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (id, chain_id, address, decimals, symbol)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                decimals = excluded.decimals,
                symbol = excluded.symbol
            "#,
        )
        .bind(&token.id)
        .bind(u64_col(token.chain_id.as_u64()))
        .bind(address_key(&token.address))
        .bind(i64::from(token.decimals))
        .bind(&token.symbol)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Reward pool operations =====

    pub async fn get_reward_pool(
        &self,
        chain_id: ChainId,
        address: &Address,
    ) -> Result<Option<RewardPool>, StoreError> {
        let row = sqlx::query("SELECT * FROM reward_pools WHERE id = ?")
            .bind(vault_entity_id(chain_id, address))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                Ok(Some(RewardPool {
                    chain_id: ChainId::new(u64_from_col(row.try_get("chain_id")?)),
                    address: parse_address(&id, &row.try_get::<String, _>("address")?)?,
                    vault_address: parse_address(
                        &id,
                        &row.try_get::<String, _>("vault_address")?,
                    )?,
                    kind: parse_tag(&id, &row.try_get::<String, _>("kind")?)?,
                    id,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reward_pools (id, chain_id, address, vault_address, kind)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                vault_address = excluded.vault_address,
                kind = excluded.kind
            "#,
        )
        .bind(&pool.id)
        .bind(u64_col(pool.chain_id.as_u64()))
        .bind(address_key(&pool.address))
        .bind(address_key(&pool.vault_address))
        .bind(pool.kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
