use super::{parse_address, AppState};
use crate::domain::{
    address_key, Address, ChainId, Decimal, InvestorPosition, Vault, VaultBalanceBreakdown,
};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDto {
    pub chain_id: u64,
    pub address: String,
    pub vault_id: String,
    pub kind: &'static str,
    pub underlying_platform: String,
    pub shares_token: String,
    pub underlying_tokens: Vec<String>,
    pub strategy_address: String,
    pub breakdown_tokens_order: Vec<String>,
    pub shares_token_total_supply: String,
    pub last_breakdown_update_block: u64,
    pub last_breakdown_update_timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_breakdown: Option<VaultBreakdownDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBreakdownDto {
    pub block_number: u64,
    pub timestamp: u64,
    pub tokens: Vec<String>,
    pub balances: Vec<String>,
    pub is_liquidity_eligible: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummaryDto {
    pub investor: String,
    pub direct_shares_balance: String,
    pub reward_pool_shares_balance: String,
    pub total_shares_balance: String,
    pub last_breakdown_balances: Vec<String>,
    pub last_breakdown_time_weighted_balances: Vec<String>,
    pub last_breakdown_block: u64,
    pub last_breakdown_timestamp: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultPositionsResponse {
    pub vault: String,
    pub breakdown_tokens_order: Vec<String>,
    pub positions: Vec<PositionSummaryDto>,
}

pub(crate) fn address_string(address: &Address) -> String {
    address_key(address)
}

pub(crate) fn decimal_strings(values: &[Decimal]) -> Vec<String> {
    values.iter().map(|v| v.to_canonical_string()).collect()
}

impl VaultDto {
    fn new(vault: &Vault, latest: Option<VaultBalanceBreakdown>) -> Self {
        Self {
            chain_id: vault.chain_id.as_u64(),
            address: address_string(&vault.address),
            vault_id: vault.vault_id.clone(),
            kind: vault.kind.as_str(),
            underlying_platform: vault.underlying_platform.clone(),
            shares_token: address_string(&vault.shares_token),
            underlying_tokens: vault.underlying_tokens.iter().map(address_string).collect(),
            strategy_address: address_string(&vault.strategy_address),
            breakdown_tokens_order: vault.breakdown_tokens_order.iter().map(address_string).collect(),
            shares_token_total_supply: vault.shares_token_total_supply.to_canonical_string(),
            last_breakdown_update_block: vault.last_breakdown_update_block.as_u64(),
            last_breakdown_update_timestamp: vault.last_breakdown_update_timestamp.as_secs(),
            latest_breakdown: latest.map(|b| VaultBreakdownDto {
                block_number: b.block_number.as_u64(),
                timestamp: b.timestamp.as_secs(),
                tokens: b.tokens.iter().map(address_string).collect(),
                balances: decimal_strings(&b.balances),
                is_liquidity_eligible: b.is_liquidity_eligible,
            }),
        }
    }
}

impl From<&InvestorPosition> for PositionSummaryDto {
    fn from(p: &InvestorPosition) -> Self {
        Self {
            investor: address_string(&p.investor_address),
            direct_shares_balance: p.direct_shares_balance().to_canonical_string(),
            reward_pool_shares_balance: p.reward_pool_shares_balance().to_canonical_string(),
            total_shares_balance: p.total_shares_balance().to_canonical_string(),
            last_breakdown_balances: decimal_strings(&p.last_breakdown_balances),
            last_breakdown_time_weighted_balances: decimal_strings(
                &p.last_breakdown_time_weighted_balances,
            ),
            last_breakdown_block: p.last_breakdown_block.as_u64(),
            last_breakdown_timestamp: p.last_breakdown_timestamp.as_secs(),
        }
    }
}

async fn load_vault(state: &AppState, chain_id: u64, address: &str) -> Result<Vault, AppError> {
    let address = parse_address(address, "vault")?;
    state
        .store
        .get_vault(ChainId::new(chain_id), &address)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vault {} on chain {}", address, chain_id)))
}

pub async fn get_vault(
    Path((chain_id, address)): Path<(u64, String)>,
    State(state): State<AppState>,
) -> Result<Json<VaultDto>, AppError> {
    let vault = load_vault(&state, chain_id, &address).await?;
    let latest = if vault.last_breakdown_update_timestamp.is_unset() {
        None
    } else {
        let id = VaultBalanceBreakdown::id_for(
            vault.chain_id,
            &vault.address,
            vault.last_breakdown_update_block,
        );
        state.store.get_vault_breakdown(&id).await?
    };
    Ok(Json(VaultDto::new(&vault, latest)))
}

pub async fn list_vault_positions(
    Path((chain_id, address)): Path<(u64, String)>,
    State(state): State<AppState>,
) -> Result<Json<VaultPositionsResponse>, AppError> {
    let vault = load_vault(&state, chain_id, &address).await?;
    let positions = state
        .store
        .list_positions_for_vault(vault.chain_id, &vault.address)
        .await?;
    Ok(Json(VaultPositionsResponse {
        vault: address_string(&vault.address),
        breakdown_tokens_order: vault.breakdown_tokens_order.iter().map(address_string).collect(),
        positions: positions.iter().map(PositionSummaryDto::from).collect(),
    }))
}
