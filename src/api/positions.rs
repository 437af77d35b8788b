use super::vaults::{address_string, decimal_strings, PositionSummaryDto};
use super::{parse_address, AppState};
use crate::domain::ChainId;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub chain_id: u64,
    pub vault: String,
    #[serde(flatten)]
    pub position: PositionSummaryDto,
    pub history: Vec<PositionBreakdownDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBreakdownDto {
    pub block_number: u64,
    pub timestamp: u64,
    pub balances: Vec<String>,
    pub time_weighted_balances: Vec<String>,
}

pub async fn get_position(
    Path((chain_id, vault, investor)): Path<(u64, String, String)>,
    State(state): State<AppState>,
) -> Result<Json<PositionResponse>, AppError> {
    let vault = parse_address(&vault, "vault")?;
    let investor = parse_address(&investor, "investor")?;
    let chain = ChainId::new(chain_id);

    let position = state
        .store
        .get_position(chain, &vault, &investor)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Position of {} in vault {} on chain {}",
                investor, vault, chain_id
            ))
        })?;

    let history = state
        .store
        .list_position_breakdowns(&position.id)
        .await?
        .into_iter()
        .map(|b| PositionBreakdownDto {
            block_number: b.block_number.as_u64(),
            timestamp: b.timestamp.as_secs(),
            balances: decimal_strings(&b.balances),
            time_weighted_balances: decimal_strings(&b.time_weighted_balances),
        })
        .collect();

    Ok(Json(PositionResponse {
        chain_id,
        vault: address_string(&vault),
        position: PositionSummaryDto::from(&position),
        history,
    }))
}
