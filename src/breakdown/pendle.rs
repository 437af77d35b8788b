//! Pendle markets held through equilibria or magpie.

use super::batch::ReadBatch;
use super::{mul_div, BreakdownError, TokenBalance, VaultBreakdown};
use crate::chain::abi::{IBeefyVault, IPendleMarket, IPendleSy};
use crate::chain::ChainClient;
use crate::domain::{BlockNumber, VaultConfig};
use alloy_primitives::{address, Address, I256, U256};

/// Router passed to `readState`; deployed at the same address on every chain.
pub const PENDLE_ROUTER: Address = address!("00000000005BBB0EF59571E58418F9a4357b68A0");

fn non_negative(value: I256, context: &'static str) -> Result<U256, BreakdownError> {
    if value.is_negative() {
        return Err(BreakdownError::NegativeValue { context });
    }
    Ok(value.into_raw())
}

/// The vault's LP share of the market's SY, reported as the SY's yield token.
pub async fn market(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let market = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let tokens = batch.push("market.readTokens", market, IPendleMarket::readTokensCall {});
    let state = batch.push(
        "market.readState",
        market,
        IPendleMarket::readStateCall {
            router: PENDLE_ROUTER,
        },
    );
    let results = batch.execute(client, block, false).await?;

    let vault_lp_balance = results.required(&balance)?._0;
    let vault_total_supply = results.required(&supply)?._0;
    let sy = results.required(&tokens)?.sy;
    let state = results.required(&state)?.market;
    let total_sy = non_negative(state.totalSy, "pendle totalSy")?;
    let total_lp = non_negative(state.totalLp, "pendle totalLp")?;

    let mut batch = ReadBatch::new();
    let yield_token = batch.push("sy.yieldToken", sy, IPendleSy::yieldTokenCall {});
    let results = batch.execute(client, block, false).await?;
    let yield_token = results.required(&yield_token)?._0;

    Ok(VaultBreakdown {
        block,
        vault_total_supply,
        is_liquidity_eligible: true,
        balances: vec![TokenBalance::new(
            yield_token,
            mul_div(total_sy, vault_lp_balance, total_lp, "pendle")?,
        )],
    })
}
