//! AMM liquidity-provider vaults.
//!
//! The vault holds LP tokens; each pool reserve is scaled by the vault's share of LP
//! supply: `reserve[i] * vault_lp_balance / lp_total_supply`.

use super::batch::ReadBatch;
use super::{mul_div, BreakdownError, TokenBalance, VaultBreakdown};
use crate::chain::abi::{
    IBalancerPool, IBalancerStrategy, IBalancerVaultV2, IBalancerVaultV3, IBeefyVault, ICurvePool,
    IErc20, IGammaHypervisor, IPairTokens, ISolidlyPool,
};
use crate::chain::ChainClient;
use crate::domain::{BlockNumber, VaultConfig};
use alloy_primitives::{Address, U256};

/// Curve pools expose at most this many coin slots.
pub const CURVE_MAX_COINS: u64 = 6;

fn scale_reserves(
    tokens: Vec<Address>,
    reserves: Vec<U256>,
    vault_lp_balance: U256,
    lp_total_supply: U256,
    context: &'static str,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    if tokens.len() != reserves.len() {
        return Err(BreakdownError::Decode {
            read: context,
            target: Address::ZERO,
            message: format!(
                "{} tokens but {} reserves",
                tokens.len(),
                reserves.len()
            ),
        });
    }
    tokens
        .into_iter()
        .zip(reserves)
        .map(|(token, reserve)| {
            let amount = mul_div(reserve, vault_lp_balance, lp_total_supply, context)?;
            Ok(TokenBalance::new(token, amount))
        })
        .collect()
}

/// Balancer v2 pools staked through aura.
pub async fn balancer_aura(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let pool = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let balancer_vault = batch.push("pool.getVault", pool, IBalancerPool::getVaultCall {});
    let pool_id = batch.push("pool.getPoolId", pool, IBalancerPool::getPoolIdCall {});
    let lp_supply = batch.push(
        "pool.getActualSupply",
        pool,
        IBalancerPool::getActualSupplyCall {},
    );
    let results = batch.execute(client, block, false).await?;

    let vault_lp_balance = results.required(&balance)?._0;
    let vault_total_supply = results.required(&supply)?._0;
    let balancer_vault = results.required(&balancer_vault)?._0;
    let pool_id = results.required(&pool_id)?._0;
    let lp_total_supply = results.required(&lp_supply)?._0;

    let mut batch = ReadBatch::new();
    let pool_tokens = batch.push(
        "balancerVault.getPoolTokens",
        balancer_vault,
        IBalancerVaultV2::getPoolTokensCall { poolId: pool_id },
    );
    let results = batch.execute(client, block, false).await?;
    let pool_tokens = results.required(&pool_tokens)?;

    Ok(VaultBreakdown {
        block,
        vault_total_supply,
        is_liquidity_eligible: true,
        balances: scale_reserves(
            pool_tokens.tokens,
            pool_tokens.balances,
            vault_lp_balance,
            lp_total_supply,
            "balancer_aura",
        )?,
    })
}

/// Balancer v3 pools; the strategy knows the balancer vault.
pub async fn balancer_v3(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let pool = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let balancer_vault = batch.push(
        "strategy.balancerVault",
        config.strategy_address,
        IBalancerStrategy::balancerVaultCall {},
    );
    let lp_supply = batch.push("pool.totalSupply", pool, IErc20::totalSupplyCall {});
    let results = batch.execute(client, block, false).await?;

    let vault_lp_balance = results.required(&balance)?._0;
    let vault_total_supply = results.required(&supply)?._0;
    let balancer_vault = results.required(&balancer_vault)?._0;
    let lp_total_supply = results.required(&lp_supply)?._0;

    let mut batch = ReadBatch::new();
    let info = batch.push(
        "balancerVault.getPoolTokenInfo",
        balancer_vault,
        IBalancerVaultV3::getPoolTokenInfoCall { pool },
    );
    let results = batch.execute(client, block, false).await?;
    let info = results.required(&info)?;

    Ok(VaultBreakdown {
        block,
        vault_total_supply,
        is_liquidity_eligible: true,
        balances: scale_reserves(
            info.tokens,
            info.balancesRaw,
            vault_lp_balance,
            lp_total_supply,
            "balancer",
        )?,
    })
}

/// Curve pools. Coin slots beyond the pool's size revert and are skipped.
///
/// A slot counts only when both `coins(i)` and `balances(i)` succeed, so tokens and
/// balances stay paired by index. Meta pools are not unwound.
pub async fn curve(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let pool = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let lp_supply = batch.push("pool.totalSupply", pool, IErc20::totalSupplyCall {});
    let slots: Vec<_> = (0..CURVE_MAX_COINS)
        .map(|i| {
            let coin = batch.push("pool.coins", pool, ICurvePool::coinsCall { i: U256::from(i) });
            let reserve = batch.push(
                "pool.balances",
                pool,
                ICurvePool::balancesCall { i: U256::from(i) },
            );
            (coin, reserve)
        })
        .collect();
    let results = batch.execute(client, block, true).await?;

    let vault_lp_balance = results.required(&balance)?._0;
    let vault_total_supply = results.required(&supply)?._0;
    let lp_total_supply = results.required(&lp_supply)?._0;

    let (tokens, reserves): (Vec<Address>, Vec<U256>) = slots
        .iter()
        .filter_map(|(coin, reserve)| {
            let coin = results.optional(coin)?._0;
            let reserve = results.optional(reserve)?._0;
            Some((coin, reserve))
        })
        .unzip();

    Ok(VaultBreakdown {
        block,
        vault_total_supply,
        is_liquidity_eligible: true,
        balances: scale_reserves(tokens, reserves, vault_lp_balance, lp_total_supply, "curve")?,
    })
}

/// Solidly-style volatile and stable pairs.
pub async fn solidly(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let pool = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let lp_supply = batch.push("pool.totalSupply", pool, IErc20::totalSupplyCall {});
    let metadata = batch.push("pool.metadata", pool, ISolidlyPool::metadataCall {});
    let results = batch.execute(client, block, false).await?;

    let metadata = results.required(&metadata)?;
    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: true,
        balances: scale_reserves(
            vec![metadata.t0, metadata.t1],
            vec![metadata.r0, metadata.r1],
            results.required(&balance)?._0,
            results.required(&lp_supply)?._0,
            "solidly",
        )?,
    })
}

/// Gamma hypervisors and ICHI vaults, both exposing `getTotalAmounts()`.
pub async fn gamma(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let hypervisor = config.underlying_lp_address;
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let lp_supply = batch.push("hypervisor.totalSupply", hypervisor, IErc20::totalSupplyCall {});
    let amounts = batch.push(
        "hypervisor.getTotalAmounts",
        hypervisor,
        IGammaHypervisor::getTotalAmountsCall {},
    );
    let token0 = batch.push("hypervisor.token0", hypervisor, IPairTokens::token0Call {});
    let token1 = batch.push("hypervisor.token1", hypervisor, IPairTokens::token1Call {});
    let results = batch.execute(client, block, false).await?;

    let amounts = results.required(&amounts)?;
    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: true,
        balances: scale_reserves(
            vec![results.required(&token0)?._0, results.required(&token1)?._0],
            vec![amounts.total0, amounts.total1],
            results.required(&balance)?._0,
            results.required(&lp_supply)?._0,
            "gamma",
        )?,
    })
}
