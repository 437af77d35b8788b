//! Concentrated liquidity managers and the vaults that wrap them.

use super::batch::ReadBatch;
use super::{mul_div, BreakdownError, TokenBalance, VaultBreakdown};
use crate::chain::abi::{IBeefyVault, IClmManager, IClmStrategy, IErc20};
use crate::chain::ChainClient;
use crate::domain::{BlockNumber, VaultConfig};

/// CLM manager: both token balances, plus the strategy's range check.
///
/// Out-of-range liquidity is still reported; it only flips `is_liquidity_eligible`.
pub async fn manager(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let manager = config.vault_address;
    let mut batch = ReadBatch::new();
    let balances = batch.push("manager.balances", manager, IClmManager::balancesCall {});
    let supply = batch.push("manager.totalSupply", manager, IErc20::totalSupplyCall {});
    let wants = batch.push("manager.wants", manager, IClmManager::wantsCall {});
    let range = batch.push(
        "strategy.range",
        config.strategy_address,
        IClmStrategy::rangeCall {},
    );
    let price = batch.push(
        "strategy.price",
        config.strategy_address,
        IClmStrategy::priceCall {},
    );
    let results = batch.execute(client, block, false).await?;

    let balances = results.required(&balances)?;
    let wants = results.required(&wants)?;
    let range = results.required(&range)?;
    let price = results.required(&price)?.currentPrice;

    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: range.lowerPrice <= price && price <= range.upperPrice,
        balances: vec![
            TokenBalance::new(wants.token0, balances.amount0),
            TokenBalance::new(wants.token1, balances.amount1),
        ],
    })
}

/// Vault depositing into a CLM manager; scales the manager's breakdown by the vault's
/// holding of manager shares.
pub async fn vault_over_manager(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
    underlying: VaultBreakdown,
) -> Result<VaultBreakdown, BreakdownError> {
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let manager_supply = batch.push(
        "manager.totalSupply",
        config.underlying_lp_address,
        IErc20::totalSupplyCall {},
    );
    let results = batch.execute(client, block, false).await?;

    let vault_manager_shares = results.required(&balance)?._0;
    let manager_total_supply = results.required(&manager_supply)?._0;
    let balances = underlying
        .balances
        .into_iter()
        .map(|b| {
            let amount = mul_div(
                vault_manager_shares,
                b.raw_balance,
                manager_total_supply,
                "beefy_clm_vault",
            )?;
            Ok(TokenBalance::new(b.token, amount))
        })
        .collect::<Result<Vec<_>, BreakdownError>>()?;

    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: underlying.is_liquidity_eligible,
        balances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::resolve;
    use crate::breakdown::test_support::*;
    use crate::chain::MockChainClient;
    use crate::domain::{ChainId, ProtocolType};
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::SolValue;

    const MANAGER: Address = Address::repeat_byte(0xd0);
    const CLM_STRATEGY: Address = Address::repeat_byte(0xd1);

    fn manager_config() -> VaultConfig {
        let mut c = config(ProtocolType::BeefyClm);
        c.vault_address = MANAGER;
        c.strategy_address = CLM_STRATEGY;
        c
    }

    fn manager_client(price: u64) -> MockChainClient {
        MockChainClient::new(ChainId::new(1))
            .with_return(
                MANAGER,
                &IClmManager::balancesCall {},
                (U256::from(1000u64), U256::from(4000u64)).abi_encode_params(),
            )
            .with_return(MANAGER, &IErc20::totalSupplyCall {}, uint(200))
            .with_return(
                MANAGER,
                &IClmManager::wantsCall {},
                (TOKEN0, TOKEN1).abi_encode_params(),
            )
            .with_return(
                CLM_STRATEGY,
                &IClmStrategy::rangeCall {},
                (U256::from(100u64), U256::from(200u64)).abi_encode_params(),
            )
            .with_return(CLM_STRATEGY, &IClmStrategy::priceCall {}, uint(price))
    }

    #[tokio::test]
    async fn test_manager_in_range() {
        let client = manager_client(150);
        let breakdown = resolve(&client, BlockNumber::new(1), &manager_config())
            .await
            .unwrap();
        assert!(breakdown.is_liquidity_eligible);
        assert_eq!(breakdown.vault_total_supply, U256::from(200u64));
        assert_eq!(
            breakdown.balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(1000u64)),
                TokenBalance::new(TOKEN1, U256::from(4000u64)),
            ]
        );
    }

    #[tokio::test]
    async fn test_manager_range_bounds_are_inclusive() {
        for price in [100, 200] {
            let breakdown = resolve(&manager_client(price), BlockNumber::new(1), &manager_config())
                .await
                .unwrap();
            assert!(breakdown.is_liquidity_eligible, "price {}", price);
        }
    }

    #[tokio::test]
    async fn test_manager_out_of_range_keeps_balances() {
        let breakdown = resolve(&manager_client(250), BlockNumber::new(1), &manager_config())
            .await
            .unwrap();
        assert!(!breakdown.is_liquidity_eligible);
        assert_eq!(breakdown.balances.len(), 2);
    }

    #[tokio::test]
    async fn test_vault_over_manager_scales_by_held_shares() {
        let client = manager_client(250)
            .with_return(VAULT, &IBeefyVault::balanceCall {}, uint(50))
            .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, uint(48));
        let mut outer = config(ProtocolType::BeefyClmVault {
            manager: Box::new(manager_config()),
        });
        outer.underlying_lp_address = MANAGER;

        let breakdown = resolve(&client, BlockNumber::new(1), &outer).await.unwrap();
        assert_eq!(breakdown.vault_total_supply, U256::from(48u64));
        assert!(!breakdown.is_liquidity_eligible);
        assert_eq!(
            breakdown.balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(250u64)),
                TokenBalance::new(TOKEN1, U256::from(1000u64)),
            ]
        );
    }
}
