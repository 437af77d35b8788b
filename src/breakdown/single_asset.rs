//! Single-asset vaults: the vault holds exactly one token.

use super::batch::ReadBatch;
use super::{BreakdownError, TokenBalance, VaultBreakdown};
use crate::chain::abi::{IBeefyVault, IErc20, IErc4626};
use crate::chain::ChainClient;
use crate::domain::{BlockNumber, VaultConfig};

/// Aave-style and euler vaults: `balance()` of the underlying asset.
///
/// Lend/borrow looping is not unwound.
pub async fn lending(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let mut batch = ReadBatch::new();
    let balance = batch.push("vault.balance", config.vault_address, IBeefyVault::balanceCall {});
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let results = batch.execute(client, block, false).await?;

    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: true,
        balances: vec![TokenBalance::new(
            config.underlying_lp_address,
            results.required(&balance)?._0,
        )],
    })
}

/// Infrared vaults are accounted in their own share token, one share per unit.
pub async fn infrared(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let mut batch = ReadBatch::new();
    let supply = batch.push(
        "vault.totalSupply",
        config.vault_address,
        IBeefyVault::totalSupplyCall {},
    );
    let results = batch.execute(client, block, false).await?;
    let total_supply = results.required(&supply)?._0;

    Ok(VaultBreakdown {
        block,
        vault_total_supply: total_supply,
        is_liquidity_eligible: true,
        balances: vec![TokenBalance::new(config.vault_address, total_supply)],
    })
}

/// LST vaults and ERC-4626 adapters: `totalAssets()` of the `asset()` they wrap.
pub async fn erc4626(
    client: &dyn ChainClient,
    block: BlockNumber,
    config: &VaultConfig,
) -> Result<VaultBreakdown, BreakdownError> {
    let vault = config.vault_address;
    let mut batch = ReadBatch::new();
    let asset = batch.push("vault.asset", vault, IErc4626::assetCall {});
    let assets = batch.push("vault.totalAssets", vault, IErc4626::totalAssetsCall {});
    let supply = batch.push("vault.totalSupply", vault, IErc20::totalSupplyCall {});
    let results = batch.execute(client, block, false).await?;

    Ok(VaultBreakdown {
        block,
        vault_total_supply: results.required(&supply)?._0,
        is_liquidity_eligible: true,
        balances: vec![TokenBalance::new(
            results.required(&asset)?._0,
            results.required(&assets)?._0,
        )],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::test_support::*;
    use crate::breakdown::{resolve, BreakdownError};
    use crate::chain::MockChainClient;
    use crate::domain::{ChainId, ProtocolType};
    use alloy_primitives::{Address, U256};

    #[tokio::test]
    async fn test_lending_vault_reports_underlying_balance() {
        let client = MockChainClient::new(ChainId::new(1))
            .with_return(VAULT, &IBeefyVault::balanceCall {}, uint(500_000_000))
            .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, uint(1000));

        let config = config(ProtocolType::Aave);
        let breakdown = resolve(&client, BlockNumber::new(7), &config).await.unwrap();

        assert_eq!(breakdown.block, BlockNumber::new(7));
        assert_eq!(breakdown.vault_total_supply, U256::from(1000u64));
        assert!(breakdown.is_liquidity_eligible);
        assert_eq!(
            breakdown.balances,
            vec![TokenBalance::new(LP, U256::from(500_000_000u64))]
        );
        assert_eq!(client.multicall_count(), 1);
    }

    #[tokio::test]
    async fn test_euler_uses_lending_recipe() {
        let client = MockChainClient::new(ChainId::new(1))
            .with_return(VAULT, &IBeefyVault::balanceCall {}, uint(5))
            .with_return(VAULT, &IBeefyVault::totalSupplyCall {}, uint(4));
        let breakdown = resolve(&client, BlockNumber::new(1), &config(ProtocolType::Euler))
            .await
            .unwrap();
        assert_eq!(breakdown.balances[0].raw_balance, U256::from(5u64));
    }

    #[tokio::test]
    async fn test_infrared_counts_its_own_supply() {
        let client = MockChainClient::new(ChainId::new(1)).with_return(
            VAULT,
            &IBeefyVault::totalSupplyCall {},
            uint(42),
        );
        let breakdown = resolve(&client, BlockNumber::new(1), &config(ProtocolType::Infrared))
            .await
            .unwrap();
        assert_eq!(
            breakdown.balances,
            vec![TokenBalance::new(VAULT, U256::from(42u64))]
        );
        assert_eq!(breakdown.vault_total_supply, U256::from(42u64));
    }

    #[tokio::test]
    async fn test_erc4626_reports_total_assets_of_asset() {
        let asset = Address::repeat_byte(0x5e);
        let client = MockChainClient::new(ChainId::new(1))
            .with_return(VAULT, &IErc4626::assetCall {}, addr(asset))
            .with_return(VAULT, &IErc4626::totalAssetsCall {}, uint(1_050))
            .with_return(VAULT, &IErc20::totalSupplyCall {}, uint(1_000));
        let breakdown = resolve(&client, BlockNumber::new(3), &config(ProtocolType::Erc4626))
            .await
            .unwrap();
        assert_eq!(
            breakdown.balances,
            vec![TokenBalance::new(asset, U256::from(1_050u64))]
        );
        assert_eq!(breakdown.vault_total_supply, U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_missing_balance_is_unavailable() {
        let client = MockChainClient::new(ChainId::new(1)).with_return(
            VAULT,
            &IBeefyVault::totalSupplyCall {},
            uint(1000),
        );
        let err = resolve(&client, BlockNumber::new(1), &config(ProtocolType::Aave))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BreakdownError::RequiredReadFailed { read: "vault.balance", .. }
        ));
    }
}
