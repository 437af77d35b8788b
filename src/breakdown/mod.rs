//! Protocol breakdown resolution.
//!
//! Decomposes the value locked in a vault into `(token, raw balance)` pairs at an exact
//! block, using one read recipe per underlying protocol:
//! - `single_asset`: aave, euler, infrared, erc4626
//! - `amm`: balancer, balancer_aura, curve, solidly, gamma, ichi
//! - `clm`: beefy_clm and the nested beefy_clm_vault
//! - `pendle`: pendle_equilibria
//!
//! Results are never cached; they are only valid for the block they were read at.

use crate::chain::{ChainClient, ChainError};
use crate::domain::{BlockNumber, ProtocolType, VaultConfig};
use alloy_primitives::{Address, U256};
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

pub mod amm;
pub mod batch;
pub mod clm;
pub mod pendle;
pub mod single_asset;

/// Deepest allowed chain of `beefy_clm_vault` wrappers.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Raw (undecimalized) balance of one underlying token held by a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub token: Address,
    pub raw_balance: U256,
}

impl TokenBalance {
    pub fn new(token: Address, raw_balance: U256) -> Self {
        Self { token, raw_balance }
    }
}

/// A vault's locked value at one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultBreakdown {
    pub block: BlockNumber,
    pub vault_total_supply: U256,
    /// False when a concentrated-liquidity position is out of range.
    pub is_liquidity_eligible: bool,
    pub balances: Vec<TokenBalance>,
}

#[derive(Debug, Error)]
pub enum BreakdownError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("required read {read} failed on {target}")]
    RequiredReadFailed { read: &'static str, target: Address },
    #[error("could not decode {read} from {target}: {message}")]
    Decode {
        read: &'static str,
        target: Address,
        message: String,
    },
    #[error("{context}: division by zero")]
    DivisionByZero { context: &'static str },
    #[error("{context}: arithmetic overflow")]
    Overflow { context: &'static str },
    #[error("{context}: negative on-chain value")]
    NegativeValue { context: &'static str },
    #[error("vault nesting depth {depth} exceeds {max}")]
    NestingTooDeep { depth: usize, max: usize },
}

/// `value * numerator / denominator`, floored, failing on overflow or a zero denominator.
pub fn mul_div(
    value: U256,
    numerator: U256,
    denominator: U256,
    context: &'static str,
) -> Result<U256, BreakdownError> {
    if denominator.is_zero() {
        return Err(BreakdownError::DivisionByZero { context });
    }
    let product = value
        .checked_mul(numerator)
        .ok_or(BreakdownError::Overflow { context })?;
    Ok(product / denominator)
}

/// Resolve the breakdown of `config`'s vault at `block`.
pub fn resolve<'a>(
    client: &'a dyn ChainClient,
    block: BlockNumber,
    config: &'a VaultConfig,
) -> BoxFuture<'a, Result<VaultBreakdown, BreakdownError>> {
    resolve_at_depth(client, block, config, 0)
}

pub(crate) fn resolve_at_depth<'a>(
    client: &'a dyn ChainClient,
    block: BlockNumber,
    config: &'a VaultConfig,
    depth: usize,
) -> BoxFuture<'a, Result<VaultBreakdown, BreakdownError>> {
    async move {
        match &config.protocol_type {
            ProtocolType::Aave | ProtocolType::Euler => {
                single_asset::lending(client, block, config).await
            }
            ProtocolType::Infrared => single_asset::infrared(client, block, config).await,
            ProtocolType::Balancer => amm::balancer_v3(client, block, config).await,
            ProtocolType::BalancerAura => amm::balancer_aura(client, block, config).await,
            ProtocolType::Curve => amm::curve(client, block, config).await,
            ProtocolType::Solidly => amm::solidly(client, block, config).await,
            ProtocolType::Gamma | ProtocolType::Ichi => amm::gamma(client, block, config).await,
            ProtocolType::BeefyClm => clm::manager(client, block, config).await,
            ProtocolType::BeefyClmVault { manager } => {
                let next = depth + 1;
                if next > MAX_NESTING_DEPTH {
                    return Err(BreakdownError::NestingTooDeep {
                        depth: next,
                        max: MAX_NESTING_DEPTH,
                    });
                }
                let underlying = resolve_at_depth(client, block, manager, next).await?;
                clm::vault_over_manager(client, block, config, underlying).await
            }
            ProtocolType::PendleEquilibria => pendle::market(client, block, config).await,
            ProtocolType::Erc4626 => single_asset::erc4626(client, block, config).await,
        }
    }
    .boxed()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::chain::MockChainClient;
    use crate::domain::ChainId;

    #[test]
    fn test_mul_div() {
        let r = mul_div(U256::from(500u64), U256::from(250u64), U256::from(1000u64), "t").unwrap();
        assert_eq!(r, U256::from(125u64));
        assert!(matches!(
            mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO, "t"),
            Err(BreakdownError::DivisionByZero { .. })
        ));
        assert!(matches!(
            mul_div(U256::MAX, U256::from(2u64), U256::from(1u64), "t"),
            Err(BreakdownError::Overflow { .. })
        ));
    }

    #[tokio::test]
    async fn test_nesting_guard_rejects_deep_wrappers() {
        let client = MockChainClient::new(ChainId::new(1));
        let mut layer = config(ProtocolType::BeefyClm);
        for _ in 0..3 {
            layer = config(ProtocolType::BeefyClmVault {
                manager: Box::new(layer),
            });
        }
        let err = resolve(&client, BlockNumber::new(1), &layer)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BreakdownError::NestingTooDeep { depth: 3, max: MAX_NESTING_DEPTH }
        ));
        assert_eq!(client.multicall_count(), 0);
    }
}
