//! Classifies a contract deployed by the vault factory.
//!
//! The deploying transaction's input is decoded against the factory ABI first. When
//! that fails, the contract itself is queried: a vault answers `strategy()`, a strategy
//! answers `vault()` and a boost answers `rewardToken()`.

use crate::breakdown::batch::ReadBatch;
use crate::breakdown::BreakdownError;
use crate::chain::abi::{IContractRole, IVaultFactory::IVaultFactoryCalls};
use crate::chain::ChainClient;
use crate::domain::{Address, BlockNumber};
use alloy_sol_types::SolInterface;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRole {
    Vault,
    Strategy,
    Boost,
    None,
}

impl fmt::Display for ContractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractRole::Vault => "vault",
            ContractRole::Strategy => "strategy",
            ContractRole::Boost => "boost",
            ContractRole::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("contract {address} answers more than one role query ({successes} succeeded)")]
    Ambiguous { address: Address, successes: usize },
    #[error("role read failed: {0}")]
    Read(#[from] BreakdownError),
}

/// Role implied by the factory call that deployed the contract, if the input decodes.
pub fn role_from_factory_input(input: &[u8]) -> Option<ContractRole> {
    let call = IVaultFactoryCalls::abi_decode(input, true).ok()?;
    Some(match call {
        IVaultFactoryCalls::cloneVault(_) => ContractRole::Vault,
        IVaultFactoryCalls::cloneContract(_) => ContractRole::Strategy,
        IVaultFactoryCalls::booooost(_) => ContractRole::Boost,
    })
}

/// Query `address` for its role. More than one answering role read is an error.
pub async fn query_role(
    client: &dyn ChainClient,
    block: BlockNumber,
    address: Address,
) -> Result<ContractRole, DetectionError> {
    let mut batch = ReadBatch::new();
    let vault = batch.push("vault", address, IContractRole::vaultCall {});
    let strategy = batch.push("strategy", address, IContractRole::strategyCall {});
    let reward_token = batch.push("rewardToken", address, IContractRole::rewardTokenCall {});
    let results = batch.execute(client, block, true).await?;

    let has_vault = results.succeeded(&vault);
    let has_strategy = results.succeeded(&strategy);
    let has_reward_token = results.succeeded(&reward_token);
    let successes = [has_vault, has_strategy, has_reward_token]
        .iter()
        .filter(|s| **s)
        .count();

    if successes > 1 {
        return Err(DetectionError::Ambiguous { address, successes });
    }
    Ok(if has_strategy {
        ContractRole::Vault
    } else if has_vault {
        ContractRole::Strategy
    } else if has_reward_token {
        ContractRole::Boost
    } else {
        ContractRole::None
    })
}

/// Decode the deploying transaction input, falling back to querying the contract.
pub async fn detect_role(
    client: &dyn ChainClient,
    block: BlockNumber,
    address: Address,
    transaction_input: &[u8],
) -> Result<ContractRole, DetectionError> {
    if let Some(role) = role_from_factory_input(transaction_input) {
        debug!(address = %address, role = %role, "Detected role from factory input");
        return Ok(role);
    }
    warn!(address = %address, "Factory input did not decode, querying contract");
    let role = query_role(client, block, address).await?;
    debug!(address = %address, role = %role, "Detected role from contract reads");
    Ok(role)
}
