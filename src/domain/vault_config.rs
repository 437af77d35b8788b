//! Vault configuration as published by the vault catalog.
//!
//! A `VaultConfig` is immutable within a catalog cache window. It tells the breakdown
//! resolver which on-chain read recipe applies to a vault.

use super::primitives::ChainId;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Underlying DeFi protocol a vault deposits into.
///
/// `BeefyClmVault` wraps a CLM manager; the manager's own config is carried inline so
/// the resolver can recurse into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolType {
    Aave,
    Euler,
    Infrared,
    Balancer,
    BalancerAura,
    Curve,
    Solidly,
    Gamma,
    Ichi,
    BeefyClm,
    BeefyClmVault { manager: Box<VaultConfig> },
    PendleEquilibria,
    /// `totalAssets()` of the vault's ERC-4626 `asset()`.
    Erc4626,
}

impl ProtocolType {
    /// Stable tag used in logs and persisted rows.
    pub fn tag(&self) -> &'static str {
        match self {
            ProtocolType::Aave => "aave",
            ProtocolType::Euler => "euler",
            ProtocolType::Infrared => "infrared",
            ProtocolType::Balancer => "balancer",
            ProtocolType::BalancerAura => "balancer_aura",
            ProtocolType::Curve => "curve",
            ProtocolType::Solidly => "solidly",
            ProtocolType::Gamma => "gamma",
            ProtocolType::Ichi => "ichi",
            ProtocolType::BeefyClm => "beefy_clm",
            ProtocolType::BeefyClmVault { .. } => "beefy_clm_vault",
            ProtocolType::PendleEquilibria => "pendle_equilibria",
            ProtocolType::Erc4626 => "erc4626",
        }
    }

    /// Map a catalog platform id to its protocol. Unknown platforms have no breakdown.
    pub fn from_platform(platform_id: &str) -> Option<ProtocolType> {
        let protocol = match platform_id {
            "aerodrome" | "equalizer" | "lynex" | "nile" | "velodrome" => ProtocolType::Solidly,
            "aura" => ProtocolType::BalancerAura,
            "balancer" | "beethovenx" => ProtocolType::Balancer,
            "beefy" => ProtocolType::BeefyClm,
            "curve" | "convex" => ProtocolType::Curve,
            "equilibria" | "magpie" => ProtocolType::PendleEquilibria,
            "gamma" => ProtocolType::Gamma,
            "ichi" | "swapx" => ProtocolType::Ichi,
            "infrared" => ProtocolType::Infrared,
            "lendle" | "mendi" | "silo" | "aave" => ProtocolType::Aave,
            "euler" => ProtocolType::Euler,
            _ => return None,
        };
        Some(protocol)
    }

    /// Number of nested `BeefyClmVault` layers below and including this one.
    pub fn nesting_depth(&self) -> usize {
        match self {
            ProtocolType::BeefyClmVault { manager } => 1 + manager.protocol_type.nesting_depth(),
            _ => 0,
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPoolConfig {
    pub id: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostConfig {
    pub id: String,
    pub address: Address,
}

/// One vault entry from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub id: String,
    pub chain_id: ChainId,
    pub vault_address: Address,
    pub strategy_address: Address,
    pub underlying_lp_address: Address,
    pub protocol_type: ProtocolType,
    pub reward_pools: Vec<RewardPoolConfig>,
    pub boosts: Vec<BoostConfig>,
    pub platform_id: String,
    pub is_active: bool,
}

impl VaultConfig {
    pub fn has_reward_pool(&self, address: &Address) -> bool {
        self.reward_pools.iter().any(|p| p.address == *address)
    }
}
