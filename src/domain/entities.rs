//! Persisted ledger entities and their id schemes.

use super::decimal::Decimal;
use super::primitives::{address_key, BlockNumber, ChainId, Timestamp};
use super::vault_config::{ProtocolType, VaultConfig};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub fn vault_entity_id(chain_id: ChainId, vault: &Address) -> String {
    format!("{}-{}", chain_id, address_key(vault))
}

pub fn token_entity_id(chain_id: ChainId, token: &Address) -> String {
    format!("{}-{}", chain_id, address_key(token))
}

pub fn investor_entity_id(investor: &Address) -> String {
    address_key(investor)
}

pub fn position_entity_id(chain_id: ChainId, vault: &Address, investor: &Address) -> String {
    format!("{}-{}-{}", chain_id, address_key(vault), address_key(investor))
}

pub fn clock_tick_id(chain_id: ChainId, rounded: Timestamp, period_secs: u64) -> String {
    format!("{}-{}-{}", chain_id, rounded, period_secs)
}

/// Synthetic catalog id used when a vault is missing from the catalog at onboarding.
pub fn synthetic_vault_id(chain_id: ChainId, vault: &Address) -> String {
    format!("{}:{}", chain_id, address_key(vault))
}

/// Contract family a share token was onboarded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    /// Beefy vault over a single `want()` token.
    Classic,
    /// Concentrated liquidity manager over the `wants()` pair.
    ClmManager,
    /// Liquid staking vault over its ERC-4626 `asset()`.
    LstVault,
    /// ERC-4626 wrapper around a Beefy vault.
    Erc4626Adapter,
}

impl VaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultKind::Classic => "classic",
            VaultKind::ClmManager => "clm_manager",
            VaultKind::LstVault => "lst_vault",
            VaultKind::Erc4626Adapter => "erc4626_adapter",
        }
    }
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(VaultKind::Classic),
            "clm_manager" => Ok(VaultKind::ClmManager),
            "lst_vault" => Ok(VaultKind::LstVault),
            "erc4626_adapter" => Ok(VaultKind::Erc4626Adapter),
            other => Err(format!("unknown vault kind: {}", other)),
        }
    }
}

/// A vault tracked by the ledger, one per `(chain_id, address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: String,
    pub chain_id: ChainId,
    pub address: Address,
    pub kind: VaultKind,
    pub shares_token: Address,
    /// One token for single-asset vaults, the `(token0, token1)` pair for CLM managers.
    pub underlying_tokens: Vec<Address>,
    /// Zero for ERC-4626 vaults, which have no Beefy strategy.
    pub strategy_address: Address,
    pub underlying_platform: String,
    pub vault_id: String,
    /// Authoritative token order for every position's breakdown vectors.
    pub breakdown_tokens_order: Vec<Address>,
    pub shares_token_total_supply: Decimal,
    pub last_breakdown_update_block: BlockNumber,
    pub last_breakdown_update_timestamp: Timestamp,
}

impl Vault {
    pub fn new(
        chain_id: ChainId,
        address: Address,
        underlying_token: Address,
        strategy_address: Address,
        vault_id: String,
        underlying_platform: String,
    ) -> Self {
        Self {
            id: vault_entity_id(chain_id, &address),
            chain_id,
            address,
            kind: VaultKind::Classic,
            shares_token: address,
            underlying_tokens: vec![underlying_token],
            strategy_address,
            underlying_platform,
            vault_id,
            breakdown_tokens_order: Vec::new(),
            shares_token_total_supply: Decimal::zero(),
            last_breakdown_update_block: BlockNumber::default(),
            last_breakdown_update_timestamp: Timestamp::default(),
        }
    }

    /// Re-tag a freshly built vault with its contract family and underlying tokens.
    pub fn with_kind(mut self, kind: VaultKind, underlying_tokens: Vec<Address>) -> Self {
        self.kind = kind;
        self.underlying_tokens = underlying_tokens;
        self
    }

    /// Breakdown recipe implied by the contract family, used when the catalog does not
    /// list the vault. Classic vaults have none.
    pub fn implied_config(&self) -> Option<VaultConfig> {
        let protocol_type = match self.kind {
            VaultKind::Classic => return None,
            VaultKind::ClmManager => ProtocolType::BeefyClm,
            VaultKind::LstVault | VaultKind::Erc4626Adapter => ProtocolType::Erc4626,
        };
        Some(VaultConfig {
            id: self.vault_id.clone(),
            chain_id: self.chain_id,
            vault_address: self.address,
            strategy_address: self.strategy_address,
            underlying_lp_address: self.underlying_tokens.first().copied().unwrap_or_default(),
            protocol_type,
            reward_pools: Vec::new(),
            boosts: Vec::new(),
            platform_id: self.underlying_platform.clone(),
            is_active: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    pub id: String,
    pub address: Address,
}

impl Investor {
    pub fn new(address: Address) -> Self {
        Self {
            id: investor_entity_id(&address),
            address,
        }
    }
}

/// An investor's holding in one vault on one chain.
///
/// The total share balance is derived from the direct and reward-pool balances and is
/// never set on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorPosition {
    pub id: String,
    pub chain_id: ChainId,
    pub vault_address: Address,
    pub investor_address: Address,
    direct_shares_balance: Decimal,
    reward_pool_shares_balance: Decimal,
    total_shares_balance: Decimal,
    pub last_breakdown_balances: Vec<Decimal>,
    pub last_breakdown_time_weighted_balances: Vec<Decimal>,
    pub last_breakdown_timestamp: Timestamp,
    pub last_breakdown_block: BlockNumber,
}

impl InvestorPosition {
    pub fn new(chain_id: ChainId, vault_address: Address, investor_address: Address) -> Self {
        Self {
            id: position_entity_id(chain_id, &vault_address, &investor_address),
            chain_id,
            vault_address,
            investor_address,
            direct_shares_balance: Decimal::zero(),
            reward_pool_shares_balance: Decimal::zero(),
            total_shares_balance: Decimal::zero(),
            last_breakdown_balances: Vec::new(),
            last_breakdown_time_weighted_balances: Vec::new(),
            last_breakdown_timestamp: Timestamp::default(),
            last_breakdown_block: BlockNumber::default(),
        }
    }

    /// Rebuild a position from stored balances. The total is recomputed.
    pub fn with_share_balances(mut self, direct: Decimal, reward_pool: Decimal) -> Self {
        self.total_shares_balance = &direct + &reward_pool;
        self.direct_shares_balance = direct;
        self.reward_pool_shares_balance = reward_pool;
        self
    }

    pub fn direct_shares_balance(&self) -> &Decimal {
        &self.direct_shares_balance
    }

    pub fn reward_pool_shares_balance(&self) -> &Decimal {
        &self.reward_pool_shares_balance
    }

    pub fn total_shares_balance(&self) -> &Decimal {
        &self.total_shares_balance
    }

    /// Apply signed deltas and return the new total.
    pub fn apply_share_delta(&mut self, direct_delta: &Decimal, indirect_delta: &Decimal) -> Decimal {
        self.direct_shares_balance = &self.direct_shares_balance + direct_delta;
        self.reward_pool_shares_balance = &self.reward_pool_shares_balance + indirect_delta;
        self.total_shares_balance = &self.direct_shares_balance + &self.reward_pool_shares_balance;
        self.total_shares_balance.clone()
    }

    pub fn has_breakdown(&self) -> bool {
        !self.last_breakdown_balances.is_empty() && !self.last_breakdown_timestamp.is_unset()
    }
}

/// Write-once idempotency marker for a periodic refresh bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockTick {
    pub id: String,
    pub chain_id: ChainId,
    pub rounded_timestamp: Timestamp,
    pub period_secs: u64,
    pub block_number: BlockNumber,
}

impl ClockTick {
    pub fn new(
        chain_id: ChainId,
        rounded_timestamp: Timestamp,
        period_secs: u64,
        block_number: BlockNumber,
    ) -> Self {
        Self {
            id: clock_tick_id(chain_id, rounded_timestamp, period_secs),
            chain_id,
            rounded_timestamp,
            period_secs,
            block_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub chain_id: ChainId,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: ChainId, address: Address, decimals: u8, symbol: String) -> Self {
        Self {
            id: token_entity_id(chain_id, &address),
            chain_id,
            address,
            decimals,
            symbol,
        }
    }
}

/// How a staking contract reports the vault shares it holds for investors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingKind {
    /// Issues a transferable receipt token 1:1 against staked shares.
    RewardPool,
    /// Emits `Staked`/`Withdrawn` per user; no receipt token.
    Boost,
}

impl StakingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StakingKind::RewardPool => "reward_pool",
            StakingKind::Boost => "boost",
        }
    }
}

impl fmt::Display for StakingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StakingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reward_pool" => Ok(StakingKind::RewardPool),
            "boost" => Ok(StakingKind::Boost),
            other => Err(format!("unknown staking kind: {}", other)),
        }
    }
}

/// A staking contract holding vault shares on behalf of investors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardPool {
    pub id: String,
    pub chain_id: ChainId,
    pub address: Address,
    pub vault_address: Address,
    pub kind: StakingKind,
}

impl RewardPool {
    pub fn new(chain_id: ChainId, address: Address, vault_address: Address) -> Self {
        Self {
            id: vault_entity_id(chain_id, &address),
            chain_id,
            address,
            vault_address,
            kind: StakingKind::RewardPool,
        }
    }

    pub fn boost(chain_id: ChainId, address: Address, vault_address: Address) -> Self {
        Self {
            kind: StakingKind::Boost,
            ..Self::new(chain_id, address, vault_address)
        }
    }
}

/// Vault-level breakdown observed at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalanceBreakdown {
    pub id: String,
    pub chain_id: ChainId,
    pub vault_address: Address,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub tokens: Vec<Address>,
    pub balances: Vec<Decimal>,
    pub is_liquidity_eligible: bool,
}

impl VaultBalanceBreakdown {
    pub fn id_for(chain_id: ChainId, vault: &Address, block: BlockNumber) -> String {
        format!("{}-{}", vault_entity_id(chain_id, vault), block)
    }
}

/// Position-level breakdown observed at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorPositionBreakdown {
    pub id: String,
    pub position_id: String,
    pub chain_id: ChainId,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub balances: Vec<Decimal>,
    pub time_weighted_balances: Vec<Decimal>,
}

impl InvestorPositionBreakdown {
    pub fn id_for(position_id: &str, block: BlockNumber) -> String {
        format!("{}-{}", position_id, block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistStatus {
    Ok,
    /// Permanently excluded, e.g. a malformed contract.
    Blacklisted,
    /// Excluded after a transient failure; may be retried later.
    MaybeBlacklisted,
}

impl BlacklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistStatus::Ok => "ok",
            BlacklistStatus::Blacklisted => "blacklisted",
            BlacklistStatus::MaybeBlacklisted => "maybe_blacklisted",
        }
    }
}

impl fmt::Display for BlacklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlacklistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(BlacklistStatus::Ok),
            "blacklisted" => Ok(BlacklistStatus::Blacklisted),
            "maybe_blacklisted" => Ok(BlacklistStatus::MaybeBlacklisted),
            other => Err(format!("unknown blacklist status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStatus {
    pub chain_id: ChainId,
    pub address: Address,
    pub status: BlacklistStatus,
    pub reason: String,
}
