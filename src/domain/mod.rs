//! Domain types for the investor breakdown ledger.

pub mod chains;
pub mod decimal;
pub mod entities;
pub mod primitives;
pub mod vault_config;

pub use alloy_primitives::{Address, U256};
pub use chains::{chain_info, supported_chain_ids, ChainInfo};
pub use decimal::Decimal;
pub use entities::{
    clock_tick_id, BlacklistStatus, ClockTick, ContractStatus, Investor, InvestorPosition,
    InvestorPositionBreakdown, RewardPool, StakingKind, Token, Vault, VaultBalanceBreakdown,
    VaultKind,
};
pub use primitives::{
    address_key, is_sentinel, BlockNumber, ChainId, Timestamp, BURN_ADDRESS, MINT_ADDRESS,
};
pub use vault_config::{BoostConfig, ProtocolType, RewardPoolConfig, VaultConfig};
