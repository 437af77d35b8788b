//! Domain primitives: ChainId, BlockNumber, Timestamp and address helpers.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EVM chain identifier (e.g. 1 for ethereum, 8453 for base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn new(id: u64) -> Self {
        ChainId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block height on a given chain.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    pub fn new(n: u64) -> Self {
        BlockNumber(n)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block timestamp in seconds since Unix epoch.
///
/// Zero means "never observed" on entities that track a last-update time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn new(secs: u64) -> Self {
        Timestamp(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }

    /// Seconds elapsed since `earlier`, clamped at zero.
    pub fn seconds_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Round down to the nearest multiple of `period_secs`.
    pub fn round_down(&self, period_secs: u64) -> Timestamp {
        if period_secs == 0 {
            return *self;
        }
        Timestamp(self.0 - self.0 % period_secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfers from this address are mints.
pub const MINT_ADDRESS: Address = Address::ZERO;

/// Transfers to this address are burns.
pub const BURN_ADDRESS: Address = address!("000000000000000000000000000000000000dead");

/// True for the mint and burn sentinels, which never own a position.
pub fn is_sentinel(addr: &Address) -> bool {
    *addr == MINT_ADDRESS || *addr == BURN_ADDRESS
}

/// Lowercase `0x`-prefixed hex form used in every entity id.
pub fn address_key(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}
