//! Deterministic ledger computations: allocation, accumulation and share deltas.

pub mod allocator;
pub mod ledger;
pub mod time_weighted;

pub use allocator::allocate;
pub use ledger::{transfer_legs, InvestorPositionLedger, ShareKind, ShareLeg};
pub use time_weighted::{accumulate, Accumulation, AccumulationKind, PreviousSnapshot};
