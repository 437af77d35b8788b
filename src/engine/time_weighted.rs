//! Time-weighted (balance × seconds) accumulation.
//!
//! Left-Riemann sum: the balance observed at the previous snapshot is assumed to hold
//! until the new snapshot.

use crate::domain::{Decimal, Timestamp};

/// Previous snapshot of a position's breakdown.
#[derive(Debug, Clone, Copy)]
pub struct PreviousSnapshot<'a> {
    pub balances: &'a [Decimal],
    pub time_weighted: &'a [Decimal],
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulationKind {
    /// No prior snapshot; integral starts at zero.
    Initial,
    /// Prior snapshot extended by the elapsed time.
    Continued { elapsed_secs: u64 },
    /// Token set changed shape; integral restarted at zero.
    Reset { previous_len: usize, new_len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulation {
    pub time_weighted: Vec<Decimal>,
    pub balances: Vec<Decimal>,
    pub kind: AccumulationKind,
}

impl Accumulation {
    pub fn is_reset(&self) -> bool {
        matches!(self.kind, AccumulationKind::Reset { .. })
    }
}

/// Extend `previous` up to `now` and adopt `new_balances` as the current balances.
pub fn accumulate(
    previous: PreviousSnapshot<'_>,
    new_balances: Vec<Decimal>,
    now: Timestamp,
) -> Accumulation {
    let zeros = || vec![Decimal::zero(); new_balances.len()];

    if previous.balances.is_empty() || previous.timestamp.is_unset() {
        return Accumulation {
            time_weighted: zeros(),
            balances: new_balances,
            kind: AccumulationKind::Initial,
        };
    }

    // A stored integral of the wrong shape is as unusable as a changed token set.
    if previous.balances.len() != new_balances.len()
        || previous.time_weighted.len() != previous.balances.len()
    {
        return Accumulation {
            time_weighted: zeros(),
            kind: AccumulationKind::Reset {
                previous_len: previous.balances.len(),
                new_len: new_balances.len(),
            },
            balances: new_balances,
        };
    }

    let elapsed_secs = now.seconds_since(previous.timestamp);
    let elapsed = Decimal::from(elapsed_secs);
    let time_weighted = previous
        .time_weighted
        .iter()
        .zip(previous.balances)
        .map(|(tw, balance)| tw + &(balance * &elapsed))
        .collect();

    Accumulation {
        time_weighted,
        balances: new_balances,
        kind: AccumulationKind::Continued { elapsed_secs },
    }
}
