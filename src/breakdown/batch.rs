//! Typed multicall batching shared by every breakdown strategy.
//!
//! A strategy pushes its reads into a [`ReadBatch`], gets back a typed [`Slot`] per read,
//! executes the batch once and then pulls each result as required or optional.

use super::BreakdownError;
use crate::chain::{Call, CallOutcome, ChainClient};
use crate::domain::BlockNumber;
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use std::marker::PhantomData;

/// Handle to one read inside a batch.
#[derive(Debug)]
pub struct Slot<C> {
    index: usize,
    _call: PhantomData<fn() -> C>,
}

#[derive(Debug, Default)]
pub struct ReadBatch {
    calls: Vec<Call>,
    labels: Vec<&'static str>,
}

impl ReadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `call` against `target`. `label` names the read in error messages.
    pub fn push<C: SolCall>(&mut self, label: &'static str, target: Address, call: C) -> Slot<C> {
        let index = self.calls.len();
        self.calls.push(Call::new(target, &call));
        self.labels.push(label);
        Slot {
            index,
            _call: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Run the batch at `block`. With `allow_failure == false` any revert fails the batch.
    pub async fn execute(
        self,
        client: &dyn ChainClient,
        block: BlockNumber,
        allow_failure: bool,
    ) -> Result<BatchResults, BreakdownError> {
        let outcomes = client
            .multicall(block, &self.calls, allow_failure)
            .await
            .map_err(|source| match source {
                crate::chain::ChainError::CallReverted { index } => BreakdownError::RequiredReadFailed {
                    read: self.labels.get(index).copied().unwrap_or("unknown"),
                    target: self.calls.get(index).map(|c| c.target).unwrap_or_default(),
                },
                other => BreakdownError::Chain(other),
            })?;

        Ok(BatchResults {
            outcomes,
            calls: self.calls,
            labels: self.labels,
        })
    }
}

#[derive(Debug)]
pub struct BatchResults {
    outcomes: Vec<CallOutcome>,
    calls: Vec<Call>,
    labels: Vec<&'static str>,
}

impl BatchResults {
    /// Decoded result of a read the strategy cannot do without.
    pub fn required<C: SolCall>(&self, slot: &Slot<C>) -> Result<C::Return, BreakdownError> {
        let label = self.labels.get(slot.index).copied().unwrap_or("unknown");
        let target = self
            .calls
            .get(slot.index)
            .map(|c| c.target)
            .unwrap_or_default();
        match self.outcomes.get(slot.index) {
            Some(outcome) if outcome.success => {
                C::abi_decode_returns(&outcome.return_data, true).map_err(|e| {
                    BreakdownError::Decode {
                        read: label,
                        target,
                        message: e.to_string(),
                    }
                })
            }
            _ => Err(BreakdownError::RequiredReadFailed {
                read: label,
                target,
            }),
        }
    }

    /// Whether the read went through, ignoring what it returned.
    pub fn succeeded<C: SolCall>(&self, slot: &Slot<C>) -> bool {
        self.outcomes
            .get(slot.index)
            .map(|o| o.success)
            .unwrap_or(false)
    }

    /// Decoded result of a read that may legitimately revert or return garbage.
    pub fn optional<C: SolCall>(&self, slot: &Slot<C>) -> Option<C::Return> {
        let outcome = self.outcomes.get(slot.index)?;
        if !outcome.success {
            return None;
        }
        C::abi_decode_returns(&outcome.return_data, true).ok()
    }
}
