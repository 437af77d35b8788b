//! Per-chain serialization of ledger writes.
//!
//! Every event and clock firing on a chain takes that chain's lane for its whole
//! read-modify-write. Different chains never contend.

use crate::domain::ChainId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ChainLanes {
    lanes: Arc<DashMap<ChainId, Arc<Mutex<()>>>>,
}

impl ChainLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `chain_id`'s lane.
    pub async fn acquire(&self, chain_id: ChainId) -> OwnedMutexGuard<()> {
        let lane = self
            .lanes
            .entry(chain_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lane.lock_owned().await
    }
}
