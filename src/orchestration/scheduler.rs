//! Periodic breakdown refresh driven by block height.
//!
//! Each chain fires every `period / average_block_time` blocks. A firing rounds the block's
//! real timestamp down to the period and writes a [`ClockTick`] before refreshing any vault,
//! so a bucket runs at most once however many blocks land in it.

use super::lanes::ChainLanes;
use super::orchestrator::BreakdownOrchestrator;
use crate::chain::{ChainClient, ChainError};
use crate::db::{EntityStore, StoreError};
use crate::domain::{chain_info, BlockNumber, ChainId, ClockTick, Timestamp};
use crate::gate::ContractGate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as BlockTime;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_CLOCK_PERIOD_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("block timestamp unavailable: {0}")]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Firing cadence of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSchedule {
    pub chain_id: ChainId,
    pub period_secs: u64,
    pub interval_blocks: u64,
}

impl ClockSchedule {
    /// Cadence for a chain with a known average block time.
    pub fn for_chain(chain_id: ChainId, period_secs: u64) -> Option<Self> {
        let info = chain_info(chain_id)?;
        if info.average_block_time <= BlockTime::ZERO {
            return None;
        }
        let blocks = (BlockTime::from(period_secs) / info.average_block_time)
            .round()
            .to_u64()?;
        Some(Self {
            chain_id,
            period_secs,
            interval_blocks: blocks.max(1),
        })
    }

    pub fn is_firing_block(&self, block: BlockNumber) -> bool {
        block.as_u64() % self.interval_blocks == 0
    }

    /// Latest firing block at or below `block`.
    pub fn firing_block_at_or_before(&self, block: BlockNumber) -> BlockNumber {
        BlockNumber::new(block.as_u64() - block.as_u64() % self.interval_blocks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    /// The bucket was already handled by an earlier block.
    AlreadyFired { rounded: Timestamp },
    Fired {
        rounded: Timestamp,
        vaults: usize,
        persisted: usize,
        blocked: usize,
    },
}

#[derive(Debug, Clone)]
pub struct ClockScheduler {
    store: Arc<dyn EntityStore>,
    orchestrator: Arc<BreakdownOrchestrator>,
    gate: ContractGate,
    lanes: ChainLanes,
    period_secs: u64,
}

impl ClockScheduler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        orchestrator: Arc<BreakdownOrchestrator>,
        gate: ContractGate,
        lanes: ChainLanes,
        period_secs: u64,
    ) -> Self {
        Self {
            store,
            orchestrator,
            gate,
            lanes,
            period_secs,
        }
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// Fire the clock at `block`. Denylisted or blacklisted vaults are left alone.
    ///
    /// # Errors
    /// Fails when the block timestamp cannot be read or the store fails.
    pub async fn on_block(
        &self,
        client: &dyn ChainClient,
        block: BlockNumber,
    ) -> Result<ClockOutcome, SchedulerError> {
        let chain_id = client.chain_id();
        let timestamp = client.block_timestamp(block).await?;
        let rounded = timestamp.round_down(self.period_secs);

        let _lane = self.lanes.acquire(chain_id).await;
        let tick = ClockTick::new(chain_id, rounded, self.period_secs, block);
        if !self.store.insert_clock_tick(&tick).await? {
            debug!(chain_id = %chain_id, block_number = %block, rounded = %rounded, "Clock bucket already fired");
            return Ok(ClockOutcome::AlreadyFired { rounded });
        }

        let vaults = self.store.list_vaults(chain_id).await?;
        info!(
            chain_id = %chain_id,
            block_number = %block,
            rounded = %rounded,
            vaults = vaults.len(),
            "Clock tick firing"
        );

        let mut persisted = 0;
        let mut blocked = 0;
        for vault in &vaults {
            if self.gate.is_blocked(chain_id, &vault.address).await? {
                blocked += 1;
                continue;
            }
            let outcome = self
                .orchestrator
                .refresh_vault(client, vault.address, block, timestamp)
                .await?;
            if outcome.is_persisted() {
                persisted += 1;
            }
        }

        info!(
            chain_id = %chain_id,
            block_number = %block,
            vaults = vaults.len(),
            persisted,
            blocked,
            "Clock tick complete"
        );
        Ok(ClockOutcome::Fired {
            rounded,
            vaults: vaults.len(),
            persisted,
            blocked,
        })
    }
}

/// Poll the chain head forever and fire the clock on each new firing block.
///
/// Firing blocks missed between polls collapse into the latest one; the tick markers
/// make any overlap harmless.
pub async fn run_chain_clock(
    scheduler: ClockScheduler,
    client: Arc<dyn ChainClient>,
    schedule: ClockSchedule,
    poll_interval: Duration,
) {
    let chain_id = client.chain_id();
    info!(
        chain_id = %chain_id,
        interval_blocks = schedule.interval_blocks,
        period_secs = schedule.period_secs,
        "Starting chain clock"
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_fired: Option<BlockNumber> = None;

    loop {
        ticker.tick().await;
        let head = match client.latest_block_number().await {
            Ok(head) => head,
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "Failed to read chain head");
                continue;
            }
        };
        let firing = schedule.firing_block_at_or_before(head);
        if last_fired.is_some_and(|last| firing <= last) {
            continue;
        }
        match scheduler.on_block(client.as_ref(), firing).await {
            Ok(_) => last_fired = Some(firing),
            Err(e) => warn!(chain_id = %chain_id, block_number = %firing, error = %e, "Clock tick failed"),
        }
    }
}
