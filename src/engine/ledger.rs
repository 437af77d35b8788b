//! Investor share-balance ledger.
//!
//! Share-token transfers move shares between two investors. Mint and burn sentinels are
//! not investors and never receive a position.

use crate::db::{EntityStore, StoreError};
use crate::domain::{is_sentinel, Address, ChainId, Decimal, Investor, InvestorPosition};
use std::sync::Arc;
use tracing::debug;

/// One side of a transfer: a signed share delta for one investor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLeg {
    pub investor: Address,
    pub delta: Decimal,
}

/// Which balance of a position a transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    /// Vault share token held by the investor.
    Direct,
    /// Vault shares staked in a reward pool or boost.
    RewardPool,
}

/// Split a transfer into per-investor legs.
///
/// Self transfers and zero amounts produce nothing. A sentinel side is skipped.
pub fn transfer_legs(from: Address, to: Address, amount: &Decimal) -> Vec<ShareLeg> {
    if from == to || amount.is_zero() {
        return Vec::new();
    }
    let mut legs = Vec::with_capacity(2);
    if !is_sentinel(&from) {
        legs.push(ShareLeg {
            investor: from,
            delta: -amount.clone(),
        });
    }
    if !is_sentinel(&to) {
        legs.push(ShareLeg {
            investor: to,
            delta: amount.clone(),
        });
    }
    legs
}

/// Store-backed position ledger.
#[derive(Debug, Clone)]
pub struct InvestorPositionLedger {
    store: Arc<dyn EntityStore>,
}

impl InvestorPositionLedger {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Load the position, creating the investor and an empty position if absent.
    pub async fn get_or_create(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
    ) -> Result<InvestorPosition, StoreError> {
        if let Some(position) = self.store.get_position(chain_id, vault, investor).await? {
            return Ok(position);
        }
        if self.store.get_investor(investor).await?.is_none() {
            self.store.save_investor(&Investor::new(*investor)).await?;
        }
        Ok(InvestorPosition::new(chain_id, *vault, *investor))
    }

    /// Apply signed direct and reward-pool deltas and persist the position.
    ///
    /// Returns the updated position; its total is the new total share balance.
    pub async fn apply_share_delta(
        &self,
        chain_id: ChainId,
        vault: &Address,
        investor: &Address,
        direct_delta: &Decimal,
        indirect_delta: &Decimal,
    ) -> Result<InvestorPosition, StoreError> {
        let mut position = self.get_or_create(chain_id, vault, investor).await?;
        let total = position.apply_share_delta(direct_delta, indirect_delta);
        debug!(
            chain_id = %chain_id,
            vault = %vault,
            investor = %investor,
            direct_delta = %direct_delta,
            indirect_delta = %indirect_delta,
            total = %total,
            "Applied share delta"
        );
        self.store.save_position(&position).await?;
        Ok(position)
    }

    /// Apply one transfer leg to the balance selected by `kind`.
    pub async fn apply_leg(
        &self,
        chain_id: ChainId,
        vault: &Address,
        leg: &ShareLeg,
        kind: ShareKind,
    ) -> Result<InvestorPosition, StoreError> {
        let zero = Decimal::zero();
        let (direct, indirect) = match kind {
            ShareKind::Direct => (&leg.delta, &zero),
            ShareKind::RewardPool => (&zero, &leg.delta),
        };
        self.apply_share_delta(chain_id, vault, &leg.investor, direct, indirect)
            .await
    }
}
