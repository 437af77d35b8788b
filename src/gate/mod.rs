//! Contract admission: static denylist, role detection and persisted blacklist status.

pub mod denylist;
pub mod detection;

use crate::db::{EntityStore, StoreError};
use crate::domain::{is_sentinel, Address, BlacklistStatus, ChainId, ContractStatus, Vault};
use std::sync::Arc;
use tracing::warn;

pub use denylist::{Denylist, DenylistError};
pub use detection::{detect_role, query_role, role_from_factory_input, ContractRole, DetectionError};

/// Decides which contracts and accounts the ledger tracks.
#[derive(Debug, Clone)]
pub struct ContractGate {
    denylist: Arc<Denylist>,
    store: Arc<dyn EntityStore>,
}

impl ContractGate {
    pub fn new(denylist: Arc<Denylist>, store: Arc<dyn EntityStore>) -> Self {
        Self { denylist, store }
    }

    /// True when the contract is denylisted or permanently blacklisted.
    ///
    /// `maybe_blacklisted` contracts stay admissible so a later event can retry them.
    pub async fn is_blocked(&self, chain_id: ChainId, address: &Address) -> Result<bool, StoreError> {
        if self.denylist.contains(chain_id, address) {
            return Ok(true);
        }
        let status = self.store.get_contract_status(chain_id, address).await?;
        Ok(matches!(
            status.map(|s| s.status),
            Some(BlacklistStatus::Blacklisted)
        ))
    }

    /// Persist a status for a contract. Anything but `ok` is logged under `[BLACKLIST]`.
    pub async fn record(
        &self,
        chain_id: ChainId,
        address: Address,
        status: BlacklistStatus,
        kind: &str,
        reason: impl Into<String>,
    ) -> Result<(), StoreError> {
        let reason = reason.into();
        if status != BlacklistStatus::Ok {
            warn!(
                chain_id = %chain_id,
                contract = %address,
                status = %status,
                reason = %reason,
                "[BLACKLIST] {}",
                kind
            );
        }
        self.store
            .save_contract_status(&ContractStatus {
                chain_id,
                address,
                status,
                reason,
            })
            .await
    }

    /// Accounts that hold shares on behalf of others and are never investors: the mint
    /// and burn sentinels, the vault's strategy and any known reward pool or boost.
    pub async fn is_excluded_account(
        &self,
        vault: &Vault,
        account: &Address,
    ) -> Result<bool, StoreError> {
        if is_sentinel(account) || *account == vault.strategy_address {
            return Ok(true);
        }
        Ok(self
            .store
            .get_reward_pool(vault.chain_id, account)
            .await?
            .is_some())
    }
}
