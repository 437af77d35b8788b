//! Fixed in-memory vault catalog for tests.

use super::{MetadataError, VaultMetadataSource};
use crate::domain::{ChainId, VaultConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct StaticMetadataSource {
    configs: RwLock<HashMap<ChainId, Vec<VaultConfig>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(self, chain_id: ChainId, configs: Vec<VaultConfig>) -> Self {
        self.set_configs(chain_id, configs);
        self
    }

    pub fn set_configs(&self, chain_id: ChainId, configs: Vec<VaultConfig>) {
        let mut map = self.configs.write().unwrap_or_else(|e| e.into_inner());
        map.insert(chain_id, configs);
    }

    /// Make subsequent fetches fail with a network error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultMetadataSource for StaticMetadataSource {
    async fn vault_configs(&self, chain_id: ChainId) -> Result<Vec<VaultConfig>, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Network("catalog unavailable".to_string()));
        }
        let map = self.configs.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(&chain_id).cloned().unwrap_or_default())
    }
}
