//! Vault catalog: the external source of `VaultConfig`s and an hourly cache over it.

pub mod beefy_api;
pub mod mock;

use crate::domain::{Address, ChainId, Timestamp, VaultConfig};
use async_trait::async_trait;
use moka::future::Cache;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use beefy_api::BeefyApiClient;
pub use mock::StaticMetadataSource;

/// Cache window for catalog responses.
pub const CATALOG_BUCKET_SECS: u64 = 3600;

#[derive(Debug, Error, Clone)]
pub enum MetadataError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("rate limited")]
    RateLimited,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("chain {0} is not supported by the catalog")]
    UnsupportedChain(ChainId),
}

/// Source of vault configurations for a chain.
#[async_trait]
pub trait VaultMetadataSource: Send + Sync + fmt::Debug {
    async fn vault_configs(&self, chain_id: ChainId) -> Result<Vec<VaultConfig>, MetadataError>;
}

/// Catalog lookups cached by `(chain, hour bucket)`.
#[derive(Clone)]
pub struct VaultCatalog {
    source: Arc<dyn VaultMetadataSource>,
    cache: Cache<(ChainId, u64), Arc<Vec<VaultConfig>>>,
}

impl fmt::Debug for VaultCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultCatalog")
            .field("source", &self.source)
            .field("cached_buckets", &self.cache.entry_count())
            .finish()
    }
}

impl VaultCatalog {
    pub fn new(source: Arc<dyn VaultMetadataSource>) -> Self {
        Self {
            source,
            cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(Duration::from_secs(2 * CATALOG_BUCKET_SECS))
                .build(),
        }
    }

    pub fn bucket_for(now: Timestamp) -> u64 {
        now.as_secs() / CATALOG_BUCKET_SECS
    }

    /// All configs for a chain as of `now`, fetched at most once per bucket.
    pub async fn configs_at(
        &self,
        chain_id: ChainId,
        now: Timestamp,
    ) -> Result<Arc<Vec<VaultConfig>>, MetadataError> {
        let key = (chain_id, Self::bucket_for(now));
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let configs = Arc::new(self.source.vault_configs(chain_id).await?);
        debug!(chain_id = %chain_id, bucket = key.1, count = configs.len(), "Fetched vault catalog");
        self.cache.insert(key, configs.clone()).await;
        Ok(configs)
    }

    /// All configs for a chain in the current wall-clock bucket.
    pub async fn configs(&self, chain_id: ChainId) -> Result<Arc<Vec<VaultConfig>>, MetadataError> {
        self.configs_at(chain_id, wall_clock_now()).await
    }

    pub async fn config_for_address(
        &self,
        chain_id: ChainId,
        vault: &Address,
    ) -> Result<Option<VaultConfig>, MetadataError> {
        let configs = self.configs(chain_id).await?;
        Ok(configs.iter().find(|c| c.vault_address == *vault).cloned())
    }

    /// The vault config whose reward pool list contains `pool`.
    pub async fn config_for_reward_pool(
        &self,
        chain_id: ChainId,
        pool: &Address,
    ) -> Result<Option<VaultConfig>, MetadataError> {
        let configs = self.configs(chain_id).await?;
        Ok(configs.iter().find(|c| c.has_reward_pool(pool)).cloned())
    }
}

fn wall_clock_now() -> Timestamp {
    Timestamp::new(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default())
}
