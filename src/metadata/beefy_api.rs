//! Vault catalog HTTP client.
//!
//! Joins four catalog listings into `VaultConfig`s:
//! - `/cow-vaults/{chain}`: CLM managers
//! - `/vaults/{chain}`: classic vaults (gov vaults excluded)
//! - `/gov-vaults/{chain}`: v2 entries are CLM reward pools
//! - `/boosts/{chain}`: v2 entries are vault reward pools, older ones are legacy boosts

use super::{MetadataError, VaultMetadataSource};
use crate::domain::{
    address_key, chain_info, Address, BoostConfig, ChainId, ProtocolType, RewardPoolConfig,
    VaultConfig,
};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClmManager {
    pub id: String,
    pub status: String,
    pub platform_id: String,
    pub strategy: String,
    pub chain: String,
    #[serde(rename = "type", default)]
    pub manager_type: Option<String>,
    /// Underlying pool.
    pub token_address: String,
    /// The manager contract itself.
    pub earned_token_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVault {
    pub id: String,
    pub status: String,
    pub platform_id: String,
    pub strategy: String,
    pub chain: String,
    #[serde(default)]
    pub token_address: Option<String>,
    pub earned_token_address: String,
    #[serde(default)]
    pub is_gov_vault: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGovVault {
    pub id: String,
    #[serde(default)]
    pub version: Option<u32>,
    pub chain: String,
    /// Staked token (a CLM manager for v2 entries).
    pub token_address: String,
    pub earn_contract_address: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBoost {
    pub id: String,
    #[serde(default)]
    pub version: Option<u32>,
    pub chain: String,
    #[serde(default)]
    pub token_address: Option<String>,
    pub earn_contract_address: String,
}

/// Raw catalog listings for one chain.
#[derive(Debug, Clone, Default)]
pub struct CatalogListings {
    pub clm_managers: Vec<ApiClmManager>,
    pub vaults: Vec<ApiVault>,
    pub gov_vaults: Vec<ApiGovVault>,
    pub boosts: Vec<ApiBoost>,
}

#[derive(Debug, Clone)]
pub struct BeefyApiClient {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl BeefyApiClient {
    pub const DEFAULT_URL: &'static str = "https://api.beefy.finance";

    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_elapsed: Duration::from_secs(30),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(MetadataError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(MetadataError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(MetadataError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(MetadataError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| backoff::Error::permanent(MetadataError::Parse(e.to_string())))
        })
        .await
    }

    pub async fn fetch_listings(&self, slug: &str) -> Result<CatalogListings, MetadataError> {
        let clm_path = format!("/cow-vaults/{}", slug);
        let vaults_path = format!("/vaults/{}", slug);
        let gov_path = format!("/gov-vaults/{}", slug);
        let boosts_path = format!("/boosts/{}", slug);
        let (clm_managers, vaults, gov_vaults, boosts) = tokio::try_join!(
            self.get_json::<Vec<ApiClmManager>>(&clm_path),
            self.get_json::<Vec<ApiVault>>(&vaults_path),
            self.get_json::<Vec<ApiGovVault>>(&gov_path),
            self.get_json::<Vec<ApiBoost>>(&boosts_path),
        )?;
        Ok(CatalogListings {
            clm_managers,
            vaults,
            gov_vaults,
            boosts,
        })
    }
}

#[async_trait]
impl VaultMetadataSource for BeefyApiClient {
    async fn vault_configs(&self, chain_id: ChainId) -> Result<Vec<VaultConfig>, MetadataError> {
        let info = chain_info(chain_id).ok_or(MetadataError::UnsupportedChain(chain_id))?;
        debug!(chain_id = %chain_id, slug = info.slug, "Fetching vault catalog");
        let listings = self.fetch_listings(info.slug).await?;
        Ok(build_vault_configs(chain_id, info.slug, &listings))
    }
}

fn parse_address(raw: &str) -> Option<Address> {
    Address::from_str(raw.trim()).ok()
}

/// Group `(key, entry)` pairs by lowercase key address.
fn group_by_address<T, F>(entries: &[T], key: F) -> HashMap<String, Vec<&T>>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut map: HashMap<String, Vec<&T>> = HashMap::new();
    for entry in entries {
        if let Some(addr) = key(entry).and_then(parse_address) {
            map.entry(address_key(&addr)).or_default().push(entry);
        }
    }
    map
}

fn reward_pools_from_gov(entries: Option<&Vec<&ApiGovVault>>) -> Vec<RewardPoolConfig> {
    entries
        .into_iter()
        .flatten()
        .filter_map(|g| {
            parse_address(&g.earn_contract_address).map(|address| RewardPoolConfig {
                id: g.id.clone(),
                address,
            })
        })
        .collect()
}

fn reward_pools_from_boosts(entries: Option<&Vec<&ApiBoost>>) -> Vec<RewardPoolConfig> {
    entries
        .into_iter()
        .flatten()
        .filter_map(|b| {
            parse_address(&b.earn_contract_address).map(|address| RewardPoolConfig {
                id: b.id.clone(),
                address,
            })
        })
        .collect()
}

fn boosts_from(entries: Option<&Vec<&ApiBoost>>) -> Vec<BoostConfig> {
    entries
        .into_iter()
        .flatten()
        .filter_map(|b| {
            parse_address(&b.earn_contract_address).map(|address| BoostConfig {
                id: b.id.clone(),
                address,
            })
        })
        .collect()
}

/// Join catalog listings into configs. Entries with unparseable addresses or an
/// unknown platform are dropped.
pub fn build_vault_configs(
    chain_id: ChainId,
    slug: &str,
    listings: &CatalogListings,
) -> Vec<VaultConfig> {
    let on_chain = |chain: &str| chain == slug;

    let clm_reward_pools: Vec<ApiGovVault> = listings
        .gov_vaults
        .iter()
        .filter(|g| on_chain(&g.chain) && g.version == Some(2))
        .cloned()
        .collect();
    let legacy_boosts: Vec<ApiBoost> = listings
        .boosts
        .iter()
        .filter(|b| on_chain(&b.chain) && b.version != Some(2))
        .cloned()
        .collect();
    let vault_reward_pools: Vec<ApiBoost> = listings
        .boosts
        .iter()
        .filter(|b| on_chain(&b.chain) && b.version == Some(2))
        .cloned()
        .collect();

    let clm_pools_by_manager = group_by_address(&clm_reward_pools, |g| Some(g.token_address.as_str()));
    let boosts_by_vault = group_by_address(&legacy_boosts, |b| b.token_address.as_deref());
    let pools_by_vault = group_by_address(&vault_reward_pools, |b| b.token_address.as_deref());

    let mut managers: Vec<VaultConfig> = Vec::new();
    for manager in listings.clm_managers.iter().filter(|m| on_chain(&m.chain)) {
        let (Some(vault_address), Some(underlying), Some(strategy)) = (
            parse_address(&manager.earned_token_address),
            parse_address(&manager.token_address),
            parse_address(&manager.strategy),
        ) else {
            warn!(chain_id = %chain_id, id = %manager.id, "Skipping CLM manager with bad address");
            continue;
        };
        let protocol_type = if manager.manager_type.as_deref() == Some("cowcentrated") {
            Some(ProtocolType::BeefyClm)
        } else {
            ProtocolType::from_platform(&manager.platform_id)
        };
        let Some(protocol_type) = protocol_type else {
            continue;
        };
        let key = address_key(&vault_address);
        managers.push(VaultConfig {
            id: manager.id.clone(),
            chain_id,
            vault_address,
            strategy_address: strategy,
            underlying_lp_address: underlying,
            protocol_type,
            reward_pools: reward_pools_from_gov(clm_pools_by_manager.get(&key)),
            boosts: boosts_from(boosts_by_vault.get(&key)),
            platform_id: manager.platform_id.clone(),
            is_active: manager.status == "active",
        });
    }

    let manager_addresses: HashSet<Address> = managers.iter().map(|m| m.vault_address).collect();

    let mut configs = managers.clone();
    for vault in listings
        .vaults
        .iter()
        .filter(|v| on_chain(&v.chain) && v.is_gov_vault != Some(true))
    {
        let (Some(vault_address), Some(strategy)) = (
            parse_address(&vault.earned_token_address),
            parse_address(&vault.strategy),
        ) else {
            warn!(chain_id = %chain_id, id = %vault.id, "Skipping vault with bad address");
            continue;
        };
        // Native-token vaults carry no token address and have no breakdown recipe.
        let Some(underlying) = vault.token_address.as_deref().and_then(parse_address) else {
            debug!(chain_id = %chain_id, id = %vault.id, "Skipping vault without underlying token");
            continue;
        };

        let protocol_type = if manager_addresses.contains(&underlying) {
            managers
                .iter()
                .find(|m| m.vault_address == underlying)
                .map(|m| ProtocolType::BeefyClmVault {
                    manager: Box::new(m.clone()),
                })
        } else {
            ProtocolType::from_platform(&vault.platform_id)
        };
        let Some(protocol_type) = protocol_type else {
            continue;
        };

        let key = address_key(&vault_address);
        configs.push(VaultConfig {
            id: vault.id.clone(),
            chain_id,
            vault_address,
            strategy_address: strategy,
            underlying_lp_address: underlying,
            protocol_type,
            reward_pools: reward_pools_from_boosts(pools_by_vault.get(&key)),
            boosts: boosts_from(boosts_by_vault.get(&key)),
            platform_id: vault.platform_id.clone(),
            is_active: vault.status == "active",
        });
    }

    configs
}
