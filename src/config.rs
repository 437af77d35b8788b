use crate::domain::{chain_info, ChainId};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const RPC_URL_PREFIX: &str = "RPC_URL_";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub vault_api_url: String,
    /// One JSON-RPC endpoint per enabled chain.
    pub rpc_urls: BTreeMap<ChainId, String>,
    pub clock_period_secs: u64,
    pub breakdown_concurrency: usize,
    pub resolver_timeout: Duration,
    pub denylist_path: Option<String>,
    pub chain_poll_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let vault_api_url = env_map
            .get("VAULT_API_URL")
            .cloned()
            .unwrap_or_else(|| crate::metadata::BeefyApiClient::DEFAULT_URL.to_string());

        let rpc_urls = parse_rpc_urls(&env_map)?;

        let clock_period_secs =
            parse_or(&env_map, "CLOCK_PERIOD_SECS", 3600u64, "must be a valid u64")?;
        if clock_period_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "CLOCK_PERIOD_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let breakdown_concurrency =
            parse_or(&env_map, "BREAKDOWN_CONCURRENCY", 16usize, "must be a valid usize")?;
        if breakdown_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "BREAKDOWN_CONCURRENCY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let resolver_timeout_ms =
            parse_or(&env_map, "RESOLVER_TIMEOUT_MS", 30_000u64, "must be a valid u64")?;
        let chain_poll_interval_ms =
            parse_or(&env_map, "CHAIN_POLL_INTERVAL_MS", 2_000u64, "must be a valid u64")?;

        let denylist_path = env_map
            .get("DENYLIST_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            vault_api_url,
            rpc_urls,
            clock_period_secs,
            breakdown_concurrency,
            resolver_timeout: Duration::from_millis(resolver_timeout_ms),
            denylist_path,
            chain_poll_interval: Duration::from_millis(chain_poll_interval_ms),
        })
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
    }
}

fn parse_rpc_urls(env_map: &HashMap<String, String>) -> Result<BTreeMap<ChainId, String>, ConfigError> {
    let mut urls = BTreeMap::new();
    for (key, value) in env_map {
        let Some(suffix) = key.strip_prefix(RPC_URL_PREFIX) else {
            continue;
        };
        let chain_id = suffix
            .parse::<u64>()
            .map(ChainId::new)
            .map_err(|_| ConfigError::InvalidValue(key.clone(), "suffix must be a chain id".to_string()))?;
        if chain_info(chain_id).is_none() {
            return Err(ConfigError::InvalidValue(
                key.clone(),
                format!("chain {} is not supported", chain_id),
            ));
        }
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidValue(key.clone(), "must not be empty".to_string()));
        }
        urls.insert(chain_id, value.trim().to_string());
    }
    if urls.is_empty() {
        return Err(ConfigError::MissingEnv(format!("{}<chain_id>", RPC_URL_PREFIX)));
    }
    Ok(urls)
}
