//! Environment-driven configuration, following §6.6 of the indexer contract.
//!
//! All options have defaults so the indexer boots in development with no
//! environment at all; production deployments override via env vars the same
//! way loco's own `config/*.yaml` + env overlay works.

use loco_rs::prelude::*;
use serde::{Deserialize, Serialize};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
    pub polling_interval_ms: u64,
    pub realtime_threshold: i64,
    pub catchup_threshold: i64,
    pub min_catchup_chunk_size: u64,
    pub max_catchup_chunk_size: u64,
    pub block_range_workers: usize,
    pub catchup_workers: usize,
    pub reorg_workers: usize,
    pub max_pending_per_worker: u64,
    pub reorg_check_depth: i64,
    pub reorg_max_walkback: i64,
    pub blockchain_default_confirmations: i64,
    pub blockchain_timeout_ms: u64,
    pub blockchain_retry_attempts: u32,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            polling_interval_ms: 10_000,
            realtime_threshold: 1,
            catchup_threshold: 50,
            min_catchup_chunk_size: 10,
            max_catchup_chunk_size: 50,
            block_range_workers: 4,
            catchup_workers: 2,
            reorg_workers: 2,
            max_pending_per_worker: 2,
            reorg_check_depth: 10,
            reorg_max_walkback: 100,
            blockchain_default_confirmations: 2,
            blockchain_timeout_ms: 30_000,
            blockchain_retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: i64,
    pub provider_urls: Vec<String>,
    pub default_start_block: i64,
}

pub struct ConfigService;

impl ConfigService {
    /// Load the ambient tuning knobs from §6.6, falling back to the spec's
    /// stated defaults when unset.
    pub fn load_settings() -> IndexerSettings {
        IndexerSettings {
            polling_interval_ms: env_or("POLLING_INTERVAL", 10_000),
            realtime_threshold: env_or("REALTIME_THRESHOLD", 1),
            catchup_threshold: env_or("CATCHUP_THRESHOLD", 50),
            min_catchup_chunk_size: env_or("MIN_CATCHUP_CHUNK_SIZE", 10),
            max_catchup_chunk_size: env_or("MAX_CATCHUP_CHUNK_SIZE", 50),
            block_range_workers: env_or("BLOCK_RANGE_WORKERS", 4),
            catchup_workers: env_or("CATCHUP_WORKERS", 2),
            reorg_workers: env_or("REORG_WORKERS", 2),
            max_pending_per_worker: env_or("MAX_PENDING_PER_WORKER", 2),
            reorg_check_depth: env_or("REORG_CHECK_DEPTH", 10),
            reorg_max_walkback: env_or("REORG_MAX_WALKBACK", 100),
            blockchain_default_confirmations: env_or("BLOCKCHAIN_DEFAULT_CONFIRMATIONS", 2),
            blockchain_timeout_ms: env_or("BLOCKCHAIN_TIMEOUT", 30_000),
            blockchain_retry_attempts: env_or("BLOCKCHAIN_RETRY_ATTEMPTS", 3),
        }
    }

    /// Ordered provider list for a chain, from `CHAIN_<id>_RPC_URLS`
    /// (comma-separated, first is default) and `CHAIN_<id>_START_BLOCK`.
    pub fn load_chain_config(chain_id: i64) -> Result<ChainConfig> {
        let urls_key = format!("CHAIN_{chain_id}_RPC_URLS");
        let provider_urls: Vec<String> = std::env::var(&urls_key)
            .map_err(|_| Error::string(&format!("{urls_key} not configured for chain {chain_id}")))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if provider_urls.is_empty() {
            return Err(Error::string(&format!("{urls_key} resolved to an empty provider list")));
        }

        let start_key = format!("CHAIN_{chain_id}_START_BLOCK");
        let default_start_block = std::env::var(&start_key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| env_or("INDEXER_START_BLOCK", 0));

        Ok(ChainConfig {
            chain_id,
            provider_urls,
            default_start_block,
        })
    }

    pub fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    /// Control-plane API key (§6.1). Unset in development falls back to a
    /// fixed value so the control surface remains reachable locally.
    pub fn control_plane_api_key() -> String {
        std::env::var("INDEXER_API_KEY").unwrap_or_else(|_| "development-api-key".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let settings = IndexerSettings::default();
        assert_eq!(settings.polling_interval_ms, 10_000);
        assert_eq!(settings.realtime_threshold, 1);
        assert_eq!(settings.catchup_threshold, 50);
        assert_eq!(settings.min_catchup_chunk_size, 10);
        assert_eq!(settings.max_catchup_chunk_size, 50);
    }

    #[test]
    fn missing_chain_config_is_an_error() {
        std::env::remove_var("CHAIN_999999_RPC_URLS");
        assert!(ConfigService::load_chain_config(999_999).is_err());
    }
}
