//! Chain-switchable, multi-provider EVM JSON-RPC client (§4.1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::errors::RpcError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
    pub log_index: u32,
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct LogFilter {
    pub address: String,
    pub from_block: u64,
    pub to_block: u64,
    pub topics: Vec<Option<String>>,
}

struct ChainProviders {
    urls: Vec<String>,
    cursor: AtomicUsize,
}

/// `RpcClient` holds a provider list per chain and a single "active chain"
/// cursor; callers drive it with `switch_chain` before issuing calls.
pub struct RpcClient {
    http: reqwest::Client,
    providers: RwLock<HashMap<i64, ChainProviders>>,
    active_chain: RwLock<Option<i64>>,
    timeout: Duration,
    max_retries: u32,
}

impl RpcClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            providers: RwLock::new(HashMap::new()),
            active_chain: RwLock::new(None),
            timeout,
            max_retries,
        }
    }

    pub async fn register_chain(&self, chain_id: i64, provider_urls: Vec<String>) {
        self.providers.write().await.insert(
            chain_id,
            ChainProviders {
                urls: provider_urls,
                cursor: AtomicUsize::new(0),
            },
        );
    }

    /// `switchChain(chainId)`: select the provider list, reset cursor to 0.
    pub async fn switch_chain(&self, chain_id: i64) -> Result<(), RpcError> {
        let providers = self.providers.read().await;
        let chain = providers
            .get(&chain_id)
            .ok_or(RpcError::UnknownChain(chain_id))?;
        chain.cursor.store(0, Ordering::SeqCst);
        drop(providers);
        *self.active_chain.write().await = Some(chain_id);
        Ok(())
    }

    /// `switchToNextProvider()`: advance the cursor cyclically.
    pub async fn switch_to_next_provider(&self) -> Result<(), RpcError> {
        let chain_id = self.active_chain.read().await.ok_or(RpcError::NoAlternative)?;
        let providers = self.providers.read().await;
        let chain = providers.get(&chain_id).ok_or(RpcError::UnknownChain(chain_id))?;

        if chain.urls.len() <= 1 {
            return Err(RpcError::NoAlternative);
        }

        let next = (chain.cursor.fetch_add(1, Ordering::SeqCst) + 1) % chain.urls.len();
        chain.cursor.store(next, Ordering::SeqCst);
        tracing::info!(chain_id, next_provider = %chain.urls[next], "switched rpc provider");
        Ok(())
    }

    async fn current_url(&self) -> Result<String, RpcError> {
        let chain_id = self.active_chain.read().await.ok_or(RpcError::NoAlternative)?;
        let providers = self.providers.read().await;
        let chain = providers.get(&chain_id).ok_or(RpcError::UnknownChain(chain_id))?;
        let idx = chain.cursor.load(Ordering::SeqCst) % chain.urls.len().max(1);
        Ok(chain.urls[idx].clone())
    }

    /// `retryDelay(err, attempt)`.
    fn retry_delay(err: &RpcError, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = 1u64;
        let ceiling = 30u64;

        let secs = match err {
            RpcError::Rpc { message, .. } if message.to_lowercase().contains("rate") => {
                base.saturating_pow(3).saturating_mul(attempt as u64)
            }
            RpcError::Transport(e) if e.status().map(|s| s.is_server_error()).unwrap_or(false) => {
                base.saturating_pow(2).saturating_mul(attempt as u64)
            }
            RpcError::Transport(_) => base.saturating_mul(attempt as u64),
            _ => base.saturating_mul(2u64.saturating_pow(attempt.min(5))),
        };

        Duration::from_secs(secs.min(ceiling))
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        self.execute_with_retry(method, params, self.max_retries).await
    }

    /// `executeWithRetry(op, maxRetries)`.
    async fn execute_with_retry<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        max_retries: u32,
    ) -> Result<T, RpcError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once::<T>(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_retries || !err.is_retryable() {
                        return Err(err);
                    }

                    if err.should_switch_provider() {
                        let _ = self.switch_to_next_provider().await;
                    }

                    tokio::time::sleep(Self::retry_delay(&err, attempt)).await;
                }
            }
        }
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let url = self.current_url().await?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RpcError::Http {
                status: status.as_u16(),
                message: format!("http status {status}"),
            });
        }

        let response_json: Value = response.json().await.map_err(RpcError::Transport)?;

        if let Some(error) = response_json.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error")
                .to_string();
            if is_max_results_message(&message) {
                return Err(RpcError::MaxResultsExceeded);
            }
            return Err(RpcError::Rpc { code, message });
        }

        let result = response_json
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::Parse("missing result field".to_string()))?;

        serde_json::from_value(result).map_err(|e| RpcError::Parse(e.to_string()))
    }

    /// `getBlockNumber() → u64`.
    pub async fn get_block_number(&self) -> Result<u64, RpcError> {
        let hex: String = self.request("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
    }

    /// `getBlock(number) → {number, hash, parentHash, timestamp}`.
    pub async fn get_block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        let hex_number = format!("0x{number:x}");
        let raw: Value = self
            .request("eth_getBlockByNumber", json!([hex_number, false]))
            .await?;

        parse_block(&raw)
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Result<Block, RpcError> {
        let raw: Value = self
            .request("eth_getBlockByHash", json!([hash, false]))
            .await?;
        parse_block(&raw)
    }

    /// ERC-20 `Transfer(address indexed from, address indexed to, uint256 value)`.
    pub const TRANSFER_TOPIC: &'static str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    /// `getLogs({address, fromBlock, toBlock, eventSignature, topics?}) → [Log]`.
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError> {
        let topics: Vec<Value> = filter
            .topics
            .iter()
            .map(|t| t.clone().map(Value::from).unwrap_or(Value::Null))
            .collect();

        let params = json!([{
            "address": filter.address,
            "fromBlock": format!("0x{:x}", filter.from_block),
            "toBlock": format!("0x{:x}", filter.to_block),
            "topics": topics,
        }]);

        let raw: Vec<Value> = self.request("eth_getLogs", params).await?;

        raw.iter()
            .map(parse_log)
            .collect::<Result<Vec<_>, _>>()
    }

    pub async fn get_transfer_logs(&self, address: &str, from_block: u64, to_block: u64) -> Result<Vec<Log>, RpcError> {
        self.get_logs(&LogFilter {
            address: address.to_string(),
            from_block,
            to_block,
            topics: vec![Some(Self::TRANSFER_TOPIC.to_string())],
        })
        .await
    }
}

/// Detects provider "result set too large" JSON-RPC errors (§4.7), which
/// arrive as a free-form `message` rather than a distinct error code.
/// Providers word this differently (Alchemy: "query returned more than
/// 10000 results"; Infura: "query exceeds max results"; others: "result
/// set too large"/"too many results"), so this matches on substrings
/// rather than a single fixed phrase.
fn is_max_results_message(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("more than 10000 results")
        || m.contains("exceeds max results")
        || m.contains("query returned more than")
        || m.contains("result set too large")
        || m.contains("too many results")
        || (m.contains("limit") && m.contains("result"))
}

fn parse_hex_u64(hex: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Parse(e.to_string()))
}

fn parse_block(raw: &Value) -> Result<Block, RpcError> {
    if raw.is_null() {
        return Err(RpcError::Parse("block not found".to_string()));
    }

    let number = raw
        .get("number")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Parse("missing block number".to_string()))
        .and_then(parse_hex_u64)?;

    let hash = raw
        .get("hash")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Parse("missing block hash".to_string()))?
        .to_lowercase();

    let parent_hash = raw
        .get("parentHash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let timestamp = raw
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Parse("missing block timestamp".to_string()))
        .and_then(parse_hex_u64)?;

    Ok(Block {
        number,
        hash,
        parent_hash,
        timestamp,
    })
}

fn parse_log(raw: &Value) -> Result<Log, RpcError> {
    let block_number = raw
        .get("blockNumber")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Parse("missing blockNumber".to_string()))
        .and_then(parse_hex_u64)?;

    let block_hash = raw
        .get("blockHash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let tx_hash = raw
        .get("transactionHash")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let log_index = raw
        .get("logIndex")
        .and_then(Value::as_str)
        .map(|h| u32::from_str_radix(h.trim_start_matches("0x"), 16))
        .transpose()
        .map_err(|e| RpcError::Parse(e.to_string()))?
        .unwrap_or(0);

    let topics = raw
        .get("topics")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default();

    let data = raw
        .get("data")
        .and_then(Value::as_str)
        .unwrap_or("0x")
        .to_string();

    Ok(Log {
        block_number,
        block_hash,
        tx_hash,
        log_index,
        topics,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_block_number() {
        assert_eq!(parse_hex_u64("0x10").unwrap(), 16);
    }

    #[test]
    fn classifies_rate_limit_as_retryable_and_switchable() {
        let err = RpcError::Rpc {
            code: -32005,
            message: "rate limited, please slow down".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.should_switch_provider());
    }

    #[test]
    fn classifies_http_429_as_retryable_and_switchable() {
        let err = RpcError::Http {
            status: 429,
            message: "http status 429 Too Many Requests".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.should_switch_provider());
    }

    #[test]
    fn classifies_http_400_as_non_retryable() {
        let err = RpcError::Http {
            status: 400,
            message: "http status 400 Bad Request".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!err.should_switch_provider());
    }

    #[test]
    fn recognizes_provider_specific_max_results_phrasing() {
        assert!(is_max_results_message("query returned more than 10000 results"));
        assert!(is_max_results_message("query exceeds max results"));
        assert!(is_max_results_message("result set too large, narrow your filter"));
        assert!(!is_max_results_message("nonce too low"));
    }

    #[test]
    fn parses_block_payload() {
        let raw = json!({
            "number": "0xa",
            "hash": "0xABCDEF",
            "parentHash": "0x123",
            "timestamp": "0x5f5e100",
        });
        let block = parse_block(&raw).unwrap();
        assert_eq!(block.number, 10);
        assert_eq!(block.hash, "0xabcdef");
    }
}
