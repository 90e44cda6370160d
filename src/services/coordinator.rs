//! Per-(chain, contract) polling loop that decides real-time / catch-up /
//! batch mode and emits jobs onto the durable queues (§4.8).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::errors::IndexerError;
use crate::models::indexer_state::IndexerStatus;
use crate::services::chunk_governor::ChunkGovernor;
use crate::services::config_service::{ConfigService, IndexerSettings};
use crate::services::error_governor::ErrorGovernor;
use crate::services::job_queue::{BlockRangeJob, CatchupJob, EnqueueOptions, JobQueue, QueueName, ReorgJob};
use crate::services::persistence::Persistence;
use crate::services::reorg_detector::{ReorgDetector, ReorgOutcome};
use crate::services::rpc_client::RpcClient;

type PairKey = (i64, String);

pub struct Coordinator {
    persistence: Persistence,
    rpc: Arc<RpcClient>,
    queue: Arc<JobQueue>,
    chunk_governor: Arc<ChunkGovernor>,
    error_governor: Arc<ErrorGovernor>,
    settings: IndexerSettings,
    loops: RwLock<HashMap<PairKey, JoinHandle<()>>>,
    recent_catchup_requests: RwLock<HashMap<PairKey, (i64, i64, chrono::DateTime<chrono::Utc>)>>,
}

impl Coordinator {
    pub fn new(
        persistence: Persistence,
        rpc: Arc<RpcClient>,
        queue: Arc<JobQueue>,
        chunk_governor: Arc<ChunkGovernor>,
        error_governor: Arc<ErrorGovernor>,
        settings: IndexerSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            persistence,
            rpc,
            queue,
            chunk_governor,
            error_governor,
            settings,
            loops: RwLock::new(HashMap::new()),
            recent_catchup_requests: RwLock::new(HashMap::new()),
        })
    }

    /// Re-installs polling loops for every indexer state left `Running`
    /// from a prior process (restart recovery). Best-effort: a chain whose
    /// `CHAIN_<id>_RPC_URLS` is no longer configured is skipped with a log,
    /// rather than failing the whole boot.
    pub async fn resume_running(self: &Arc<Self>) -> Result<(), IndexerError> {
        let states = self.persistence.find_all_running().await?;
        for state in states {
            match ConfigService::load_chain_config(state.chain_id) {
                Ok(chain_config) => {
                    self.rpc
                        .register_chain(state.chain_id, chain_config.provider_urls)
                        .await;
                    self.install_loop(state.chain_id, &state.contract_address).await;
                }
                Err(err) => {
                    tracing::warn!(
                        chain_id = state.chain_id,
                        contract_address = %state.contract_address,
                        error = %err,
                        "skipping resume of running indexer: chain not configured"
                    );
                }
            }
        }
        Ok(())
    }

    fn key(chain_id: i64, contract_address: &str) -> PairKey {
        (chain_id, contract_address.to_lowercase())
    }

    /// `startIndexer(chainId, contract, start?)`.
    pub async fn start_indexer(
        self: &Arc<Self>,
        chain_id: i64,
        contract_address: &str,
        start: Option<i64>,
    ) -> Result<crate::models::indexer_state::IndexerStateView, IndexerError> {
        let contract_address = contract_address.to_lowercase();

        let chain_config = ConfigService::load_chain_config(chain_id)
            .map_err(|e| IndexerError::Validation(e.to_string()))?;
        self.rpc.register_chain(chain_id, chain_config.provider_urls.clone()).await;

        let default_start = start.unwrap_or(chain_config.default_start_block);

        let state = self
            .persistence
            .get_or_create_state(chain_id, &contract_address, default_start)
            .await?;

        if let Some(start) = start {
            self.persistence.reset_state(chain_id, &contract_address, start).await?;
        }

        self.persistence
            .update_status(chain_id, &contract_address, IndexerStatus::Running)
            .await?;

        self.queue.resume(QueueName::BlockRanges).await?;
        self.queue.resume(QueueName::Catchup).await?;
        self.queue.resume(QueueName::Reorg).await?;

        self.install_loop(chain_id, &contract_address).await;

        let refreshed = self
            .persistence
            .find_state(chain_id, &contract_address)
            .await?
            .unwrap_or(state);

        Ok(refreshed.into())
    }

    /// `stopIndexer(chainId, contract)`.
    pub async fn stop_indexer(&self, chain_id: i64, contract_address: &str) -> Result<crate::models::indexer_state::IndexerStateView, IndexerError> {
        let contract_address = contract_address.to_lowercase();
        self.cancel_loop(chain_id, &contract_address).await;

        self.queue.pause(QueueName::BlockRanges).await?;
        self.queue.pause(QueueName::Catchup).await?;

        let state = self
            .persistence
            .update_status(chain_id, &contract_address, IndexerStatus::Stopped)
            .await?;

        Ok(state.into())
    }

    /// `resetIndexer(chainId, contract, block)`.
    pub async fn reset_indexer(
        &self,
        chain_id: i64,
        contract_address: &str,
        block: i64,
    ) -> Result<crate::models::indexer_state::IndexerStateView, IndexerError> {
        let contract_address = contract_address.to_lowercase();
        self.cancel_loop(chain_id, &contract_address).await;
        let state = self.persistence.reset_state(chain_id, &contract_address, block).await?;
        Ok(state.into())
    }

    /// `triggerCatchUp(chainId, contract, from, to)`.
    pub async fn trigger_catch_up(
        &self,
        chain_id: i64,
        contract_address: &str,
        from: i64,
        to: i64,
    ) -> Result<(), IndexerError> {
        let contract_address = contract_address.to_lowercase();

        if from > to {
            return Err(IndexerError::Validation("fromBlock must be <= toBlock".to_string()));
        }
        if to - from > 2000 {
            return Err(IndexerError::Validation("catch-up range exceeds 2000 blocks".to_string()));
        }

        let state = self
            .persistence
            .find_state(chain_id, &contract_address)
            .await?
            .ok_or_else(|| IndexerError::NotFound("indexer state not found".to_string()))?;

        if to > state.current_block {
            return Err(IndexerError::Validation("toBlock is beyond current head".to_string()));
        }

        let key = Self::key(chain_id, &contract_address);
        {
            let mut recent = self.recent_catchup_requests.write().await;
            let now = chrono::Utc::now();
            if let Some((prev_from, prev_to, at)) = recent.get(&key) {
                if *prev_from == from && *prev_to == to && now.signed_duration_since(*at) < chrono::Duration::seconds(3) {
                    return Err(IndexerError::RepeatedRequest(
                        "identical catch-up request submitted within the idempotency window".to_string(),
                    ));
                }
            }
            recent.insert(key, (from, to, now));
        }

        let chunk = self.chunk_governor.optimal(to - from, chain_id).max(1);

        self.queue
            .add(
                QueueName::Catchup,
                &CatchupJob {
                    chain_id,
                    contract_address,
                    from_block: from,
                    to_block: to,
                    chunk_size: chunk,
                },
                EnqueueOptions { priority: 5, delay_secs: 0 },
            )
            .await?;

        Ok(())
    }

    async fn install_loop(self: &Arc<Self>, chain_id: i64, contract_address: &str) {
        let key = Self::key(chain_id, contract_address);
        let mut loops = self.loops.write().await;
        if loops.contains_key(&key) {
            return;
        }

        let this = Arc::clone(self);
        let contract_address = contract_address.to_string();
        let interval = Duration::from_millis(this.settings.polling_interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = this.tick(chain_id, &contract_address).await {
                    tracing::warn!(chain_id, contract_address, error = %err, "coordinator tick failed");
                    this.error_governor.on_error(chain_id, &contract_address, &err.to_string()).await;
                }
            }
        });

        loops.insert(key, handle);
    }

    async fn cancel_loop(&self, chain_id: i64, contract_address: &str) {
        let key = Self::key(chain_id, contract_address);
        if let Some(handle) = self.loops.write().await.remove(&key) {
            handle.abort();
        }
    }

    /// One coordinator tick for a single (chain, contract) pair.
    async fn tick(self: &Arc<Self>, chain_id: i64, contract_address: &str) -> Result<(), IndexerError> {
        let state = self
            .persistence
            .find_state(chain_id, contract_address)
            .await?
            .ok_or_else(|| IndexerError::NotFound("indexer state not found".to_string()))?;

        if state.status != IndexerStatus::Running.as_str() {
            return Ok(());
        }

        if self.error_governor.check_breaker() {
            return Ok(());
        }

        if let Err(e) = self.rpc.switch_chain(chain_id).await {
            self.error_governor.open_breaker();
            return Err(e.into());
        }

        let head = match self.rpc.get_block_number().await {
            Ok(head) => head as i64,
            Err(e) => {
                self.error_governor.open_breaker();
                return Err(e.into());
            }
        };

        self.persistence.update_current_block(chain_id, contract_address, head).await?;
        self.error_governor.on_success();

        let lag = head - state.last_processed_block;
        let chunk = self.chunk_governor.optimal(lag, chain_id).max(1);

        let metrics = self.queue.metrics(QueueName::BlockRanges).await?;
        let has_pending = metrics.waiting > 0 || metrics.active > 0;
        let too_many_pending =
            metrics.waiting > (self.settings.block_range_workers as u64) * self.settings.max_pending_per_worker;

        let from_block = state.last_processed_block + 1;

        let reorg_detector = ReorgDetector::new(self.persistence.db(), &self.rpc, self.settings.reorg_check_depth);
        match reorg_detector
            .check_for_reorg(chain_id, contract_address, from_block - 1, head)
            .await?
        {
            ReorgOutcome::RolledBack { reorg_id, rollback_to, block_number, .. } => {
                self.queue
                    .add(
                        QueueName::Reorg,
                        &ReorgJob {
                            chain_id,
                            reorg_id,
                            affected_from_block: rollback_to,
                            affected_to_block: block_number,
                        },
                        EnqueueOptions { priority: 1, delay_secs: 0 },
                    )
                    .await?;
                // Abandon this tick's emission; next tick recomputes against
                // the freshly rolled-back last_processed_block.
                return Ok(());
            }
            ReorgOutcome::NoOp => {}
        }

        if state.is_catching_up && lag <= self.settings.catchup_threshold {
            self.persistence.set_catching_up(chain_id, contract_address, false).await?;
        }

        if lag <= self.settings.realtime_threshold {
            if lag <= 3 {
                tokio::time::sleep(Duration::from_secs(12)).await;
            }
            let to_block = from_block + lag.min(5) - 1;
            if to_block >= from_block {
                self.queue
                    .add(
                        QueueName::BlockRanges,
                        &BlockRangeJob {
                            chain_id,
                            contract_address: contract_address.to_string(),
                            from_block,
                            to_block,
                            priority: 10,
                            retry_count: 0,
                        },
                        EnqueueOptions { priority: 10, delay_secs: 0 },
                    )
                    .await?;
            }
        } else if lag > self.settings.catchup_threshold && !state.is_catching_up && !has_pending {
            self.persistence.set_catching_up(chain_id, contract_address, true).await?;
            self.queue
                .add(
                    QueueName::Catchup,
                    &CatchupJob {
                        chain_id,
                        contract_address: contract_address.to_string(),
                        from_block,
                        to_block: head,
                        chunk_size: chunk,
                    },
                    EnqueueOptions { priority: 5, delay_secs: 0 },
                )
                .await?;
        } else if !too_many_pending {
            let to_block = (from_block + chunk as i64 - 1).min(head);
            if to_block >= from_block {
                self.queue
                    .add(
                        QueueName::BlockRanges,
                        &BlockRangeJob {
                            chain_id,
                            contract_address: contract_address.to_string(),
                            from_block,
                            to_block,
                            priority: 5,
                            retry_count: 0,
                        },
                        EnqueueOptions { priority: 5, delay_secs: 0 },
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Health cron (every minute): log any running state that has not
    /// indexed in over 5 minutes.
    pub async fn run_health_check(&self) -> Result<(), IndexerError> {
        let states = self.persistence.find_all_running().await?;
        let now = chrono::Utc::now().naive_utc();

        for state in states {
            if let Some(last_indexed_at) = state.last_indexed_at {
                if now.signed_duration_since(last_indexed_at) > chrono::Duration::minutes(5) {
                    tracing::warn!(
                        chain_id = state.chain_id,
                        contract_address = %state.contract_address,
                        last_indexed_at = %last_indexed_at,
                        "indexer appears stuck"
                    );
                }
            }
        }

        Ok(())
    }

    pub async fn emergency_shutdown(&self) -> Result<(), IndexerError> {
        self.queue.pause(QueueName::BlockRanges).await?;
        self.queue.pause(QueueName::Catchup).await?;
        self.queue.pause(QueueName::Reorg).await?;

        let states = self.persistence.find_all_states().await?;
        for state in states {
            if state.status == IndexerStatus::Running.as_str() {
                self.persistence
                    .update_status(state.chain_id, &state.contract_address, IndexerStatus::Error)
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lowercases_contract_address() {
        assert_eq!(
            Coordinator::key(1, "0xABCDEF"),
            (1, "0xabcdef".to_string())
        );
    }
}
