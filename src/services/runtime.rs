//! Process-wide handle to the long-lived indexer actors (coordinator, RPC
//! client, job queue, governors). Loco's `AppContext` carries the database
//! connection into each request, but the indexer's control loops and queue
//! consumers outlive any single request, so they're assembled once during
//! boot and published here for controllers and cron tasks to reach.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use sea_orm::DatabaseConnection;

use crate::errors::IndexerError;
use crate::services::chunk_governor::ChunkGovernor;
use crate::services::config_service::{ConfigService, IndexerSettings};
use crate::services::coordinator::Coordinator;
use crate::services::error_governor::ErrorGovernor;
use crate::services::job_queue::{JobQueue, QueueName};
use crate::services::persistence::Persistence;
use crate::services::rpc_client::RpcClient;
use crate::workers::block_range_worker::BlockRangeWorker;
use crate::workers::catchup_worker::CatchupWorker;
use crate::workers::reorg_worker::ReorgWorker;

pub struct IndexerRuntime {
    pub persistence: Persistence,
    pub rpc: Arc<RpcClient>,
    pub queue: Arc<JobQueue>,
    pub chunk_governor: Arc<ChunkGovernor>,
    pub error_governor: Arc<ErrorGovernor>,
    pub coordinator: Arc<Coordinator>,
    pub settings: IndexerSettings,
}

static RUNTIME: OnceCell<Arc<IndexerRuntime>> = OnceCell::new();

impl IndexerRuntime {
    pub async fn bootstrap(db: DatabaseConnection) -> Result<Arc<IndexerRuntime>, IndexerError> {
        let settings = ConfigService::load_settings();
        let persistence = Persistence::new(db);
        let rpc = Arc::new(RpcClient::new(
            Duration::from_millis(settings.blockchain_timeout_ms),
            settings.blockchain_retry_attempts,
        ));
        let queue = Arc::new(JobQueue::connect(&ConfigService::redis_url()).await?);
        let chunk_governor = Arc::new(ChunkGovernor::new(
            settings.min_catchup_chunk_size,
            settings.max_catchup_chunk_size,
        ));
        let error_governor = Arc::new(ErrorGovernor::new());

        let coordinator = Coordinator::new(
            persistence.clone(),
            Arc::clone(&rpc),
            Arc::clone(&queue),
            Arc::clone(&chunk_governor),
            Arc::clone(&error_governor),
            settings.clone(),
        );

        let runtime = Arc::new(IndexerRuntime {
            persistence,
            rpc,
            queue,
            chunk_governor,
            error_governor,
            coordinator,
            settings,
        });

        RUNTIME
            .set(Arc::clone(&runtime))
            .map_err(|_| IndexerError::Permanent("indexer runtime already initialized".to_string()))?;

        runtime.spawn_worker_pools();
        runtime.spawn_supervisor();
        runtime.spawn_queue_maintenance();
        runtime.coordinator.resume_running().await?;

        Ok(runtime)
    }

    pub fn get() -> Option<Arc<IndexerRuntime>> {
        RUNTIME.get().cloned()
    }

    /// Health cron + emergency-shutdown watchdog (§4.3/§4.8): runs the
    /// coordinator's stuck-indexer check every minute, and pauses every
    /// queue the moment the error governor requests a shutdown so a
    /// runaway chain can't be re-armed until an operator calls
    /// `reset-error-counters`.
    fn spawn_supervisor(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            let mut shutdown_latched = false;
            loop {
                ticker.tick().await;

                if let Err(err) = this.coordinator.run_health_check().await {
                    tracing::warn!(error = %err, "health check failed");
                }

                let shutdown_requested = this.error_governor.shutdown_requested();
                if shutdown_requested && !shutdown_latched {
                    shutdown_latched = true;
                    if let Err(err) = this.coordinator.emergency_shutdown().await {
                        tracing::error!(error = %err, "emergency shutdown failed");
                    }
                } else if !shutdown_requested {
                    shutdown_latched = false;
                }
            }
        });
    }

    /// Promotes elapsed delayed jobs back to `pending` and redelivers
    /// stalled leases (§4.6/§6.5 "at-least-once... redelivered up to
    /// maxStalledCount"). Runs well inside `STALL_LEASE_SECS` so a stalled
    /// lease doesn't sit for minutes before being reclaimed.
    fn spawn_queue_maintenance(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                ticker.tick().await;
                for queue in [QueueName::BlockRanges, QueueName::Catchup, QueueName::Reorg] {
                    if let Err(err) = this.queue.promote_delayed(queue).await {
                        tracing::warn!(queue = queue.as_str(), error = %err, "failed to promote delayed jobs");
                    }
                    if let Err(err) = this.queue.reclaim_stalled(queue).await {
                        tracing::warn!(queue = queue.as_str(), error = %err, "failed to reclaim stalled jobs");
                    }
                }
            }
        });
    }

    fn spawn_worker_pools(self: &Arc<Self>) {
        let block_range_worker = Arc::new(BlockRangeWorker::new(
            self.persistence.clone(),
            Arc::clone(&self.rpc),
            Arc::clone(&self.queue),
            Arc::clone(&self.chunk_governor),
        ));
        for id in 0..self.settings.block_range_workers {
            Arc::clone(&block_range_worker).spawn(id);
        }

        let catchup_worker = Arc::new(CatchupWorker::new(Arc::clone(&self.queue)));
        for id in 0..self.settings.catchup_workers {
            Arc::clone(&catchup_worker).spawn(id);
        }

        let reorg_worker = Arc::new(ReorgWorker::new(self.persistence.clone(), Arc::clone(&self.queue)));
        for id in 0..self.settings.reorg_workers {
            Arc::clone(&reorg_worker).spawn(id);
        }
    }
}
