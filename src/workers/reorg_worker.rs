//! Consumes `reorg` jobs: re-prioritizes the affected range so the rolled
//! back blocks are re-fetched ahead of normal backlog (§4.6).

use std::sync::Arc;
use std::time::Duration;

use crate::errors::IndexerError;
use crate::services::job_queue::{BlockRangeJob, EnqueueOptions, JobQueue, QueueName, ReorgJob, DEFAULT_ATTEMPTS};
use crate::services::persistence::Persistence;

pub struct ReorgWorker {
    persistence: Persistence,
    queue: Arc<JobQueue>,
}

impl ReorgWorker {
    pub fn new(persistence: Persistence, queue: Arc<JobQueue>) -> Self {
        Self { persistence, queue }
    }

    pub fn spawn(self: Arc<Self>, worker_id: usize) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.queue.fetch::<ReorgJob>(QueueName::Reorg).await {
                    Ok(Some(job)) => {
                        let attempt = job.attempt;
                        if let Err(err) = self.process(&job.payload).await {
                            tracing::warn!(worker_id, job_id = %job.id, error = %err, "reorg job failed");
                            let _ = self
                                .queue
                                .fail(QueueName::Reorg, &job.id, 1, attempt, DEFAULT_ATTEMPTS, true)
                                .await;
                        } else {
                            let _ = self.queue.complete(QueueName::Reorg, &job.id).await;
                        }
                    }
                    Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                    Err(err) => {
                        tracing::error!(worker_id, error = %err, "reorg queue fetch failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    /// A reorg on a chain affects every contract tracked on that chain, not
    /// just one of them (§1, §3), so this re-enqueues the affected range for
    /// each active contract rather than picking an arbitrary one.
    async fn process(&self, job: &ReorgJob) -> Result<(), IndexerError> {
        let contracts = self.persistence.get_all_active_contracts().await?;
        let affected: Vec<_> = contracts
            .into_iter()
            .filter(|c| c.chain_id == job.chain_id)
            .collect();

        if affected.is_empty() {
            return Err(IndexerError::Permanent("no active contract for reorg job's chain".to_string()));
        }

        if job.affected_to_block >= job.affected_from_block {
            for contract in affected {
                self.queue
                    .add(
                        QueueName::BlockRanges,
                        &BlockRangeJob {
                            chain_id: job.chain_id,
                            contract_address: contract.address.clone(),
                            from_block: job.affected_from_block + 1,
                            to_block: job.affected_to_block,
                            priority: 1,
                            retry_count: 0,
                        },
                        EnqueueOptions { priority: 1, delay_secs: 0 },
                    )
                    .await?;
            }
        }

        Ok(())
    }
}
