//! Consumes `catchup` jobs: fans a wide block range out into bounded
//! `block-ranges` jobs (§4.6).

use std::sync::Arc;
use std::time::Duration;

use crate::errors::IndexerError;
use crate::services::job_queue::{BlockRangeJob, CatchupJob, EnqueueOptions, JobQueue, QueueName, DEFAULT_ATTEMPTS};

pub struct CatchupWorker {
    queue: Arc<JobQueue>,
}

impl CatchupWorker {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    pub fn spawn(self: Arc<Self>, worker_id: usize) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.queue.fetch::<CatchupJob>(QueueName::Catchup).await {
                    Ok(Some(job)) => {
                        let attempt = job.attempt;
                        if let Err(err) = self.process(&job.payload).await {
                            tracing::warn!(worker_id, job_id = %job.id, error = %err, "catchup job failed");
                            let _ = self
                                .queue
                                .fail(QueueName::Catchup, &job.id, 5, attempt, DEFAULT_ATTEMPTS, true)
                                .await;
                        } else {
                            let _ = self.queue.complete(QueueName::Catchup, &job.id).await;
                        }
                    }
                    Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                    Err(err) => {
                        tracing::error!(worker_id, error = %err, "catchup queue fetch failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    async fn process(&self, job: &CatchupJob) -> Result<(), IndexerError> {
        let chunk_size = job.chunk_size.max(1) as i64;
        let mut from = job.from_block;

        while from <= job.to_block {
            let to = (from + chunk_size - 1).min(job.to_block);

            self.queue
                .add(
                    QueueName::BlockRanges,
                    &BlockRangeJob {
                        chain_id: job.chain_id,
                        contract_address: job.contract_address.clone(),
                        from_block: from,
                        to_block: to,
                        priority: 15,
                        retry_count: 0,
                    },
                    EnqueueOptions { priority: 15, delay_secs: 0 },
                )
                .await?;

            from = to + 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_floors_at_one() {
        assert_eq!(0u64.max(1), 1);
    }
}
