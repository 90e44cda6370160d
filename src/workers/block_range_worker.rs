//! Consumes `block-ranges` jobs: fetches Transfer logs for `[from, to]` and
//! advances indexer state (§4.7).

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use uuid::Uuid;

use crate::errors::IndexerError;
use crate::models::transfer::Transfer;
use crate::services::chunk_governor::ChunkGovernor;
use crate::services::job_queue::{BlockRangeJob, EnqueueOptions, JobQueue, QueueName, DEFAULT_ATTEMPTS};
use crate::services::persistence::Persistence;
use crate::services::rpc_client::{Log, RpcClient};

pub struct BlockRangeWorker {
    persistence: Persistence,
    rpc: Arc<RpcClient>,
    queue: Arc<JobQueue>,
    chunk_governor: Arc<ChunkGovernor>,
}

impl BlockRangeWorker {
    pub fn new(
        persistence: Persistence,
        rpc: Arc<RpcClient>,
        queue: Arc<JobQueue>,
        chunk_governor: Arc<ChunkGovernor>,
    ) -> Self {
        Self { persistence, rpc, queue, chunk_governor }
    }

    /// Spawns a single consumer loop. The coordinator's worker pool setting
    /// determines how many of these are started.
    pub fn spawn(self: Arc<Self>, worker_id: usize) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.queue.fetch::<BlockRangeJob>(QueueName::BlockRanges).await {
                    Ok(Some(job)) => {
                        let attempt = job.attempt;
                        if let Err(err) = self.process(&job.payload).await {
                            tracing::warn!(worker_id, job_id = %job.id, error = %err, "block-range job failed");
                            let retryable = !matches!(err, IndexerError::Permanent(_));
                            let _ = self
                                .queue
                                .fail(
                                    QueueName::BlockRanges,
                                    &job.id,
                                    job.payload.priority,
                                    attempt,
                                    DEFAULT_ATTEMPTS,
                                    retryable,
                                )
                                .await;
                        } else {
                            let _ = self.queue.complete(QueueName::BlockRanges, &job.id).await;
                        }
                    }
                    Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                    Err(err) => {
                        tracing::error!(worker_id, error = %err, "block-range queue fetch failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }

    async fn process(&self, job: &BlockRangeJob) -> Result<(), IndexerError> {
        // 1. Resolve contract.
        let contract = self
            .persistence
            .get_contract_by_address_and_chain(&job.contract_address, job.chain_id)
            .await?
            .ok_or_else(|| IndexerError::Permanent(format!("unknown contract {}", job.contract_address)))?;

        self.rpc.switch_chain(job.chain_id).await.map_err(IndexerError::from)?;

        // 2. getLogs across [from, to].
        let logs = match self
            .rpc
            .get_transfer_logs(&job.contract_address, job.from_block as u64, job.to_block as u64)
            .await
        {
            Ok(logs) => logs,
            Err(crate::errors::RpcError::MaxResultsExceeded) => {
                return self.handle_max_results_exceeded(job).await;
            }
            Err(err) if err.is_retryable() => return Err(err.into()),
            Err(err) => {
                self.persistence
                    .record_error(job.chain_id, &job.contract_address, &err.to_string())
                    .await?;
                return Err(IndexerError::Permanent(err.to_string()));
            }
        };

        // 3. Group by block number, fetch timestamps.
        let mut block_timestamps = std::collections::HashMap::new();
        let mut block_numbers: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
        block_numbers.sort_unstable();
        block_numbers.dedup();

        for block_number in block_numbers {
            match self.rpc.get_block_by_number(block_number).await {
                Ok(block) => {
                    block_timestamps.insert(block_number, block.timestamp);
                }
                Err(err) => {
                    tracing::debug!(block_number, error = %err, "could not fetch block for timestamp");
                }
            }
        }

        // 4. Decode each log into a Transfer.
        let mut transfers = Vec::new();
        for log in &logs {
            if let Some(transfer) = decode_transfer(log, job, &contract.id, &block_timestamps) {
                transfers.push(transfer);
            }
        }

        // 5. Upsert.
        self.persistence.upsert_transfers_batch(&transfers).await?;

        // 6. Advance state.
        self.persistence
            .advance(job.chain_id, &job.contract_address, job.to_block, transfers.len() as i64)
            .await?;

        // 7. Heuristic feedback.
        if job.to_block - job.from_block + 1 > 100 {
            self.chunk_governor.increase(job.chain_id);
        }

        Ok(())
    }

    async fn handle_max_results_exceeded(&self, job: &BlockRangeJob) -> Result<(), IndexerError> {
        self.chunk_governor.reduce(job.chain_id);
        let _ = self.rpc.switch_to_next_provider().await;

        let span = job.to_block - job.from_block + 1;
        let chunk_size = (span / 4).max(50);
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
                        priority: job.priority,
                        retry_count: job.retry_count,
                    },
                    EnqueueOptions { priority: job.priority, delay_secs: 0 },
                )
                .await?;
            from = to + 1;
        }

        Ok(())
    }
}

fn decode_transfer(
    log: &Log,
    job: &BlockRangeJob,
    contract_id: &Uuid,
    block_timestamps: &std::collections::HashMap<u64, u64>,
) -> Option<Transfer> {
    if log.topics.len() < 3 || log.data.trim_start_matches("0x").is_empty() {
        return None;
    }

    let from_topic = &log.topics[1];
    let to_topic = &log.topics[2];

    if from_topic.len() < 66 || to_topic.len() < 66 {
        return None;
    }

    let from_address = format!("0x{}", &from_topic[26..]);
    let to_address = format!("0x{}", &to_topic[26..]);

    let amount_hex = log.data.trim_start_matches("0x");
    let amount = BigUint::parse_bytes(amount_hex.as_bytes(), 16)?;

    let timestamp_secs = block_timestamps.get(&log.block_number).copied().unwrap_or(0);
    let timestamp = chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp_secs as i64, 0)
        .unwrap_or_default()
        .naive_utc();

    Some(Transfer {
        chain_id: job.chain_id,
        tx_hash: log.tx_hash.clone(),
        log_index: log.log_index as i32,
        block_number: log.block_number as i64,
        block_hash: log.block_hash.clone(),
        timestamp,
        from_address,
        to_address,
        amount,
        contract_id: Some(*contract_id),
        contract_address: job.contract_address.clone(),
        confirmations: 0,
        is_confirmed: false,
        status: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> BlockRangeJob {
        BlockRangeJob {
            chain_id: 1,
            contract_address: "0xcontract".to_string(),
            from_block: 100,
            to_block: 200,
            priority: 5,
            retry_count: 0,
        }
    }

    #[test]
    fn skips_logs_with_too_few_topics() {
        let log = Log {
            block_number: 100,
            block_hash: "0xhash".to_string(),
            tx_hash: "0xtx".to_string(),
            log_index: 0,
            topics: vec!["0xtopic0".to_string()],
            data: "0x01".to_string(),
        };
        assert!(decode_transfer(&log, &sample_job(), &Uuid::new_v4(), &Default::default()).is_none());
    }

    #[test]
    fn decodes_well_formed_transfer_log() {
        let from_topic = format!("0x{:0>64}", "1111111111111111111111111111111111111111");
        let to_topic = format!("0x{:0>64}", "2222222222222222222222222222222222222222");
        let log = Log {
            block_number: 100,
            block_hash: "0xhash".to_string(),
            tx_hash: "0xtx".to_string(),
            log_index: 1,
            topics: vec!["0xtransfer".to_string(), from_topic, to_topic],
            data: "0x64".to_string(),
        };
        let transfer = decode_transfer(&log, &sample_job(), &Uuid::new_v4(), &Default::default()).unwrap();
        assert_eq!(transfer.amount, BigUint::from(100u32));
        assert!(transfer.from_address.starts_with("0x1111"));
        assert!(transfer.to_address.starts_with("0x2222"));
    }
}
