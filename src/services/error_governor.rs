//! Per-process circuit breaker and error-rate governor (§4.3).

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

pub const MAX_CONSECUTIVE: u32 = 10;
pub const MAX_PER_HOUR: u32 = 50;
pub const BREAKER_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const HOURLY_WINDOW: Duration = Duration::from_secs(60 * 60);

pub struct ErrorGovernor {
    consecutive: AtomicU32,
    hourly: AtomicU32,
    last_reset: RwLock<Instant>,
    shutdown_requested: AtomicBool,
    breaker_open: AtomicBool,
    breaker_opened_at: AtomicI64,
}

impl ErrorGovernor {
    pub fn new() -> Self {
        Self {
            consecutive: AtomicU32::new(0),
            hourly: AtomicU32::new(0),
            last_reset: RwLock::new(Instant::now()),
            shutdown_requested: AtomicBool::new(false),
            breaker_open: AtomicBool::new(false),
            breaker_opened_at: AtomicI64::new(0),
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// `onError(chainId, contract, err)`. Returns true if this call tripped
    /// an emergency shutdown.
    pub async fn on_error(&self, chain_id: i64, contract: &str, err: &str) -> bool {
        {
            let mut last_reset = self.last_reset.write().await;
            if last_reset.elapsed() >= HOURLY_WINDOW {
                self.hourly.store(0, Ordering::SeqCst);
                *last_reset = Instant::now();
            }
        }

        let consecutive = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        let hourly = self.hourly.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::warn!(chain_id, contract, err, consecutive, hourly, "indexer error recorded");

        if consecutive >= MAX_CONSECUTIVE || hourly >= MAX_PER_HOUR {
            self.emergency_shutdown(chain_id, contract, consecutive, hourly);
            true
        } else {
            false
        }
    }

    pub fn on_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    fn emergency_shutdown(&self, chain_id: i64, contract: &str, consecutive: u32, hourly: u32) {
        tracing::error!(
            chain_id,
            contract,
            consecutive,
            hourly,
            "error thresholds breached, requesting emergency shutdown"
        );
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// `openBreaker()`: called when the coordinator cannot read the head block.
    pub fn open_breaker(&self) {
        if !self.breaker_open.swap(true, Ordering::SeqCst) {
            self.breaker_opened_at
                .store(now_millis(), Ordering::SeqCst);
            tracing::warn!("error governor breaker opened");
        }
    }

    /// Clears consecutive/hourly counters and closes the breaker without
    /// waiting for `BREAKER_TIMEOUT`. Exposed via the control plane's
    /// `reset-error-counters` endpoint for operators recovering manually.
    pub fn reset(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
        self.hourly.store(0, Ordering::SeqCst);
        self.breaker_open.store(false, Ordering::SeqCst);
        self.shutdown_requested.store(false, Ordering::SeqCst);
    }

    /// `checkBreaker() → bool`: auto-closes once `BREAKER_TIMEOUT` elapses.
    pub fn check_breaker(&self) -> bool {
        if !self.breaker_open.load(Ordering::SeqCst) {
            return false;
        }

        let opened_at = self.breaker_opened_at.load(Ordering::SeqCst);
        let elapsed_ms = now_millis() - opened_at;

        if elapsed_ms >= BREAKER_TIMEOUT.as_millis() as i64 {
            self.breaker_open.store(false, Ordering::SeqCst);
            tracing::info!("error governor breaker closed after timeout");
            false
        } else {
            true
        }
    }
}

impl Default for ErrorGovernor {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trips_on_consecutive_threshold() {
        let gov = ErrorGovernor::new();
        let mut tripped = false;
        for _ in 0..MAX_CONSECUTIVE {
            tripped = gov.on_error(1, "0xabc", "boom").await;
        }
        assert!(tripped);
        assert!(gov.shutdown_requested());
    }

    #[test]
    fn breaker_closes_immediately_when_never_opened() {
        let gov = ErrorGovernor::new();
        assert!(!gov.check_breaker());
    }

    #[test]
    fn breaker_stays_open_until_timeout() {
        let gov = ErrorGovernor::new();
        gov.open_breaker();
        assert!(gov.check_breaker());
    }
}
