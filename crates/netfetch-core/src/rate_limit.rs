//! Fixed-window rate limiter (SPEC_FULL §4.9), an external collaborator to the pipeline —
//! not wired into the admission controller itself.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::error::{NetfetchError, NetworkError, Result};

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Fixed 1-second-window limiter. Deliberately not named `TokenBucket`: it refills the whole
/// window at once rather than continuously, so the token-bucket name would overstate precision.
pub struct RateLimiter {
    rate: i64,
    window_start_ms: AtomicU64,
    remaining: AtomicI64,
}

impl RateLimiter {
    pub fn new(rate: i64) -> Self {
        RateLimiter { rate, window_start_ms: AtomicU64::new(now_millis()), remaining: AtomicI64::new(rate) }
    }

    /// Non-blocking: refills on window rollover, then consumes one token if available.
    pub fn allow(&self) -> bool {
        let now = now_millis();
        let window_start = self.window_start_ms.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) >= 1000 {
            // Swap in the new window; whichever caller wins the CAS resets the budget, the
            // rest simply see the refreshed state on their next load.
            if self
                .window_start_ms
                .compare_exchange(window_start, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.remaining.store(self.rate, Ordering::SeqCst);
            }
        }
        self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 || {
            // Overshot: undo the decrement so the counter doesn't drift negative forever.
            self.remaining.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    /// Polls `allow()` every 10ms until it succeeds or `token` is cancelled.
    pub async fn wait(&self, token: &CancellationToken) -> Result<()> {
        loop {
            if self.allow() {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = token.cancelled() => return Err(NetfetchError::Network(NetworkError::Cancelled)),
            }
        }
    }
}
