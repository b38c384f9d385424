//! Two-stage admission controller (SPEC_FULL §4.8): a queue semaphore and an in-flight
//! semaphore model the distilled spec's channel-based gate, with panic isolation and EMA
//! execution-time metrics.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{ConcurrencyError, NetfetchError, Result};

const MAX_CAS_RETRIES: usize = 10;
const EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyMetrics {
    pub total: u64,
    pub active: u64,
    pub queued: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub avg_exec_ms: f64,
    pub max_exec_ms: u64,
}

impl std::fmt::Display for ConcurrencyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "concurrency: total={} active={} queued={} rejected={} completed={} failed={} avg_exec={:.1}ms max_exec={}ms",
            self.total, self.active, self.queued, self.rejected, self.completed, self.failed, self.avg_exec_ms, self.max_exec_ms
        )
    }
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    active: AtomicU64,
    queued: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    avg_exec_ms_bits: AtomicU64,
    max_exec_ms: AtomicU64,
}

/// Admission gate bounding concurrent work via a queue semaphore (waiting slot) feeding an
/// in-flight semaphore (execution slot).
pub struct ConcurrencyManager {
    queue: Semaphore,
    inflight: Semaphore,
    counters: Counters,
    closed: std::sync::atomic::AtomicBool,
}

impl ConcurrencyManager {
    pub fn new(max_concurrent: usize, queue_size: usize) -> Arc<Self> {
        Arc::new(ConcurrencyManager {
            queue: Semaphore::new(max_concurrent + queue_size),
            inflight: Semaphore::new(max_concurrent),
            counters: Counters::default(),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.queue.close();
        self.inflight.close();
    }

    /// Runs `task` under the admission gate, observing `token` at every suspension point.
    pub async fn execute<F, Fut, T>(&self, token: &CancellationToken, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetfetchError::Concurrency(ConcurrencyError::ManagerClosed));
        }
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        if token.is_cancelled() {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(NetfetchError::Network(crate::error::NetworkError::Cancelled));
        }

        let queue_permit = match self.queue.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(NetfetchError::Concurrency(ConcurrencyError::QueueFull));
            }
        };
        self.counters.queued.fetch_add(1, Ordering::Relaxed);

        let inflight_permit = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(NetfetchError::Network(crate::error::NetworkError::Cancelled));
            }
            permit = self.inflight.acquire() => permit.map_err(|_| {
                NetfetchError::Concurrency(ConcurrencyError::ManagerClosed)
            })?,
        };
        // The queue slot is held for the task's entire lifetime, not just the wait: the
        // combined queue+inflight gate bounds everything admitted, executing or not, at
        // max_concurrent + queue_size. Only the `queued` gauge (waiting, not yet executing)
        // transitions here; the permit itself is released with `inflight_permit` below.
        self.counters.queued.fetch_sub(1, Ordering::Relaxed);

        if token.is_cancelled() {
            drop(inflight_permit);
            drop(queue_permit);
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(NetfetchError::Network(crate::error::NetworkError::Cancelled));
        }

        self.counters.active.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = AssertUnwindSafe(tokio::task::spawn(task())).catch_unwind().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
        drop(inflight_permit);
        drop(queue_permit);

        self.record_exec_time(elapsed_ms);

        match result {
            Ok(Ok(value)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Ok(Err(join_err)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Err(NetfetchError::Concurrency(ConcurrencyError::ExecutionPanic { value: join_err.to_string() }))
            }
            Err(panic_payload) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let value = panic_message(&panic_payload);
                Err(NetfetchError::Concurrency(ConcurrencyError::ExecutionPanic { value }))
            }
        }
    }

    fn record_exec_time(&self, elapsed_ms: u64) {
        self.counters.max_exec_ms.fetch_max(elapsed_ms, Ordering::Relaxed);

        for _ in 0..MAX_CAS_RETRIES {
            let current_bits = self.counters.avg_exec_ms_bits.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let updated = if current == 0.0 { elapsed_ms as f64 } else { EMA_ALPHA * elapsed_ms as f64 + (1.0 - EMA_ALPHA) * current };
            if self
                .counters
                .avg_exec_ms_bits
                .compare_exchange(current_bits, updated.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    pub fn metrics(&self) -> ConcurrencyMetrics {
        ConcurrencyMetrics {
            total: self.counters.total.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            queued: self.counters.queued.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            avg_exec_ms: f64::from_bits(self.counters.avg_exec_ms_bits.load(Ordering::Relaxed)),
            max_exec_ms: self.counters.max_exec_ms.load(Ordering::Relaxed),
        }
    }

    /// Healthy iff `total < 100` or the rejection ratio is at most 5%.
    pub fn is_healthy(&self) -> bool {
        let total = self.counters.total.load(Ordering::Relaxed);
        if total < 100 {
            return true;
        }
        let rejected = self.counters.rejected.load(Ordering::Relaxed);
        (rejected as f64 / total as f64) <= 0.05
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_runs_task_and_returns_value() {
        let manager = ConcurrencyManager::new(4, 4);
        let token = CancellationToken::new();
        let result = manager.execute(&token, || async { 42 }).await.unwrap();
        assert_eq!(result, 42);
        assert_eq!(manager.metrics().completed, 1);
    }

    #[tokio::test]
    async fn execute_rejects_when_queue_is_full() {
        let manager = ConcurrencyManager::new(1, 0);
        let token = CancellationToken::new();
        // Occupy the single inflight slot with a task that waits on a oneshot.
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let hold = {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.execute(&token, move || async move { rx.await.ok() }).await })
        };
        tokio::task::yield_now().await;

        let overflow = manager.execute(&token, || async { 1 }).await;
        assert!(matches!(overflow, Err(NetfetchError::Concurrency(ConcurrencyError::QueueFull))));

        tx.send(()).ok();
        hold.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn execute_fails_fast_when_already_cancelled() {
        let manager = ConcurrencyManager::new(4, 4);
        let token = CancellationToken::new();
        token.cancel();
        let result = manager.execute(&token, || async { 1 }).await;
        assert!(matches!(result, Err(NetfetchError::Network(crate::error::NetworkError::Cancelled))));
        assert_eq!(manager.metrics().rejected, 1);
    }

    #[tokio::test]
    async fn execute_converts_panic_to_execution_panic_error() {
        let manager = ConcurrencyManager::new(4, 4);
        let token = CancellationToken::new();
        let result: Result<()> = manager.execute(&token, || async { panic!("boom") }).await;
        assert!(matches!(result, Err(NetfetchError::Concurrency(ConcurrencyError::ExecutionPanic { .. }))));
        assert_eq!(manager.metrics().failed, 1);
    }

    #[tokio::test]
    async fn closed_manager_rejects_new_work() {
        let manager = ConcurrencyManager::new(4, 4);
        manager.close();
        let token = CancellationToken::new();
        let result = manager.execute(&token, || async { 1 }).await;
        assert!(matches!(result, Err(NetfetchError::Concurrency(ConcurrencyError::ManagerClosed))));
    }

    #[tokio::test]
    async fn is_healthy_below_100_total_regardless_of_rejections() {
        let manager = ConcurrencyManager::new(1, 0);
        assert!(manager.is_healthy());
    }
}
