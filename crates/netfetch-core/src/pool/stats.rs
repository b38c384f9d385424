//! Per-host connection accounting (SPEC_FULL §4.5 data model: `HostStats`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_CAS_RETRIES: usize = 10;
const EMA_ALPHA: f64 = 0.1;

/// Lazily created on first dial to a host, lives for the pool's lifetime.
#[derive(Default)]
pub struct HostStats {
    pub active: AtomicU64,
    pub idle: AtomicU64,
    pub total: AtomicU64,
    pub failed: AtomicU64,
    pub last_used_unix: AtomicU64,
    connect_latency_ema_ms_bits: AtomicU64,
}

impl HostStats {
    pub fn record_dial_start(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dial_failed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dial_succeeded(&self, latency_ms: u64) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        self.last_used_unix.store(now, Ordering::Relaxed);
        self.record_latency(latency_ms);
    }

    /// Called by `TrackedConn::drop`.
    pub fn record_conn_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_latency(&self, sample_ms: u64) {
        for _ in 0..MAX_CAS_RETRIES {
            let current_bits = self.connect_latency_ema_ms_bits.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let updated =
                if current == 0.0 { sample_ms as f64 } else { EMA_ALPHA * sample_ms as f64 + (1.0 - EMA_ALPHA) * current };
            if self
                .connect_latency_ema_ms_bits
                .compare_exchange(current_bits, updated.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    pub fn connect_latency_ema_ms(&self) -> f64 {
        f64::from_bits(self.connect_latency_ema_ms_bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_lifecycle_updates_active_total_failed() {
        let stats = HostStats::default();
        stats.record_dial_start();
        assert_eq!(stats.active.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total.load(Ordering::Relaxed), 1);

        stats.record_dial_succeeded(42);
        assert!(stats.connect_latency_ema_ms() > 0.0);

        stats.record_conn_closed();
        assert_eq!(stats.active.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn failed_dial_decrements_active_and_increments_failed() {
        let stats = HostStats::default();
        stats.record_dial_start();
        stats.record_dial_failed();
        assert_eq!(stats.active.load(Ordering::Relaxed), 0);
        assert_eq!(stats.failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn latency_ema_converges_toward_repeated_samples() {
        let stats = HostStats::default();
        for _ in 0..50 {
            stats.record_latency(100);
        }
        assert!((stats.connect_latency_ema_ms() - 100.0).abs() < 1.0);
    }
}
