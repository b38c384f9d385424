//! `TrackedConn`: thin `AsyncRead + AsyncWrite` wrapper whose `Drop` releases per-host and
//! pool-wide active-connection counters (SPEC_FULL §4.5).

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::stats::HostStats;

/// Wraps a raw connection so its lifetime is observable: construction increments `active`,
/// `Drop` decrements it exactly once even if the pool forgets to close it explicitly.
pub struct TrackedConn<T> {
    inner: T,
    host_stats: Arc<HostStats>,
    pool_active: Arc<AtomicU64>,
}

impl<T> TrackedConn<T> {
    pub fn new(inner: T, host_stats: Arc<HostStats>, pool_active: Arc<AtomicU64>) -> Self {
        pool_active.fetch_add(1, Ordering::Relaxed);
        TrackedConn { inner, host_stats, pool_active }
    }
}

impl<T> Drop for TrackedConn<T> {
    fn drop(&mut self) {
        self.host_stats.record_conn_closed();
        self.pool_active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for TrackedConn<T> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: hyper_util::client::legacy::connect::Connection> hyper_util::client::legacy::connect::Connection for TrackedConn<T> {
    fn connected(&self) -> hyper_util::client::legacy::connect::Connected {
        self.inner.connected()
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TrackedConn<T> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    #[tokio::test]
    async fn drop_decrements_active_counters_exactly_once() {
        let (a, _b) = tokio::io::duplex(64);
        let host_stats = Arc::new(HostStats::default());
        host_stats.record_dial_start();
        let pool_active = Arc::new(AtomicU64::new(1));

        {
            let _conn: TrackedConn<DuplexStream> = TrackedConn::new(a, host_stats.clone(), pool_active.clone());
            assert_eq!(pool_active.load(Ordering::Relaxed), 2);
        }

        assert_eq!(pool_active.load(Ordering::Relaxed), 1);
        assert_eq!(host_stats.active.load(Ordering::Relaxed), 0);
    }
}
