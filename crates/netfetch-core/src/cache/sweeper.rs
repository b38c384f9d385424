//! Background task that periodically removes expired cache entries (SPEC_FULL §4.7).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::ResponseCache;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the sweeper on the current Tokio runtime. The returned handle is not awaited by
/// callers; `Client::close` cancels `token` instead, which lets the loop exit on its next tick.
pub fn spawn_sweeper(cache: Arc<ResponseCache>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    cache.sweep_expired();
                }
                _ = token.cancelled() => {
                    tracing::debug!("cache sweeper shutting down");
                    break;
                }
            }
        }
    })
}
