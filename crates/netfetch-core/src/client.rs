//! `Client` (SPEC_FULL §3, §6): the single configurable entry point. Owns the connection pool,
//! the admission controller, and the optional cache/cookie-jar/rate-limiter collaborators, and
//! drives every call through the [`pipeline`](crate::pipeline) module.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::builder::RequestBuilder;
use crate::cache::{spawn_sweeper, ResponseCache};
use crate::concurrency::ConcurrencyManager;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::object_pool::Carriers;
use crate::pipeline::cookies::CookieJar;
use crate::pipeline::options::{Method, RequestOption, RequestSpec, Response};
use crate::pipeline::{self, PipelineContext};
use crate::pool::{Pool, PoolSnapshot};
use crate::rate_limit::RateLimiter;

const CARRIER_POOL_CAPACITY: usize = 64;

/// A configured HTTP client. Cheap to clone-by-reference (wrap in `Arc`); expensive to
/// construct, since building one stands up a connection pool and background tasks.
pub struct Client {
    ctx: Arc<PipelineContext>,
    shutdown: CancellationToken,
    sweeper: Option<tokio::task::JoinHandle<()>>,
    closed: AtomicBool,
}

impl Client {
    /// Validates `config`, then builds the pool, concurrency manager, and (if enabled) cache,
    /// cookie jar, and rate limiter described by it.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let pool = Arc::new(Pool::new(&config)?);
        let concurrency = ConcurrencyManager::new(config.security.max_concurrent_requests, config.security.max_concurrent_requests);

        let shutdown = CancellationToken::new();

        let (cache, sweeper) = if config.cache.enabled {
            let cache = ResponseCache::new(config.cache.max_size_bytes, config.cache.default_ttl_secs);
            let handle = spawn_sweeper(cache.clone(), shutdown.clone());
            (Some(cache), Some(handle))
        } else {
            (None, None)
        };

        let cookies = if config.features.cookies { Some(Arc::new(CookieJar::new())) } else { None };

        let rate_limiter =
            if config.rate_limit.enabled { Some(Arc::new(RateLimiter::new(config.rate_limit.requests_per_second))) } else { None };

        let carriers = Arc::new(Carriers::new(CARRIER_POOL_CAPACITY));

        let ctx = Arc::new(PipelineContext { pool, concurrency, cache, cookies, rate_limiter, carriers, config });

        Ok(Client { ctx, shutdown, sweeper, closed: AtomicBool::new(false) })
    }

    pub fn secure_defaults() -> Result<Self> {
        Client::new(ClientConfig::secure_defaults())
    }

    /// Idempotent: cancels the cache sweeper and closes the concurrency manager so in-flight
    /// calls fail fast and new ones are rejected. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return;
        }
        self.shutdown.cancel();
        self.ctx.concurrency.close();
        if let Some(handle) = &self.sweeper {
            handle.abort();
        }
    }

    pub fn pool_snapshot(&self) -> PoolSnapshot {
        self.ctx.pool.snapshot()
    }

    pub fn cache_stats(&self) -> Option<crate::cache::CacheStats> {
        self.ctx.cache.as_ref().map(|c| c.stats())
    }

    pub fn concurrency_metrics(&self) -> crate::concurrency::ConcurrencyMetrics {
        self.ctx.concurrency.metrics()
    }

    /// Runs `spec` through the pipeline as-is. The per-verb helpers below build the spec for
    /// you; this is the escape hatch for callers assembling one themselves (e.g. `DomainSession`).
    pub async fn execute(&self, spec: RequestSpec) -> Result<Response> {
        pipeline::execute(&self.ctx, spec).await
    }

    /// Functional-options entry point: builds a `RequestSpec` from `options` and runs it.
    /// `DomainSession` and the `RequestBuilder` ergonomics (below) both funnel through this.
    pub async fn request(&self, method: Method, url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
        let mut spec = RequestSpec::new(method, url);
        spec.apply(options)?;
        self.execute(spec).await
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Get, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Head, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Put, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Patch, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Delete, url)
    }

    pub fn options(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Options, url)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_config() {
        let mut cfg = ClientConfig::secure_defaults();
        cfg.security.max_response_body = 0;
        assert!(Client::new(cfg).is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let client = Client::secure_defaults().unwrap();
        client.close();
        client.close();
    }

    #[tokio::test]
    async fn request_rejects_unsupported_scheme_before_touching_the_network() {
        let client = Client::secure_defaults().unwrap();
        let err = client.get("ftp://example.com").send().await.unwrap_err();
        assert!(matches!(err, crate::error::NetfetchError::Url(crate::error::UrlError::UnsupportedScheme(_))));
    }

    #[tokio::test]
    async fn request_blocks_loopback_targets_under_secure_defaults() {
        let client = Client::secure_defaults().unwrap();
        let err = client.get("http://127.0.0.1:1/").send().await.unwrap_err();
        assert!(matches!(err, crate::error::NetfetchError::Url(crate::error::UrlError::BlockedIp(_))));
    }

    #[tokio::test]
    async fn permissive_defaults_allow_loopback_targets_past_validation() {
        let client = Client::new(ClientConfig::permissive_defaults()).unwrap();
        // No listener on this port: the SSRF check passes and the error comes from the dial.
        let err = client.get("http://127.0.0.1:1/").send().await.unwrap_err();
        assert!(!matches!(err, crate::error::NetfetchError::Url(crate::error::UrlError::BlockedIp(_))));
    }
}
