//! Connection pool and transport (SPEC_FULL §4.5): a `hyper_util` legacy client built over a
//! custom SSRF-safe resolver and TLS profile, with connection-level tracking via
//! `TrackedConn` and a tracking wrapper `Service`.

mod proxy_connect;
mod resolver;
mod stats;
mod tls;
mod tracked;

pub use stats::HostStats;
pub use tracked::TrackedConn;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use http::Uri;
use http_body_util::combinators::BoxBody;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;
use tower_service::Service;

use crate::config::ClientConfig;
use crate::dns::DohResolver;
use crate::error::{NetfetchError, NetworkError, Result};
use proxy_connect::ProxyConnector;
use resolver::SsrfSafeResolver;

pub type ResponseBody = BoxBody<Bytes, hyper::Error>;

/// Snapshot of pool-wide counters, cheap to compute from atomics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolSnapshot {
    pub active: u64,
    pub total: u64,
    pub rejected: u64,
    pub max_total: u64,
}

impl PoolSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.total + self.rejected == 0 {
            1.0
        } else {
            self.total as f64 / (self.total + self.rejected) as f64
        }
    }

    pub fn is_healthy(&self) -> bool {
        let rate_ok = self.hit_rate() >= 0.9 || self.total <= 10;
        let headroom_ok = self.max_total == 0 || (self.active as f64) < 0.9 * self.max_total as f64;
        rate_ok && headroom_ok
    }
}

/// Wraps the inner connector's output in `TrackedConn`, deriving the target host from the
/// dialed `Uri` to update the right `HostStats` entry.
#[derive(Clone)]
struct TrackingConnector<S> {
    inner: S,
    host_stats: Arc<DashMap<String, Arc<HostStats>>>,
    pool_active: Arc<AtomicU64>,
    pool_total: Arc<AtomicU64>,
    pool_rejected: Arc<AtomicU64>,
}

impl<S> Service<Uri> for TrackingConnector<S>
where
    S: Service<Uri> + Send + Clone + 'static,
    S::Response: Connection + tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    type Response = TrackedConn<S::Response>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let host = uri.host().unwrap_or("").to_string();
        let host_stats_map = self.host_stats.clone();
        let pool_active = self.pool_active.clone();
        let pool_total = self.pool_total.clone();
        let pool_rejected = self.pool_rejected.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            pool_total.fetch_add(1, Ordering::Relaxed);
            let stats = host_stats_map.entry(host).or_insert_with(|| Arc::new(HostStats::default())).clone();
            stats.record_dial_start();
            let started = std::time::Instant::now();
            match inner.call(uri).await {
                Ok(conn) => {
                    stats.record_dial_succeeded(started.elapsed().as_millis() as u64);
                    Ok(TrackedConn::new(conn, stats, pool_active))
                }
                Err(e) => {
                    stats.record_dial_failed();
                    pool_rejected.fetch_add(1, Ordering::Relaxed);
                    Err(e.into())
                }
            }
        })
    }
}

type Connector = hyper_rustls::HttpsConnector<ProxyConnector<HttpConnector<SsrfSafeResolver>>>;

pub struct Pool {
    client: LegacyClient<TrackingConnector<Connector>, ResponseBody>,
    host_stats: Arc<DashMap<String, Arc<HostStats>>>,
    pool_active: Arc<AtomicU64>,
    pool_total: Arc<AtomicU64>,
    pool_rejected: Arc<AtomicU64>,
    max_total: u64,
}

impl Pool {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let doh: Option<Arc<DohResolver>> =
            if cfg.features.doh { Some(DohResolver::new(true, cfg.features.doh_cache_ttl)) } else { None };

        let resolver = SsrfSafeResolver::new(doh, cfg.security.allow_private_ips);
        let mut http = HttpConnector::new_with_resolver(resolver);
        http.enforce_http(false);
        http.set_connect_timeout(Some(cfg.timeouts.dial));
        http.set_keepalive(Some(cfg.timeouts.keep_alive));

        // Applies §4.4's proxy hook: per-dial, routes through an explicit/detected proxy
        // (CONNECT tunnel for https, absolute-form request line for http) instead of always
        // dialing the origin directly.
        let proxied = ProxyConnector::new(http, cfg.proxy_url.clone(), cfg.features.system_proxy);

        let tls_config = tls::build_client_config(&cfg.tls, cfg.custom_tls.clone())?;
        let builder = HttpsConnectorBuilder::new()
            .with_tls_config((*tls_config).clone())
            .https_or_http()
            .enable_http1();
        // `EnableHTTP2` gates both the config flag and whether ALPN offers h2 (SPEC_FULL §9,
        // open question 3): only advertise h2 in the TLS handshake when the feature is on.
        let https = if cfg.features.http2 { builder.enable_http2().wrap_connector(proxied) } else { builder.wrap_connector(proxied) };

        let host_stats = Arc::new(DashMap::new());
        let pool_active = Arc::new(AtomicU64::new(0));
        let pool_total = Arc::new(AtomicU64::new(0));
        let pool_rejected = Arc::new(AtomicU64::new(0));

        let tracking = TrackingConnector {
            inner: https,
            host_stats: host_stats.clone(),
            pool_active: pool_active.clone(),
            pool_total: pool_total.clone(),
            pool_rejected: pool_rejected.clone(),
        };

        let client = LegacyClient::builder(TokioExecutor::new())
            .pool_max_idle_per_host(cfg.pool.max_idle_per_host)
            .pool_idle_timeout(cfg.timeouts.idle)
            .build(tracking);

        Ok(Pool {
            client,
            host_stats,
            pool_active,
            pool_total,
            pool_rejected,
            max_total: cfg.pool.max_total_conns as u64,
        })
    }

    pub async fn send(
        &self,
        req: http::Request<ResponseBody>,
    ) -> Result<http::Response<hyper::body::Incoming>> {
        self.client.request(req).await.map_err(|e| NetfetchError::Network(NetworkError::Io(e.to_string())))
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            active: self.pool_active.load(Ordering::Relaxed),
            total: self.pool_total.load(Ordering::Relaxed),
            rejected: self.pool_rejected.load(Ordering::Relaxed),
            max_total: self.max_total,
        }
    }

    pub fn host_stats(&self, host: &str) -> Option<Arc<HostStats>> {
        self.host_stats.get(host).map(|e| e.clone())
    }
}
