//! `ClientConfig`: the single immutable configuration snapshot a `Client` is built from.
//!
//! There is no config file format here — this is a library, not an application; embedders
//! own how they load their own settings and hand us a `ClientConfig`. What we do own is
//! validating it before it's allowed to build a `Client`.

use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Minimum and maximum negotiated TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
    /// HTTP statuses that trigger a retry on idempotent methods.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: true,
            retryable_statuses: vec![429, 502, 503, 504],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_idle_total: usize,
    pub max_idle_per_host: usize,
    pub max_conns_per_host: usize,
    pub max_total_conns: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_idle_total: 100,
            max_idle_per_host: 10,
            max_conns_per_host: 32,
            max_total_conns: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub dial: Duration,
    pub tls_handshake: Duration,
    pub response_header: Duration,
    pub keep_alive: Duration,
    pub idle: Duration,
    pub expect_continue: Duration,
    pub overall: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            dial: Duration::from_secs(10),
            tls_handshake: Duration::from_secs(10),
            response_header: Duration::from_secs(15),
            keep_alive: Duration::from_secs(30),
            idle: Duration::from_secs(90),
            expect_continue: Duration::from_secs(1),
            overall: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// When `false`, the dialer refuses to connect to loopback/private/reserved IPs (§4.2).
    pub allow_private_ips: bool,
    pub max_response_body: usize,
    pub validate_urls: bool,
    pub validate_headers: bool,
    pub max_concurrent_requests: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            allow_private_ips: false,
            max_response_body: 32 * 1024 * 1024,
            validate_urls: true,
            validate_headers: true,
            max_concurrent_requests: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub http2: bool,
    pub cookies: bool,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub system_proxy: bool,
    pub doh: bool,
    pub doh_cache_ttl: Duration,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            http2: true,
            cookies: true,
            follow_redirects: true,
            max_redirects: 10,
            system_proxy: true,
            doh: false,
            doh_cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size_bytes: usize,
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { enabled: false, max_size_bytes: 64 * 1024 * 1024, default_ttl_secs: 300 }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per fixed 1-second window.
    pub requests_per_second: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig { enabled: false, requests_per_second: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    pub insecure_skip_verify: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        TlsConfig { min_version: TlsVersion::Tls12, max_version: TlsVersion::Tls13, insecure_skip_verify: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub timeouts: TimeoutConfig,
    pub pool: PoolConfig,
    pub tls: TlsConfig,
    pub features: FeatureConfig,
    pub retry: RetryConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub proxy_url: Option<String>,
    pub default_headers: Vec<(String, String)>,
    pub user_agent: String,
    /// Caller-provided `rustls::ClientConfig`; when set, overrides `tls` entirely.
    pub custom_tls: Option<std::sync::Arc<rustls::ClientConfig>>,
}

impl ClientConfig {
    /// Production-safe defaults: private/reserved IPs are blocked (resolves the Open Question
    /// in SPEC_FULL §9 in favor of safety over convenience).
    pub fn secure_defaults() -> Self {
        let mut cfg = ClientConfig { user_agent: default_user_agent(), ..Default::default() };
        cfg.security.allow_private_ips = false;
        cfg
    }

    /// Development/testing preset: allows dialing loopback and private networks, matching the
    /// corpus convention of a permissive local preset distinct from the production one.
    pub fn permissive_defaults() -> Self {
        let mut cfg = Self::secure_defaults();
        cfg.security.allow_private_ips = true;
        cfg
    }

    /// Normalize and reject illegal values. Called once, from `Client::new`.
    pub fn validate(&self) -> Result<()> {
        if self.tls.min_version > self.tls.max_version {
            return Err(ConfigError::Invalid {
                field: "tls.min_version",
                reason: "min_version must be <= max_version".into(),
            }
            .into());
        }
        if self.security.max_response_body == 0 {
            return Err(ConfigError::Invalid {
                field: "security.max_response_body",
                reason: "must be > 0".into(),
            }
            .into());
        }
        if self.security.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "security.max_concurrent_requests",
                reason: "must be > 0".into(),
            }
            .into());
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_factor",
                reason: "must be >= 1.0".into(),
            }
            .into());
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second <= 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.requests_per_second",
                reason: "must be > 0 when rate limiting is enabled".into(),
            }
            .into());
        }
        if self.cache.enabled && self.cache.max_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.max_size_bytes",
                reason: "must be > 0 when caching is enabled".into(),
            }
            .into());
        }
        if let Some(url) = &self.proxy_url {
            url::Url::parse(url).map_err(|e| ConfigError::Invalid {
                field: "proxy_url",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn default_user_agent() -> String {
    format!("netfetch/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_defaults_blocks_private_ips() {
        assert!(!ClientConfig::secure_defaults().security.allow_private_ips);
    }

    #[test]
    fn permissive_defaults_allows_private_ips() {
        assert!(ClientConfig::permissive_defaults().security.allow_private_ips);
    }

    #[test]
    fn rejects_inverted_tls_range() {
        let mut cfg = ClientConfig::secure_defaults();
        cfg.tls.min_version = TlsVersion::Tls13;
        cfg.tls.max_version = TlsVersion::Tls12;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_body() {
        let mut cfg = ClientConfig::secure_defaults();
        cfg.security.max_response_body = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_proxy_url() {
        let mut cfg = ClientConfig::secure_defaults();
        cfg.proxy_url = Some("not a url".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_user_agent_contains_crate_name() {
        assert!(ClientConfig::secure_defaults().user_agent.starts_with("netfetch/"));
    }
}
