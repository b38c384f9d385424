//! DNS-over-HTTPS resolver (SPEC_FULL §4.3): ordered HTTPS providers, in-memory TTL cache,
//! system-resolver fallback.

mod json;
mod wire;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Empty};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;

use crate::error::{DnsError, NetfetchError, Result};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseFormat {
    Wire,
    Json,
}

#[derive(Debug, Clone)]
struct Provider {
    name: &'static str,
    url_template: &'static str,
    format: ResponseFormat,
}

const PROVIDERS: &[Provider] = &[
    Provider {
        name: "cloudflare",
        url_template: "https://1.1.1.1/dns-query?name={name}&type=A",
        format: ResponseFormat::Wire,
    },
    Provider {
        name: "google",
        url_template: "https://dns.google/resolve?name={name}&type=A",
        format: ResponseFormat::Json,
    },
    Provider {
        name: "alidns",
        url_template: "https://dns.alidns.com/resolve?name={name}&type=A",
        format: ResponseFormat::Json,
    },
];

struct CacheEntry {
    ips: Vec<IpAddr>,
    expires_at: Instant,
}

/// Bootstrap client used only to reach the DoH providers themselves. Resolves their hostnames
/// via the system resolver (`HttpConnector`'s default DNS) — it must never recurse into the
/// pool whose dialer this resolver ultimately feeds.
type BootstrapClient = LegacyClient<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, Empty<Bytes>>;

fn bootstrap_client() -> &'static BootstrapClient {
    static CLIENT: once_cell::sync::OnceCell<BootstrapClient> = once_cell::sync::OnceCell::new();
    CLIENT.get_or_init(|| {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_only()
            .enable_http1()
            .enable_http2()
            .build();
        LegacyClient::builder(TokioExecutor::new()).build(https)
    })
}

/// Resolves hostnames to IP addresses via DNS-over-HTTPS, with an in-memory TTL cache and a
/// system-resolver fallback when every provider fails.
pub struct DohResolver {
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
}

impl DohResolver {
    pub fn new(enabled: bool, ttl: Duration) -> Arc<Self> {
        Arc::new(DohResolver { cache: DashMap::new(), ttl, enabled })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Some(entry) = self.cache.get(host) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.ips.clone());
            }
        }

        let mut last_error: Option<String> = None;
        for provider in PROVIDERS {
            match query_provider(provider, host).await {
                Ok(ips) if !ips.is_empty() => {
                    self.cache.insert(
                        host.to_string(),
                        CacheEntry { ips: ips.clone(), expires_at: Instant::now() + self.ttl },
                    );
                    return Ok(ips);
                }
                Ok(_) => {
                    last_error = Some(format!("{}: empty answer", provider.name));
                }
                Err(e) => {
                    tracing::debug!(provider = provider.name, host, error = %e, "doh provider failed");
                    last_error = Some(format!("{}: {e}", provider.name));
                }
            }
        }

        match system_resolve(host).await {
            Ok(ips) => Ok(ips),
            Err(source) => Err(NetfetchError::Dns(DnsError::AllProvidersFailed {
                host: host.to_string(),
                last_error: last_error.unwrap_or_else(|| source.clone()),
            })),
        }
    }
}

async fn query_provider(provider: &Provider, host: &str) -> std::result::Result<Vec<IpAddr>, DnsError> {
    let url = provider.url_template.replace("{name}", host);
    let uri: hyper::Uri = url.parse().map_err(|e| DnsError::MalformedResponse {
        provider: provider.name.to_string(),
        reason: format!("bad provider url: {e}"),
    })?;

    let req = hyper::Request::builder()
        .method("GET")
        .uri(uri)
        .header("Accept", accept_header_for(provider.format))
        .body(Empty::<Bytes>::new())
        .map_err(|e| DnsError::MalformedResponse { provider: provider.name.to_string(), reason: e.to_string() })?;

    let resp = tokio::time::timeout(PROVIDER_TIMEOUT, bootstrap_client().request(req))
        .await
        .map_err(|_| DnsError::MalformedResponse { provider: provider.name.to_string(), reason: "timed out".into() })?
        .map_err(|e| DnsError::MalformedResponse { provider: provider.name.to_string(), reason: e.to_string() })?;

    let content_type = resp
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| DnsError::MalformedResponse { provider: provider.name.to_string(), reason: e.to_string() })?
        .to_bytes();

    let use_json = content_type.contains("application/dns-json") || content_type.contains("application/json");
    if use_json {
        json::parse(provider.name, &body)
    } else {
        wire::parse_answers(&body).map_err(|e| DnsError::MalformedResponse {
            provider: provider.name.to_string(),
            reason: e.to_string(),
        })
    }
}

fn accept_header_for(format: ResponseFormat) -> &'static str {
    match format {
        ResponseFormat::Wire => "application/dns-message",
        ResponseFormat::Json => "application/dns-json",
    }
}

async fn system_resolve(host: &str) -> std::result::Result<Vec<IpAddr>, String> {
    use tokio::net::lookup_host;
    // Port is irrelevant to resolution; 0 is a placeholder `lookup_host` requires.
    let addrs = lookup_host((host, 0)).await.map_err(|e| e.to_string())?;
    let ips: Vec<IpAddr> = addrs.map(|sa| sa.ip()).collect();
    if ips.is_empty() {
        Err("system resolver returned no addresses".to_string())
    } else {
        Ok(ips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_are_ordered_cloudflare_google_alidns() {
        assert_eq!(PROVIDERS[0].name, "cloudflare");
        assert_eq!(PROVIDERS[1].name, "google");
        assert_eq!(PROVIDERS[2].name, "alidns");
    }

    #[test]
    fn cloudflare_uses_wire_format_others_use_json() {
        assert_eq!(PROVIDERS[0].format, ResponseFormat::Wire);
        assert_eq!(PROVIDERS[1].format, ResponseFormat::Json);
        assert_eq!(PROVIDERS[2].format, ResponseFormat::Json);
    }

    #[tokio::test]
    async fn cache_returns_unexpired_entry_without_network() {
        let resolver = DohResolver::new(true, Duration::from_secs(300));
        resolver.cache.insert(
            "cached.example".to_string(),
            CacheEntry { ips: vec!["9.9.9.9".parse().unwrap()], expires_at: Instant::now() + Duration::from_secs(60) },
        );
        let ips = resolver.lookup("cached.example").await.unwrap();
        assert_eq!(ips, vec!["9.9.9.9".parse::<IpAddr>().unwrap()]);
    }
}
