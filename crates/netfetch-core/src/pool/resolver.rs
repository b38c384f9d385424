//! Custom DNS resolver plugged into `hyper_util`'s `HttpConnector` (SPEC_FULL §4.5's
//! "dialer"): SSRF-checks and, if configured, DoH-resolves a host before handing addresses
//! back to the connector, which then owns the actual TCP dial and TLS handshake.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::client::legacy::connect::dns::Name;

use crate::dns::DohResolver;
use crate::error::{NetfetchError, Result, UrlError};
use crate::net_util::validate_ip;

#[derive(Clone)]
pub struct SsrfSafeResolver {
    doh: Option<Arc<DohResolver>>,
    allow_private_ips: bool,
}

impl SsrfSafeResolver {
    pub fn new(doh: Option<Arc<DohResolver>>, allow_private_ips: bool) -> Self {
        SsrfSafeResolver { doh, allow_private_ips }
    }

    async fn resolve_name(self, name: Name) -> Result<Vec<SocketAddr>> {
        let host = name.as_str();

        let ips = if let Ok(literal) = host.parse::<std::net::IpAddr>() {
            vec![literal]
        } else if let Some(doh) = &self.doh {
            doh.lookup(host).await?
        } else {
            let addrs = tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| NetfetchError::Network(crate::error::NetworkError::Io(e.to_string())))?;
            addrs.map(|sa| sa.ip()).collect()
        };

        if ips.is_empty() {
            return Err(NetfetchError::Url(UrlError::BlockedHost(format!("could not resolve {host}"))));
        }

        if !self.allow_private_ips {
            for ip in &ips {
                validate_ip(*ip)?;
            }
        }

        // Port 0: the connector replaces it with the URI's actual port before dialing.
        Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)).collect())
    }
}

pub struct SocketAddrs {
    iter: std::vec::IntoIter<SocketAddr>,
}

impl Iterator for SocketAddrs {
    type Item = SocketAddr;
    fn next(&mut self) -> Option<SocketAddr> {
        self.iter.next()
    }
}

type ResolveFuture = Pin<Box<dyn Future<Output = std::result::Result<SocketAddrs, NetfetchError>> + Send>>;

impl hyper_util::client::legacy::connect::dns::Resolve for SsrfSafeResolver {
    type Addrs = SocketAddrs;
    type Error = NetfetchError;
    type Future = ResolveFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn resolve(&mut self, name: Name) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let addrs = this.resolve_name(name).await?;
            Ok(SocketAddrs { iter: addrs.into_iter() })
        })
    }
}
