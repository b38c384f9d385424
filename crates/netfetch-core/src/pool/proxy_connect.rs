//! Proxy-aware connector (SPEC_FULL §4.5's "applied proxy hook", fed by §4.4's detector):
//! consults [`crate::proxy::resolve`] per dialed `Uri` and, when a proxy applies, dials the
//! proxy instead of the origin. HTTPS targets get a `CONNECT` tunnel so TLS still terminates at
//! the origin; plain HTTP targets are marked as proxied so the request line goes out in
//! absolute form and the proxy can read the destination itself.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tower_service::Service;

use crate::proxy::{self, ProxyDecision};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
pub struct ProxyConnector<C> {
    inner: C,
    proxy_url: Option<String>,
    system_proxy_enabled: bool,
}

impl<C> ProxyConnector<C> {
    pub fn new(inner: C, proxy_url: Option<String>, system_proxy_enabled: bool) -> Self {
        ProxyConnector { inner, proxy_url, system_proxy_enabled }
    }
}

/// What the inner dial actually produced: a connection straight to the origin, a connection to
/// a proxy that must see an absolute-form request line, or a `CONNECT`-tunneled stream that
/// behaves like a direct connection to the origin from here on (TLS, if any, layers on top).
pub enum ProxyStream<T> {
    Direct(T),
    Proxied(T),
    Tunneled(T),
}

impl<T: AsyncRead + Unpin> AsyncRead for ProxyStream<T> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProxyStream::Direct(s) | ProxyStream::Proxied(s) | ProxyStream::Tunneled(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for ProxyStream<T> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            ProxyStream::Direct(s) | ProxyStream::Proxied(s) | ProxyStream::Tunneled(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProxyStream::Direct(s) | ProxyStream::Proxied(s) | ProxyStream::Tunneled(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProxyStream::Direct(s) | ProxyStream::Proxied(s) | ProxyStream::Tunneled(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

impl<T: Connection> Connection for ProxyStream<T> {
    fn connected(&self) -> Connected {
        match self {
            ProxyStream::Direct(s) | ProxyStream::Tunneled(s) => s.connected(),
            // Untunneled proxy connection: the request line must be absolute-form, which is
            // exactly what marking the connection "proxied" tells hyper's client to do.
            ProxyStream::Proxied(s) => s.connected().proxy(true),
        }
    }
}

impl<C> Service<Uri> for ProxyConnector<C>
where
    C: Service<Uri> + Clone + Send + 'static,
    C::Response: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError> + Send,
{
    type Response = ProxyStream<C::Response>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let mut inner = self.inner.clone();
        let proxy_url = self.proxy_url.clone();
        let system_proxy_enabled = self.system_proxy_enabled;

        Box::pin(async move {
            let target = url::Url::parse(&uri.to_string()).map_err(|e| -> BoxError { format!("invalid dial target {uri}: {e}").into() })?;
            let decision = proxy::resolve(&target, proxy_url.as_deref(), system_proxy_enabled);

            match decision {
                ProxyDecision::Direct => {
                    let stream = inner.call(uri).await.map_err(Into::into)?;
                    Ok(ProxyStream::Direct(stream))
                }
                ProxyDecision::Use(proxy) => {
                    let proxy_uri: Uri =
                        proxy.parse().map_err(|e: http::uri::InvalidUri| -> BoxError { format!("invalid proxy url {proxy}: {e}").into() })?;
                    let mut stream = inner.call(proxy_uri).await.map_err(Into::into)?;

                    if uri.scheme_str() == Some("https") {
                        let host = uri.host().unwrap_or_default();
                        let port = uri.port_u16().unwrap_or(443);
                        connect_tunnel(&mut stream, host, port).await?;
                        Ok(ProxyStream::Tunneled(stream))
                    } else {
                        Ok(ProxyStream::Proxied(stream))
                    }
                }
            }
        })
    }
}

/// Issues an HTTP `CONNECT` request over `stream` and reads the proxy's response headers,
/// failing unless the status line is 2xx. `stream` is left positioned right after the blank
/// line that ends the response headers, ready for TLS (or plain bytes) to the tunneled origin.
async fn connect_tunnel<T: AsyncRead + AsyncWrite + Unpin>(stream: &mut T, host: &str, port: u16) -> std::result::Result<(), BoxError> {
    let authority = format!("{host}:{port}");
    let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err("proxy closed the connection during the CONNECT handshake".into());
        }
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
        if head.len() > 8192 {
            return Err("proxy CONNECT response headers exceeded 8 KiB".into());
        }
    }

    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or("");
    let status: u16 = status_line.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    if !(200..300).contains(&status) {
        return Err(format!("proxy CONNECT to {authority} failed: {status_line}").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn connect_tunnel_succeeds_on_200_response() {
        let (mut client, mut server) = duplex(256);
        let handshake = tokio::spawn(async move { connect_tunnel(&mut client, "example.com", 443).await });

        let mut request = [0u8; 256];
        let n = server.read(&mut request).await.unwrap();
        let request = String::from_utf8_lossy(&request[..n]);
        assert!(request.starts_with("CONNECT example.com:443 HTTP/1.1\r\n"));

        server.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await.unwrap();
        handshake.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn connect_tunnel_fails_on_non_2xx_response() {
        let (mut client, mut server) = duplex(256);
        let handshake = tokio::spawn(async move { connect_tunnel(&mut client, "example.com", 443).await });

        let mut request = [0u8; 256];
        server.read(&mut request).await.unwrap();
        server.write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n").await.unwrap();

        let result = handshake.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connect_tunnel_fails_when_proxy_closes_before_headers_complete() {
        let (mut client, server) = duplex(256);
        let handshake = tokio::spawn(async move { connect_tunnel(&mut client, "example.com", 443).await });
        drop(server);
        let result = handshake.await.unwrap();
        assert!(result.is_err());
    }
}
