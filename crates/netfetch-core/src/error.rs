//! Error taxonomy for netfetch-core.
//!
//! One top-level enum, one variant per kind from the design's error taxonomy.
//! Callers match on the kind; `Display` gives a one-line human message.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetfetchError>;

#[derive(Debug, Error)]
pub enum NetfetchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("url error: {0}")]
    Url(#[from] UrlError),

    #[error("dns error: {0}")]
    Dns(#[from] DnsError),

    #[error("tls error: {0}")]
    Tls(#[from] TlsError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("body error: {0}")]
    Body(#[from] BodyError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("concurrency error: {0}")]
    Concurrency(#[from] ConcurrencyError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl NetfetchError {
    /// True if a retry loop is permitted to attempt this error again.
    ///
    /// Validation, config, and SSRF-blocked URL errors are never retried: they describe
    /// a request the caller built wrong, not a transient condition.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetfetchError::Network(NetworkError::Timeout)
            | NetfetchError::Network(NetworkError::ConnectionReset)
            | NetfetchError::Network(NetworkError::Unreachable) => true,
            NetfetchError::Http(e) => e.is_retryable_status(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {kind}")]
    Failed { kind: ValidationKind, field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    TooShort,
    TooLong,
    IllegalCharacter,
    ControlCharacter,
    PseudoHeader,
    ReservedDelimiter,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationKind::TooShort => "too short",
            ValidationKind::TooLong => "too long",
            ValidationKind::IllegalCharacter => "illegal character",
            ValidationKind::ControlCharacter => "control character",
            ValidationKind::PseudoHeader => "pseudo-header name",
            ValidationKind::ReservedDelimiter => "reserved delimiter",
        };
        f.write_str(s)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationKind) -> Self {
        ValidationError::Failed { kind, field: field.into() }
    }
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("malformed url: {0}")]
    Malformed(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("blocked ip address: {0}")]
    BlockedIp(std::net::IpAddr),
    #[error("blocked host: {0}")]
    BlockedHost(String),
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("all DoH providers failed for {host}: {last_error}")]
    AllProvidersFailed { host: String, last_error: String },
    #[error("system resolver fallback failed for {host}: {source}")]
    SystemFallbackFailed { host: String, source: String },
    #[error("provider {provider} returned a malformed response: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("tls handshake failed: {0}")]
    Handshake(String),
    #[error("certificate verification failed: {0}")]
    Verify(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("timed out")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("connection reset")]
    ConnectionReset,
    #[error("host unreachable")]
    Unreachable,
    #[error("dial failed: {0}")]
    DialFailed(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
#[error("http {status} for {method} {url}: {status_text}")]
pub struct HttpError {
    pub status: u16,
    pub status_text: String,
    pub method: String,
    pub url: String,
}

impl HttpError {
    pub fn is_retryable_status(&self) -> bool {
        matches!(self.status, 429 | 502 | 503 | 504)
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("response body exceeded max size of {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported content-encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry too large for configured max size ({size} > {max_size})")]
    EntryTooLarge { size: usize, max_size: usize },
}

#[derive(Debug, Error)]
pub enum ConcurrencyError {
    #[error("concurrency manager is closed")]
    ManagerClosed,
    #[error("admission queue is full")]
    QueueFull,
    #[error("execution panicked: {value}")]
    ExecutionPanic { value: String },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("json parse failed: {0}")]
    Json(String),
    #[error("xml parse failed: {0}")]
    Xml(String),
}
