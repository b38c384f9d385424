//! Cache entry type and fingerprint key derivation (SPEC_FULL §4.7).

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// A cached response: immutable body/headers plus mutable LRU/TTL bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub body: bytes::Bytes,
    pub headers: Vec<(String, String)>,
    pub status: u16,
    pub created_at: u64,
    pub expires_at: u64,
    pub accessed_at: u64,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn size(&self) -> usize {
        self.body.len() + self.headers.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at > 0 && self.expires_at < now
    }
}

/// `sha256(method | url | fold over selected headers {k | v})`, rendered as 64 lowercase hex
/// chars. `vary_headers` should be given in the order the caller wants them folded in; callers
/// are responsible for a stable, canonical ordering (e.g. the request's declared vary set).
pub fn fingerprint(method: &str, url: &str, vary_headers: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    for (k, v) in vary_headers {
        hasher.update(b"|");
        hasher.update(k.as_bytes());
        hasher.update(b"|");
        hasher.update(v.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_64_hex_chars() {
        let a = fingerprint("GET", "https://example.com/", &[]);
        let b = fingerprint("GET", "https://example.com/", &[]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_differs_by_method_url_and_vary_headers() {
        let base = fingerprint("GET", "https://example.com/", &[]);
        assert_ne!(base, fingerprint("POST", "https://example.com/", &[]));
        assert_ne!(base, fingerprint("GET", "https://example.org/", &[]));
        assert_ne!(base, fingerprint("GET", "https://example.com/", &[("Accept", "json")]));
    }

    #[test]
    fn is_expired_respects_zero_as_never() {
        let mut entry = CacheEntry {
            key: "k".into(),
            body: bytes::Bytes::new(),
            headers: vec![],
            status: 200,
            created_at: 0,
            expires_at: 0,
            accessed_at: 0,
            hit_count: 0,
        };
        assert!(!entry.is_expired(1_000_000));
        entry.expires_at = 10;
        assert!(entry.is_expired(20));
        assert!(!entry.is_expired(5));
    }
}
