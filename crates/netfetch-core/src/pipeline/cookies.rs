//! Cookie jar (SPEC_FULL §3, §4.10): per-origin storage with RFC 6265-style domain/path
//! matching, guarded by a single `parking_lot::Mutex` the way domain-session state is
//! (SPEC_FULL §5's "Cookie jar ... guarded by a per-instance `parking_lot::Mutex`").

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub expires_unix: Option<i64>,
}

impl Cookie {
    fn matches(&self, host: &str, path: &str, is_secure: bool) -> bool {
        if self.secure && !is_secure {
            return false;
        }
        if !domain_matches(&self.domain, host) {
            return false;
        }
        path_matches(&self.path, path)
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires_unix.is_some_and(|e| e <= now)
    }
}

fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == cookie_domain || host.ends_with(&format!(".{cookie_domain}"))
}

fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if request_path.starts_with(cookie_path) {
        return cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/');
    }
    false
}

/// Parses one `Set-Cookie` header value. Unknown attributes are ignored; `Max-Age` takes
/// priority over `Expires` when both are present, per RFC 6265 §5.3.
pub fn parse_set_cookie(header: &str, default_domain: &str, default_path: &str, now_unix: i64) -> Option<Cookie> {
    let mut parts = header.split(';').map(str::trim);
    let name_value = parts.next()?;
    let (name, value) = name_value.split_once('=')?;
    let (name, value) = (name.trim().to_string(), value.trim().to_string());
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name,
        value,
        domain: default_domain.to_string(),
        path: default_path.to_string(),
        secure: false,
        expires_unix: None,
    };

    for attr in parts {
        let mut kv = attr.splitn(2, '=');
        let key = kv.next().unwrap_or("").trim().to_ascii_lowercase();
        let val = kv.next().map(str::trim);
        match key.as_str() {
            "domain" => {
                if let Some(v) = val {
                    if !v.is_empty() {
                        cookie.domain = v.to_string();
                    }
                }
            }
            "path" => {
                if let Some(v) = val {
                    if !v.is_empty() {
                        cookie.path = v.to_string();
                    }
                }
            }
            "secure" => cookie.secure = true,
            "max-age" => {
                if let Some(v) = val.and_then(|v| v.parse::<i64>().ok()) {
                    cookie.expires_unix = Some(now_unix + v);
                }
            }
            _ => {}
        }
    }

    Some(cookie)
}

#[derive(Default)]
pub struct CookieJar {
    // Keyed by (domain, name, path) so the same name can exist under different scopes.
    inner: Mutex<HashMap<(String, String, String), Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    pub fn store(&self, cookie: Cookie) {
        let key = (cookie.domain.to_ascii_lowercase(), cookie.name.clone(), cookie.path.clone());
        self.inner.lock().insert(key, cookie);
    }

    /// Cookies applicable to a request against `host`/`path`, skipping expired or
    /// scope-mismatched entries. Insecure requests never receive `Secure` cookies.
    pub fn matching(&self, host: &str, path: &str, is_secure: bool, now_unix: i64) -> Vec<(String, String)> {
        self.inner
            .lock()
            .values()
            .filter(|c| !c.is_expired(now_unix) && c.matches(host, path, is_secure))
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }

    pub fn sweep_expired(&self, now_unix: i64) {
        self.inner.lock().retain(|_, c| !c.is_expired(now_unix));
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Value of the first cookie stored under `domain` with this `name`, regardless of path.
    pub fn get(&self, domain: &str, name: &str) -> Option<String> {
        let domain = domain.to_ascii_lowercase();
        self.inner.lock().iter().find(|((d, n, _), _)| *d == domain && n == name).map(|(_, c)| c.value.clone())
    }

    /// Removes every cookie stored under `domain` with this `name`, across all paths.
    pub fn remove(&self, domain: &str, name: &str) {
        let domain = domain.to_ascii_lowercase();
        self.inner.lock().retain(|(d, n, _), _| !(*d == domain && n == name));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
