//! `DomainSession` (SPEC_FULL §3, §6): a persistent, per-origin layer over a shared `Client`.
//! Headers and cookies set during a successful call are remembered and replayed on later calls
//! to the same origin, the way a browser tab accumulates state across requests.

use parking_lot::Mutex;
use url::Url;

use crate::cache::entry_now_unix;
use crate::error::{NetfetchError, Result, UrlError};
use crate::pipeline::cookies::{Cookie, CookieJar};
use crate::pipeline::options::{Method, RequestOption, Response};
use crate::Client;
use std::sync::Arc;

fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    if let Some(existing) = pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
        existing.1 = value;
    } else {
        pairs.push((key, value));
    }
}

/// Per-origin session state layered on top of a (possibly shared) `Client`. Persistent headers
/// and cookies are guarded by their own mutex/jar, independent of whatever cookie jar the
/// underlying `Client` was configured with.
pub struct DomainSession {
    origin: Url,
    client: Arc<Client>,
    headers: Mutex<Vec<(String, String)>>,
    cookies: CookieJar,
}

impl DomainSession {
    pub fn new(origin: impl AsRef<str>, client: Arc<Client>) -> Result<Self> {
        let origin = Url::parse(origin.as_ref()).map_err(|e| NetfetchError::Url(UrlError::Malformed(e.to_string())))?;
        if origin.scheme() != "http" && origin.scheme() != "https" {
            return Err(NetfetchError::Url(UrlError::UnsupportedScheme(origin.scheme().to_string())));
        }
        Ok(DomainSession { origin, client, headers: Mutex::new(Vec::new()), cookies: CookieJar::new() })
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.origin.join(path).map_err(|e| NetfetchError::Url(UrlError::Malformed(e.to_string())))
    }

    /// Persistent headers currently remembered for this origin.
    pub fn persistent_headers(&self) -> Vec<(String, String)> {
        self.headers.lock().clone()
    }

    pub fn clear(&self) {
        self.headers.lock().clear();
        self.cookies.clear();
    }

    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        upsert(&mut self.headers.lock(), name.into(), value.into());
    }

    pub fn get_header(&self, name: &str) -> Option<String> {
        self.headers.lock().iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
    }

    pub fn delete_header(&self, name: &str) {
        self.headers.lock().retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn clear_headers(&self) {
        self.headers.lock().clear();
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.store(Cookie {
            name: name.into(),
            value: value.into(),
            domain: self.origin.host_str().unwrap_or("").to_string(),
            path: "/".to_string(),
            secure: false,
            expires_unix: None,
        });
    }

    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(self.origin.host_str().unwrap_or(""), name)
    }

    pub fn delete_cookie(&self, name: &str) {
        self.cookies.remove(self.origin.host_str().unwrap_or(""), name);
    }

    pub fn clear_cookies(&self) {
        self.cookies.clear();
    }

    pub async fn request(&self, method: Method, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        let url = self.resolve(path.as_ref())?;

        // Options that set a header are tracked up front so a successful response can persist
        // them afterward, independent of whatever else `options` also touched.
        let new_headers: Vec<(String, String)> =
            options.iter().filter_map(|o| match o { RequestOption::Header(k, v) => Some((k.clone(), v.clone())), _ => None }).collect();
        let new_cookies: Vec<(String, String)> =
            options.iter().filter_map(|o| match o { RequestOption::Cookie(k, v) => Some((k.clone(), v.clone())), _ => None }).collect();

        let mut full_options: Vec<RequestOption> =
            self.headers.lock().iter().cloned().map(|(k, v)| RequestOption::Header(k, v)).collect();

        let now = entry_now_unix() as i64;
        let is_secure = url.scheme() == "https";
        for (name, value) in self.cookies.matching(url.host_str().unwrap_or(""), url.path(), is_secure, now) {
            full_options.push(RequestOption::Cookie(name, value));
        }

        full_options.extend(options);

        let response = self.client.request(method, url.to_string(), full_options).await?;

        if response.status < 400 {
            if !new_headers.is_empty() {
                let mut persisted = self.headers.lock();
                for (k, v) in new_headers {
                    upsert(&mut persisted, k, v);
                }
            }
            // `Response::cookies` only carries name/value (SPEC_FULL §4.10's `collect_cookies`
            // doesn't preserve Set-Cookie attributes); persisted cookies default to
            // host-scoped, path "/", non-expiring, which is a safe approximation for replay.
            for (name, value) in &response.cookies {
                self.cookies.store(Cookie {
                    name: name.clone(),
                    value: value.clone(),
                    domain: url.host_str().unwrap_or("").to_string(),
                    path: "/".to_string(),
                    secure: false,
                    expires_unix: None,
                });
            }
            // Cookies the caller set explicitly via a request option (e.g. `with_cookie_value`)
            // are persisted the same way headers are, so the next call to this origin inherits
            // them even when the server never echoes a Set-Cookie back.
            for (name, value) in new_cookies {
                self.cookies.store(Cookie {
                    name,
                    value,
                    domain: url.host_str().unwrap_or("").to_string(),
                    path: "/".to_string(),
                    secure: false,
                    expires_unix: None,
                });
            }
        }

        Ok(response)
    }

    pub async fn get(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Get, path, options).await
    }

    pub async fn head(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Head, path, options).await
    }

    pub async fn post(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Post, path, options).await
    }

    pub async fn put(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Put, path, options).await
    }

    pub async fn patch(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Patch, path, options).await
    }

    pub async fn delete(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Delete, path, options).await
    }

    pub async fn options(&self, path: impl AsRef<str>, options: Vec<RequestOption>) -> Result<Response> {
        self.request(Method::Options, path, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn new_rejects_non_http_origin() {
        let client = Arc::new(Client::new(ClientConfig::secure_defaults()).unwrap());
        let err = DomainSession::new("ftp://example.com", client).unwrap_err();
        assert!(matches!(err, NetfetchError::Url(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn resolve_joins_relative_paths_against_origin() {
        let client = Arc::new(Client::new(ClientConfig::secure_defaults()).unwrap());
        let session = DomainSession::new("https://example.com/api/", client).unwrap();
        let url = session.resolve("widgets/1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/widgets/1");
    }

    #[test]
    fn clear_empties_persisted_headers_and_cookies() {
        let client = Arc::new(Client::new(ClientConfig::secure_defaults()).unwrap());
        let session = DomainSession::new("https://example.com", client).unwrap();
        session.headers.lock().push(("X-Test".into(), "1".into()));
        session.cookies.store(Cookie {
            name: "a".into(),
            value: "b".into(),
            domain: "example.com".into(),
            path: "/".into(),
            secure: false,
            expires_unix: None,
        });
        session.clear();
        assert!(session.persistent_headers().is_empty());
        assert!(session.cookies.is_empty());
    }
}
