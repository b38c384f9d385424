//! `RequestSpec` and the per-call options that build it up (SPEC_FULL §3, §4.10).

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Idempotent by HTTP semantics (SPEC_FULL §4.10's retry rule).
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options | Method::Put | Method::Delete)
    }

    pub fn as_http(&self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
            Method::Options => http::Method::OPTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub field: String,
    pub filename: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Exactly one body variant is ever present on a `RequestSpec` (SPEC_FULL §3 invariant).
#[derive(Debug, Clone, Default)]
pub enum BodyVariant {
    #[default]
    None,
    Json(serde_json::Value),
    Xml(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
    Binary(Bytes, Option<String>),
    Multipart { fields: Vec<(String, String)>, files: Vec<MultipartFile> },
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// A unit of mutation applied to a `RequestSpec` before it enters the pipeline.
/// Conflicts resolve last-writer-wins: options apply in the order given. `File` and
/// `FormField` are the exception — each accumulates into the spec's multipart body rather
/// than replacing it, so repeated `with_file`/`with_form_data` calls build up one request
/// the way repeated form fields do in a browser multipart submission.
pub enum RequestOption {
    Header(String, String),
    /// `with_header_map`: applies every pair as an individual header option, in order.
    HeaderMap(Vec<(String, String)>),
    Query(String, String),
    /// `with_query_map`: applies every pair as an individual query option, in order.
    QueryMap(Vec<(String, String)>),
    Json(serde_json::Value),
    /// `with_xml`: serialized the same way `json` is, via the hand-rolled struct-field-to-tag
    /// encoder in `pipeline::body` (SPEC_FULL §4.10).
    Xml(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
    Binary(Bytes, Option<String>),
    Multipart { fields: Vec<(String, String)>, files: Vec<MultipartFile> },
    /// `with_file`: adds one file to the request's multipart body, creating it if absent.
    File(MultipartFile),
    /// `with_form_data`: adds one field to the request's multipart body, creating it if absent.
    FormField(String, String),
    Raw(Bytes),
    Timeout(Duration),
    MaxRetries(u32),
    Cancel(CancellationToken),
    BasicAuth { username: String, password: String },
    BearerAuth(String),
    Accept(String),
    Cookie(String, String),
    /// `with_cookies`: applies every pair as an individual cookie option, in order.
    CookieMap(Vec<(String, String)>),
    /// `with_cookie_string`: parses a `"name=value; name2=value2"` `Cookie` header string.
    CookieString(String),
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: BodyVariant,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub cancel: CancellationToken,
    pub cookies: Vec<(String, String)>,
    pub auth: Auth,
    pub accept: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        RequestSpec {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: BodyVariant::None,
            timeout: None,
            max_retries: None,
            cancel: CancellationToken::new(),
            cookies: Vec::new(),
            auth: Auth::None,
            accept: None,
        }
    }

    /// Applies every option in order, validating each value as it is written. The last option
    /// to touch a given field wins.
    pub fn apply(&mut self, options: Vec<RequestOption>) -> Result<()> {
        for opt in options {
            self.apply_one(opt)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, opt: RequestOption) -> Result<()> {
        match opt {
            RequestOption::Header(k, v) => {
                validation::validate_header_name(&k)?;
                validation::validate_header_value(&v)?;
                upsert(&mut self.headers, k, v);
            }
            RequestOption::HeaderMap(pairs) => {
                for (k, v) in pairs {
                    self.apply_one(RequestOption::Header(k, v))?;
                }
            }
            RequestOption::Query(k, v) => {
                validation::validate_query_key(&k)?;
                upsert(&mut self.query, k, v);
            }
            RequestOption::QueryMap(pairs) => {
                for (k, v) in pairs {
                    self.apply_one(RequestOption::Query(k, v))?;
                }
            }
            RequestOption::Json(v) => self.body = BodyVariant::Json(v),
            RequestOption::Xml(v) => self.body = BodyVariant::Xml(v),
            RequestOption::Form(m) => self.body = BodyVariant::Form(m),
            RequestOption::Text(s) => self.body = BodyVariant::Text(s),
            RequestOption::Binary(b, ct) => self.body = BodyVariant::Binary(b, ct),
            RequestOption::Multipart { fields, files } => {
                for f in &files {
                    validation::validate_form_field(&f.field)?;
                    validation::validate_filename(&f.filename)?;
                }
                for (k, _) in &fields {
                    validation::validate_form_field(k)?;
                }
                self.body = BodyVariant::Multipart { fields, files };
            }
            RequestOption::File(file) => {
                validation::validate_form_field(&file.field)?;
                validation::validate_filename(&file.filename)?;
                match &mut self.body {
                    BodyVariant::Multipart { files, .. } => files.push(file),
                    _ => self.body = BodyVariant::Multipart { fields: Vec::new(), files: vec![file] },
                }
            }
            RequestOption::FormField(k, v) => {
                validation::validate_form_field(&k)?;
                match &mut self.body {
                    BodyVariant::Multipart { fields, .. } => fields.push((k, v)),
                    _ => self.body = BodyVariant::Multipart { fields: vec![(k, v)], files: Vec::new() },
                }
            }
            RequestOption::Raw(b) => self.body = BodyVariant::Raw(b),
            RequestOption::Timeout(d) => self.timeout = Some(d),
            RequestOption::MaxRetries(n) => self.max_retries = Some(n),
            RequestOption::Cancel(token) => self.cancel = token,
            RequestOption::BasicAuth { username, password } => {
                validation::validate_credential_username(&username)?;
                validation::validate_credential_password(&password)?;
                self.auth = Auth::Basic { username, password };
            }
            RequestOption::BearerAuth(token) => {
                validation::validate_bearer_token(&token)?;
                self.auth = Auth::Bearer { token };
            }
            RequestOption::Accept(a) => self.accept = Some(a),
            RequestOption::Cookie(name, value) => {
                validation::validate_cookie_name(&name)?;
                validation::validate_cookie_value(&value)?;
                upsert(&mut self.cookies, name, value);
            }
            RequestOption::CookieMap(pairs) => {
                for (k, v) in pairs {
                    self.apply_one(RequestOption::Cookie(k, v))?;
                }
            }
            RequestOption::CookieString(raw) => {
                for part in raw.split(';') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    if let Some((name, value)) = part.split_once('=') {
                        self.apply_one(RequestOption::Cookie(name.trim().to_string(), value.trim().to_string()))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    if let Some(existing) = pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
        existing.1 = value;
    } else {
        pairs.push((key, value));
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub duration: Duration,
    pub attempts: u32,
    pub redirects: u32,
    /// `true` if this response was served from the response cache without hitting the network.
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub cookies: HashMap<String, String>,
    pub meta: ResponseMeta,
}

impl Response {
    /// Case-insensitive header lookup; original request/response casing is preserved in
    /// `headers` for callers that need it verbatim.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| crate::error::NetfetchError::Parse(crate::error::ParseError::Json(e.to_string())))
    }

    /// `Err` for 4xx/5xx statuses, carrying the method/url that produced them.
    pub fn error_for_status(&self, method: &str, url: &str) -> Result<()> {
        if self.status >= 400 {
            Err(crate::error::NetfetchError::Http(crate::error::HttpError {
                status: self.status,
                status_text: self.status_text.clone(),
                method: method.to_string(),
                url: url.to_string(),
            }))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_option_rejects_pseudo_header_names() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        let err = spec.apply(vec![RequestOption::Header(":authority".into(), "x".into())]);
        assert!(err.is_err());
    }

    #[test]
    fn later_header_option_overrides_earlier_one() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![
            RequestOption::Header("X-Id".into(), "first".into()),
            RequestOption::Header("x-id".into(), "second".into()),
        ])
        .unwrap();
        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.headers[0].1, "second");
    }

    #[test]
    fn idempotent_methods_match_http_semantics() {
        assert!(Method::Get.is_idempotent());
        assert!(Method::Put.is_idempotent());
        assert!(!Method::Post.is_idempotent());
        assert!(!Method::Patch.is_idempotent());
    }

    #[test]
    fn response_header_lookup_is_case_insensitive() {
        let resp = Response {
            status: 200,
            status_text: "OK".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Bytes::new(),
            cookies: HashMap::new(),
            meta: ResponseMeta::default(),
        };
        assert_eq!(resp.header("content-type"), Some("application/json"));
    }

    #[test]
    fn header_map_applies_every_pair_in_order() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![RequestOption::HeaderMap(vec![
            ("X-A".into(), "1".into()),
            ("X-B".into(), "2".into()),
        ])])
        .unwrap();
        assert_eq!(spec.headers, vec![("X-A".to_string(), "1".to_string()), ("X-B".to_string(), "2".to_string())]);
    }

    #[test]
    fn query_map_applies_every_pair_in_order() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![RequestOption::QueryMap(vec![("a".into(), "1".into()), ("b".into(), "2".into())])]).unwrap();
        assert_eq!(spec.query, vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn file_and_form_field_accumulate_into_one_multipart_body() {
        let mut spec = RequestSpec::new(Method::Post, "https://example.com");
        spec.apply(vec![
            RequestOption::FormField("name".into(), "ada".into()),
            RequestOption::File(MultipartFile {
                field: "avatar".into(),
                filename: "a.png".into(),
                bytes: Bytes::from_static(b"\x89PNG"),
                content_type: Some("image/png".into()),
            }),
            RequestOption::FormField("role".into(), "admin".into()),
        ])
        .unwrap();
        match spec.body {
            BodyVariant::Multipart { fields, files } => {
                assert_eq!(fields, vec![("name".to_string(), "ada".to_string()), ("role".to_string(), "admin".to_string())]);
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].filename, "a.png");
            }
            other => panic!("expected Multipart body, got {other:?}"),
        }
    }

    #[test]
    fn cookie_map_applies_every_pair_in_order() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![RequestOption::CookieMap(vec![("s".into(), "1".into()), ("u".into(), "2".into())])]).unwrap();
        assert_eq!(spec.cookies, vec![("s".to_string(), "1".to_string()), ("u".to_string(), "2".to_string())]);
    }

    #[test]
    fn cookie_string_parses_semicolon_separated_pairs() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![RequestOption::CookieString("s=1; u=2 ; empty=".into())]).unwrap();
        assert_eq!(
            spec.cookies,
            vec![("s".to_string(), "1".to_string()), ("u".to_string(), "2".to_string()), ("empty".to_string(), "".to_string())]
        );
    }

    #[test]
    fn cookie_string_ignores_blank_segments() {
        let mut spec = RequestSpec::new(Method::Get, "https://example.com");
        spec.apply(vec![RequestOption::CookieString("s=1;; ;u=2".into())]).unwrap();
        assert_eq!(spec.cookies, vec![("s".to_string(), "1".to_string()), ("u".to_string(), "2".to_string())]);
    }
}
