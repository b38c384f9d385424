//! `RequestBuilder` (SPEC_FULL §1's supplemented ergonomics): the chained-method sibling of the
//! functional-options `Client::request`. `Client::get(url)` and friends return one of these;
//! `.send()` applies every chained option and runs it through the same pipeline `Client::request`
//! does.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::Result;
use crate::pipeline::options::{Method, MultipartFile, RequestOption, Response};

use std::time::Duration;

pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: Method,
    url: String,
    options: Vec<RequestOption>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(client: &'a Client, method: Method, url: impl Into<String>) -> Self {
        RequestBuilder { client, method, url: url.into(), options: Vec::new() }
    }

    fn push(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(RequestOption::Header(name.into(), value.into()))
    }

    pub fn header_map(self, pairs: Vec<(String, String)>) -> Self {
        self.push(RequestOption::HeaderMap(pairs))
    }

    pub fn user_agent(self, value: impl Into<String>) -> Self {
        self.header("User-Agent", value)
    }

    pub fn content_type(self, value: impl Into<String>) -> Self {
        self.header("Content-Type", value)
    }

    pub fn json_accept(self) -> Self {
        self.accept("application/json")
    }

    pub fn xml_accept(self) -> Self {
        self.accept("application/xml")
    }

    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(RequestOption::Query(key.into(), value.into()))
    }

    pub fn query_map(self, pairs: Vec<(String, String)>) -> Self {
        self.push(RequestOption::QueryMap(pairs))
    }

    pub fn json(self, value: serde_json::Value) -> Self {
        self.push(RequestOption::Json(value))
    }

    pub fn xml(self, value: serde_json::Value) -> Self {
        self.push(RequestOption::Xml(value))
    }

    pub fn form(self, pairs: Vec<(String, String)>) -> Self {
        self.push(RequestOption::Form(pairs))
    }

    pub fn text(self, body: impl Into<String>) -> Self {
        self.push(RequestOption::Text(body.into()))
    }

    pub fn binary(self, bytes: Bytes, content_type: Option<String>) -> Self {
        self.push(RequestOption::Binary(bytes, content_type))
    }

    pub fn multipart(self, fields: Vec<(String, String)>, files: Vec<MultipartFile>) -> Self {
        self.push(RequestOption::Multipart { fields, files })
    }

    /// `with_file`: adds one file part to the request's (possibly already-started) multipart
    /// body. Repeated calls accumulate rather than overwrite, unlike most options.
    pub fn file(self, field: impl Into<String>, filename: impl Into<String>, bytes: Bytes, content_type: Option<String>) -> Self {
        self.push(RequestOption::File(MultipartFile { field: field.into(), filename: filename.into(), bytes, content_type }))
    }

    /// `with_form_data`: adds one field to the request's (possibly already-started) multipart
    /// body. Repeated calls accumulate rather than overwrite, unlike most options.
    pub fn form_data(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(RequestOption::FormField(field.into(), value.into()))
    }

    /// `with_body`: sends `bytes` as-is, same as `raw` — the caller is expected to set its
    /// own `Content-Type` via `content_type`/`header`.
    pub fn body(self, bytes: Bytes) -> Self {
        self.raw(bytes)
    }

    pub fn raw(self, bytes: Bytes) -> Self {
        self.push(RequestOption::Raw(bytes))
    }

    pub fn timeout(self, duration: Duration) -> Self {
        self.push(RequestOption::Timeout(duration))
    }

    pub fn max_retries(self, n: u32) -> Self {
        self.push(RequestOption::MaxRetries(n))
    }

    /// `with_context`: supplies the cancellation token this request observes at every
    /// suspension point (SPEC_FULL §5).
    pub fn context(self, token: CancellationToken) -> Self {
        self.cancel(token)
    }

    pub fn cancel(self, token: CancellationToken) -> Self {
        self.push(RequestOption::Cancel(token))
    }

    pub fn basic_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.push(RequestOption::BasicAuth { username: username.into(), password: password.into() })
    }

    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.push(RequestOption::BearerAuth(token.into()))
    }

    pub fn accept(self, value: impl Into<String>) -> Self {
        self.push(RequestOption::Accept(value.into()))
    }

    pub fn cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(RequestOption::Cookie(name.into(), value.into()))
    }

    /// `with_cookie_value`: alias for `cookie`, matching the spec's external naming.
    pub fn cookie_value(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookie(name, value)
    }

    pub fn cookies(self, pairs: Vec<(String, String)>) -> Self {
        self.push(RequestOption::CookieMap(pairs))
    }

    /// `with_cookie_string`: parses a raw `"name=value; name2=value2"` `Cookie` header string.
    pub fn cookie_string(self, raw: impl Into<String>) -> Self {
        self.push(RequestOption::CookieString(raw.into()))
    }

    /// Applies every chained option and runs the request through the client's pipeline.
    pub async fn send(self) -> Result<Response> {
        self.client.request(self.method, self.url, self.options).await
    }

    /// Like `send`, but appends `extra` options after the chained ones (last writer wins), for
    /// callers that built most of a request via chaining but have a few options assembled
    /// dynamically in a `Vec`.
    pub async fn send_with(self, extra: Vec<RequestOption>) -> Result<Response> {
        let mut options = self.options;
        options.extend(extra);
        self.client.request(self.method, self.url, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn builder_chains_options_and_rejects_blocked_targets_before_send() {
        let client = Client::new(ClientConfig::secure_defaults()).unwrap();
        let err = RequestBuilder::new(&client, Method::Get, "http://127.0.0.1:1/")
            .header("X-Test", "1")
            .accept("application/json")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::NetfetchError::Url(crate::error::UrlError::BlockedIp(_))));
    }
}
