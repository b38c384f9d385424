//! Request pipeline orchestration (SPEC_FULL §4.10): wires option assembly, body encoding,
//! the admission controller, the connection pool, retry/backoff, redirects, cookies,
//! decompression, and the response cache into the one `execute` entry point `Client` and
//! `DomainSession` both call through.

pub mod body;
pub mod cookies;
pub mod decompress;
pub mod options;
pub mod redirect;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use url::Url;

use crate::cache::{entry_now_unix, fingerprint, ResponseCache};
use crate::concurrency::ConcurrencyManager;
use crate::config::ClientConfig;
use crate::error::{BodyError, NetfetchError, NetworkError, Result, UrlError};
use crate::net_util::{is_localhost, validate_ip};
use crate::object_pool::Carriers;
use crate::pool::{Pool, ResponseBody};
use crate::rate_limit::RateLimiter;

use self::body::EncodedBody;
use self::cookies::CookieJar;
use self::options::{Auth, BodyVariant, Method, RequestSpec, Response, ResponseMeta};

/// Everything the pipeline needs beyond the per-call `RequestSpec`, owned by `Client` and
/// shared across every call it makes (and every `DomainSession` built on top of it).
pub struct PipelineContext {
    pub pool: Arc<Pool>,
    pub concurrency: Arc<ConcurrencyManager>,
    pub cache: Option<Arc<ResponseCache>>,
    pub cookies: Option<Arc<CookieJar>>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub carriers: Arc<Carriers>,
    pub config: Arc<ClientConfig>,
}

fn box_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never: std::convert::Infallible| match never {}).boxed()
}

async fn read_body_capped(carriers: &Carriers, mut incoming: hyper::body::Incoming, cap: usize) -> Result<Bytes> {
    let mut buf = carriers.buffers.acquire();
    while let Some(frame) = incoming.frame().await {
        let frame = frame.map_err(|e| NetfetchError::Network(NetworkError::Io(e.to_string())))?;
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > cap {
                carriers.buffers.release(buf);
                return Err(NetfetchError::Body(BodyError::TooLarge { limit: cap }));
            }
            buf.extend_from_slice(&data);
        }
    }
    let out = Bytes::copy_from_slice(&buf);
    carriers.buffers.release(buf);
    Ok(out)
}

fn upsert(pairs: &mut Vec<(String, String)>, key: impl Into<String>, value: impl Into<String>) {
    let key = key.into();
    if let Some(existing) = pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
        existing.1 = value.into();
    } else {
        pairs.push((key, value.into()));
    }
}

fn has_header(pairs: &[(String, String)], name: &str) -> bool {
    pairs.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// Scheme + (for literal IP hosts) SSRF check. The dialer re-checks every literal/resolved IP
/// at connect time regardless; this is a cheap up-front rejection so a blocked URL never even
/// reaches the pool, including after following a redirect.
fn check_url(url: &Url, cfg: &ClientConfig) -> Result<()> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(NetfetchError::Url(UrlError::UnsupportedScheme(url.scheme().to_string())));
    }
    if !cfg.security.allow_private_ips {
        if let Some(host) = url.host_str() {
            if let Ok(ip) = host.parse::<std::net::IpAddr>() {
                validate_ip(ip).map_err(NetfetchError::Url)?;
            } else if is_localhost(host) {
                return Err(NetfetchError::Url(UrlError::BlockedHost(host.to_string())));
            }
        }
    }
    Ok(())
}

fn parse_url(raw: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| NetfetchError::Url(UrlError::Malformed(e.to_string())))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

fn build_request(
    spec: &RequestSpec,
    url: &Url,
    encoded: &EncodedBody,
    ctx: &PipelineContext,
) -> Result<http::Request<ResponseBody>> {
    let mut headers = ctx.config.default_headers.clone();
    for (k, v) in &spec.headers {
        upsert(&mut headers, k.clone(), v.clone());
    }
    if !has_header(&headers, "user-agent") {
        headers.push(("User-Agent".into(), ctx.config.user_agent.clone()));
    }
    if !has_header(&headers, "accept-encoding") {
        headers.push(("Accept-Encoding".into(), "gzip, deflate".into()));
    }
    if let Some(accept) = &spec.accept {
        upsert(&mut headers, "Accept", accept.clone());
    }
    if let Some(host) = url.host_str() {
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        upsert(&mut headers, "Host", host_header);
    }
    match &spec.auth {
        Auth::None => {}
        Auth::Basic { username, password } => {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            upsert(&mut headers, "Authorization", format!("Basic {token}"));
        }
        Auth::Bearer { token } => {
            upsert(&mut headers, "Authorization", format!("Bearer {token}"));
        }
    }

    if ctx.config.features.cookies {
        let mut cookie_pairs: Vec<(String, String)> = Vec::new();
        if let Some(jar) = &ctx.cookies {
            let now = entry_now_unix() as i64;
            let is_secure = url.scheme() == "https";
            for (k, v) in jar.matching(url.host_str().unwrap_or(""), url.path(), is_secure, now) {
                upsert(&mut cookie_pairs, k, v);
            }
        }
        for (k, v) in &spec.cookies {
            upsert(&mut cookie_pairs, k.clone(), v.clone());
        }
        if !cookie_pairs.is_empty() {
            let value = cookie_pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("; ");
            upsert(&mut headers, "Cookie", value);
        }
    }

    if let Some(ct) = &encoded.content_type {
        if !has_header(&headers, "content-type") {
            headers.push(("Content-Type".into(), ct.clone()));
        }
    }
    if !encoded.bytes.is_empty() {
        upsert(&mut headers, "Content-Length", encoded.bytes.len().to_string());
    }

    let mut builder = http::Request::builder().method(spec.method.as_http()).uri(url.as_str());
    for (k, v) in &headers {
        builder = builder.header(k.as_str(), v.as_str());
    }
    builder
        .body(box_body(encoded.bytes.clone()))
        .map_err(|e| NetfetchError::Url(UrlError::Malformed(e.to_string())))
}

fn update_cookie_jar(ctx: &PipelineContext, url: &Url, headers: &http::HeaderMap) {
    if !ctx.config.features.cookies {
        return;
    }
    let Some(jar) = &ctx.cookies else { return };
    let now = entry_now_unix() as i64;
    let default_domain = url.host_str().unwrap_or("").to_string();
    for value in headers.get_all(http::header::SET_COOKIE) {
        if let Ok(s) = value.to_str() {
            if let Some(cookie) = cookies::parse_set_cookie(s, &default_domain, url.path(), now) {
                jar.store(cookie);
            }
        }
    }
}

fn collect_cookies(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for value in headers.get_all(http::header::SET_COOKIE) {
        if let Ok(s) = value.to_str() {
            let name_value = s.split(';').next().unwrap_or(s);
            if let Some((name, v)) = name_value.split_once('=') {
                out.insert(name.trim().to_string(), v.trim().to_string());
            }
        }
    }
    out
}

fn cache_key(method: Method, url: &Url, vary: &[(&str, &str)]) -> String {
    fingerprint(method.as_http().as_str(), url.as_str(), vary)
}

fn parse_cache_control_max_age(headers: &[(String, String)]) -> Option<u64> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("cache-control")).and_then(|(_, v)| {
        v.split(',').map(str::trim).find_map(|part| part.strip_prefix("max-age=")).and_then(|n| n.parse::<u64>().ok())
    })
}

fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()).unwrap_or("").to_string()
}

async fn sleep_backoff(attempt: u32, cfg: &crate::config::RetryConfig, cancel: &tokio_util::sync::CancellationToken) -> Result<()> {
    let delay = retry::backoff_delay(attempt - 1, cfg);
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(NetfetchError::Network(NetworkError::Cancelled)),
    }
}

/// Runs `spec` through the full pipeline and returns the final response, or the first
/// non-retryable error. Each retry re-enters the concurrency manager as its own admission.
pub async fn execute(ctx: &PipelineContext, spec: RequestSpec) -> Result<Response> {
    let started = Instant::now();
    let mut current_url = parse_url(&spec.url, &spec.query)?;
    check_url(&current_url, &ctx.config)?;

    let vary: Vec<(&str, &str)> = spec.accept.as_deref().map(|a| ("Accept", a)).into_iter().collect();
    let cacheable_request =
        ctx.cache.is_some() && matches!(spec.method, Method::Get) && matches!(spec.body, BodyVariant::None);

    if cacheable_request {
        let key = cache_key(spec.method, &current_url, &vary);
        if let Some(entry) = ctx.cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok(Response {
                status: entry.status,
                status_text: status_text(entry.status),
                headers: entry.headers.clone(),
                body: entry.body.clone(),
                cookies: HashMap::new(),
                meta: ResponseMeta { duration: started.elapsed(), attempts: 0, redirects: 0, from_cache: true },
            });
        }
    }

    let max_retries = spec.max_retries.unwrap_or(ctx.config.retry.max_retries);
    let mut attempt: u32 = 0;
    let mut redirects: u32 = 0;
    let mut method = spec.method;
    let mut body_variant = spec.body.clone();

    let final_response = 'outer: loop {
        attempt += 1;
        loop {
            if let Some(limiter) = &ctx.rate_limiter {
                limiter.wait(&spec.cancel).await?;
            }

            let mut req_spec = spec.clone();
            req_spec.method = method;
            req_spec.url = current_url.to_string();
            req_spec.body = body_variant.clone();

            let encoded = body::encode(&body_variant)?;
            let request = build_request(&req_spec, &current_url, &encoded, ctx)?;

            let timeout = spec.timeout.unwrap_or(ctx.config.timeouts.overall);
            let pool = ctx.pool.clone();
            let send_fut = async move {
                match tokio::time::timeout(timeout, pool.send(request)).await {
                    Ok(inner) => inner,
                    Err(_) => Err(NetfetchError::Network(NetworkError::Timeout)),
                }
            };

            let response = match ctx.concurrency.execute(&spec.cancel, move || send_fut).await {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    if retry::should_retry(method, Some(&e), None, &ctx.config.retry) && attempt <= max_retries {
                        sleep_backoff(attempt, &ctx.config.retry, &spec.cancel).await?;
                        continue 'outer;
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            let status = response.status().as_u16();
            let location =
                response.headers().get(http::header::LOCATION).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

            if ctx.config.features.follow_redirects && redirects < ctx.config.features.max_redirects {
                if let Some(outcome) = redirect::plan_redirect(status, location.as_deref(), &current_url, method)? {
                    update_cookie_jar(ctx, &current_url, response.headers());
                    redirects += 1;
                    current_url = outcome.url;
                    check_url(&current_url, &ctx.config)?;
                    method = outcome.method;
                    redirect::apply_body_drop(&mut body_variant, outcome.drop_body);
                    continue;
                }
            }

            if retry::should_retry(method, None, Some(status), &ctx.config.retry) && attempt <= max_retries {
                sleep_backoff(attempt, &ctx.config.retry, &spec.cancel).await?;
                continue 'outer;
            }

            break 'outer response;
        }
    };

    let status = final_response.status().as_u16();
    let resp_headers_raw = final_response.headers().clone();
    let cookies = collect_cookies(&resp_headers_raw);
    update_cookie_jar(ctx, &current_url, &resp_headers_raw);

    let mut resp_headers: Vec<(String, String)> = Vec::new();
    for (name, value) in &resp_headers_raw {
        if let Ok(v) = value.to_str() {
            resp_headers.push((name.as_str().to_string(), v.to_string()));
        }
    }

    let content_encoding =
        resp_headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-encoding")).map(|(_, v)| v.clone());
    let raw_body = read_body_capped(&ctx.carriers, final_response.into_body(), ctx.config.security.max_response_body).await?;
    let body = decompress::decompress(content_encoding.as_deref(), raw_body)?;

    if cacheable_request && (200..300).contains(&status) {
        if let Some(cache) = &ctx.cache {
            let key = cache_key(method, &current_url, &vary);
            let ttl = parse_cache_control_max_age(&resp_headers);
            cache.set(key, body.clone(), resp_headers.clone(), status, ttl);
        }
    }

    Ok(Response {
        status,
        status_text: status_text(status),
        headers: resp_headers,
        body,
        cookies,
        meta: ResponseMeta { duration: started.elapsed(), attempts: attempt, redirects, from_cache: false },
    })
}
