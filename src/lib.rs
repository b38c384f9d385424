//! `netfetch`: a production-grade HTTP client with SSRF-safe pooling, DoH resolution,
//! retry/backoff, and response caching.
//!
//! Most callers only need the package-level functions in this module (`get`, `post`, ...),
//! which share a lazily-built, process-wide [`Client`] configured with
//! [`ClientConfig::secure_defaults`]. Callers who need their own pool, a non-default
//! configuration, or a [`DomainSession`] should build a [`Client`] directly.

pub use netfetch_core::{
    Auth, BodyVariant, Client, ClientConfig, DomainSession, Method, MultipartFile, NetfetchError, RequestBuilder,
    RequestOption, RequestSpec, Response, ResponseMeta, Result,
};

mod convenience;
mod default_client;

pub use convenience::{delete, get, head, options, patch, post, put, request};
pub use default_client::shutdown_default_client;
