//! netfetch-core: the engine behind the `netfetch` crate.
//!
//! Module map mirrors SPEC_FULL's layout: [`validation`]/[`net_util`] for input and SSRF
//! checks, [`dns`] for DNS-over-HTTPS resolution, [`proxy`] for platform/env proxy detection,
//! [`pool`] for the pooled transport, [`object_pool`] for reusable carriers, [`cache`] for the
//! response cache, [`concurrency`] for the admission controller, [`rate_limit`] for the fixed-
//! window limiter, [`pipeline`] for per-request orchestration, and [`client`]/[`session`] for
//! the `Client`/`DomainSession` entities built on top of all of it.

pub mod builder;
pub mod cache;
pub mod client;
pub mod concurrency;
pub mod config;
pub mod dns;
pub mod error;
pub mod net_util;
pub mod object_pool;
pub mod pipeline;
pub mod pool;
pub mod proxy;
pub mod rate_limit;
pub mod session;
pub mod validation;

pub use builder::RequestBuilder;
pub use client::Client;
pub use config::ClientConfig;
pub use error::{NetfetchError, Result};
pub use pipeline::options::{
    Auth, BodyVariant, Method, MultipartFile, RequestOption, RequestSpec, Response, ResponseMeta,
};
pub use session::DomainSession;
