//! Package-level convenience functions (SPEC_FULL §6): the functional-options shape of
//! [`Client::request`], run against the lazily-built process-wide default client.

use netfetch_core::{Method, RequestOption, Response, Result};

use crate::default_client;

async fn run(method: Method, url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    let client = default_client::get()?;
    client.request(method, url, options).await
}

pub async fn request(method: Method, url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(method, url, options).await
}

pub async fn get(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Get, url, options).await
}

pub async fn head(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Head, url, options).await
}

pub async fn post(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Post, url, options).await
}

pub async fn put(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Put, url, options).await
}

pub async fn patch(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Patch, url, options).await
}

pub async fn delete(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Delete, url, options).await
}

pub async fn options(url: impl Into<String>, options: Vec<RequestOption>) -> Result<Response> {
    run(Method::Options, url, options).await
}
