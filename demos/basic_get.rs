//! Fetches a URL with the package-level convenience functions, falling back to a one-off
//! `Client` when the caller wants non-default timeouts.
//!
//! Run with: cargo run --example basic_get -- https://example.com

use std::time::Duration;

use netfetch::{Client, ClientConfig, RequestOption};

#[tokio::main]
async fn main() -> netfetch::Result<()> {
    tracing_subscriber::fmt::init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://example.com".to_string());

    let response = netfetch::get(url.clone(), vec![RequestOption::Accept("application/json".into())]).await?;
    println!("{} {} ({} bytes)", response.status, url, response.body.len());

    let mut config = ClientConfig::secure_defaults();
    config.timeouts.dial = Duration::from_secs(5);
    let client = Client::new(config)?;
    let retried = client.get(&url).timeout(Duration::from_secs(10)).max_retries(2).send().await?;
    println!("second fetch: {} {} bytes", retried.status, retried.body.len());

    client.close();
    netfetch::shutdown_default_client();
    Ok(())
}
