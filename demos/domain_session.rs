//! Demonstrates a `DomainSession`: headers and cookies set on one call are replayed
//! automatically on later calls to the same origin, without the caller re-attaching them.
//!
//! Run with: cargo run --example domain_session

use std::sync::Arc;

use netfetch::{Client, ClientConfig, DomainSession, RequestOption};

#[tokio::main]
async fn main() -> netfetch::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Arc::new(Client::new(ClientConfig::secure_defaults())?);
    let session = DomainSession::new("https://example.com", client.clone())?;

    session.set_header("X-Api-Key", "demo-key");

    let login = session.post("/login", vec![RequestOption::Text("user=demo&pass=demo".into())]).await?;
    println!("login: {}", login.status);

    // `X-Api-Key` and any cookies `login` set are attached automatically here.
    let profile = session.get("/profile", vec![]).await?;
    println!("profile: {} ({} bytes)", profile.status, profile.body.len());

    if let Some(session_id) = session.get_cookie("session_id") {
        println!("session cookie: {session_id}");
    }

    session.clear();
    client.close();
    Ok(())
}
