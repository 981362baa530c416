//! Drives a running server through the cookie-mode client.
//!
//! ```text
//! cargo run --bin client_demo -- http://127.0.0.1:8080 admin ChangeMe123!
//! ```

use gatehouse::client::{ApiClient, ClientError};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("gatehouse=debug,info"))
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let login = args.next().unwrap_or_else(|| "admin".to_string());
    let password = args.next().unwrap_or_else(|| "ChangeMe123!".to_string());

    let client = ApiClient::new(&base_url)?;
    let role = client.login(&login, &password).await?;
    println!("signed in as {login} ({})", role.as_str());

    let me: Value = client.get("auth/me").await?;
    println!("claims: {me:#}");

    if let Some(user_id) = me.get("userId").and_then(Value::as_str) {
        let sessions: Value = client.get(&format!("users/{user_id}/sessions")).await?;
        println!("active sessions: {sessions:#}");
    }

    client.logout().await?;
    match client.get::<Value>("auth/me").await {
        Err(ClientError::LoginRequired) => println!("logged out, login required again"),
        other => println!("unexpected after logout: {other:?}"),
    }

    Ok(())
}
