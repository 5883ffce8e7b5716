//! Health endpoint and keep-alive pinger for hosts that idle quiet processes.

use core::time::Duration;

use anyhow::{Context as _, Result};
use axum::{Json, Router, routing::get};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(15);

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> &'static str {
    "OK"
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn serve(listener: TcpListener) -> Result<()> {
    axum::serve(listener, router())
        .await
        .context("health server exited unexpectedly")
}

pub fn ping_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(PING_TIMEOUT)
        .build()
        .context("building ping client")
}

pub async fn ping_once(client: &reqwest::Client, url: &str) -> Result<StatusCode> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    Ok(response.status())
}

/// Ping `url` forever, every `every`. Failures are logged and never stop the loop.
pub async fn ping_loop(client: reqwest::Client, url: String, every: Duration) {
    loop {
        match ping_once(&client, &url).await {
            Ok(status) => info!(url = %url, status = %status, "Ping"),
            Err(e) => warn!(url = %url, error = %e, "Ping failed"),
        }
        tokio::time::sleep(every).await;
    }
}
