//! Posts an event file to a running webhook, the way the upstream
//! notification service does.
//!
//! Usage: emit_event <event.xml> [url]
//!
//! The URL defaults to `NEWSLETTER_WEBHOOK_URL`, then to the local default
//! bind address. `NEWSLETTER_WEBHOOK_TOKEN` is sent as a bearer token when set.

use anyhow::{bail, Context, Result};
use newsletter_flow::{observability, sources::http_event::EVENT_PATH};

const DEFAULT_URL: &str = "http://127.0.0.1:8090";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: emit_event <event.xml> [url]");
    };
    let url = match args.next() {
        Some(url) => url,
        None => std::env::var("NEWSLETTER_WEBHOOK_URL")
            .unwrap_or_else(|_| format!("{DEFAULT_URL}{EVENT_PATH}")),
    };

    let body = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;

    let mut req = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "body": body }));
    if let Ok(token) = std::env::var("NEWSLETTER_WEBHOOK_TOKEN") {
        req = req.bearer_auth(token);
    }

    let resp = req.send().await.with_context(|| format!("failed to post event to {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        bail!("webhook rejected event: HTTP {status}");
    }
    tracing::info!(%url, %status, "event submitted");

    Ok(())
}
