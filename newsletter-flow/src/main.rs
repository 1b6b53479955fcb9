use std::sync::Arc;

use anyhow::Result;
use market_client::domain::EventMessage;
use newsletter_flow::{
    config::AppConfig, metrics_server, observability, pipeline::Pipeline, sinks::FlowRunner,
    sources::HttpEventSource, DataFlow,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr).await?;
    }

    let webhook = cfg
        .webhook
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("[webhook] section is required to serve events"))?;

    let flow = Arc::new(DataFlow::from_config(&cfg)?);
    let source = HttpEventSource::new(
        &webhook.http_bind_addr,
        webhook.channel_capacity,
        webhook.auth_bearer_token.clone(),
    )
    .await?;
    let sink = FlowRunner::new(flow, cfg.runner.max_concurrent_runs);

    let pipeline: Pipeline<_, EventMessage, _> = Pipeline::new(source, sink);
    pipeline.run().await?;

    Ok(())
}
