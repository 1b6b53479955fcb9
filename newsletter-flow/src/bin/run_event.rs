//! Runs the newsletter flow once per event file given on the command line.
//!
//! Usage: run_event <event.xml>...
//!
//! Exits non-zero if any run failed.

use std::sync::Arc;

use anyhow::{bail, Result};
use market_client::domain::EventMessage;
use newsletter_flow::{
    config::AppConfig, observability, pipeline::Pipeline, sinks::FlowRunner, sources::EventFileSource,
    DataFlow,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: run_event <event.xml>...");
    }

    let cfg = AppConfig::load()?;
    let flow = Arc::new(DataFlow::from_config(&cfg)?);

    tracing::info!(files = paths.len(), "running flow for event files");
    let pipeline: Pipeline<_, EventMessage, _> = Pipeline::new(
        EventFileSource::new(paths),
        FlowRunner::new(flow, cfg.runner.max_concurrent_runs),
    );
    pipeline.run().await?;

    Ok(())
}
