use std::{sync::Arc, time::SystemTime};

use futures::StreamExt;
use market_client::domain::EventMessage;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    flow::DataFlow,
    pipeline::{Envelope, PipelineError, Sink},
};

/// Starts one independent flow run per incoming event.
///
/// Runs share nothing but the read-only collaborators held by the flow. At
/// most `max_concurrent_runs` execute at once; later events wait for a slot.
pub struct FlowRunner {
    flow: Arc<DataFlow>,
    max_concurrent_runs: usize,
}

impl FlowRunner {
    pub fn new(flow: Arc<DataFlow>, max_concurrent_runs: usize) -> Self {
        Self {
            flow,
            max_concurrent_runs: max_concurrent_runs.max(1),
        }
    }
}

/// Runs the flow for one envelope and reports whether it fully succeeded.
async fn run_one(flow: &DataFlow, env: Envelope<EventMessage>) -> bool {
    metrics::counter!("flow_runs_total").increment(1);

    let outcome = match flow.run(&env.payload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "flow run failed");
            metrics::counter!("flow_runs_failed_total").increment(1);
            return false;
        }
    };

    if let Ok(dur) = SystemTime::now().duration_since(env.received_at) {
        metrics::histogram!("flow_run_duration_seconds").record(dur.as_secs_f64());
    }

    match outcome.delivery.ensure_complete() {
        Ok(()) => {
            tracing::info!(
                event_id = %outcome.event_id,
                region = %outcome.region.short_name,
                delivered = outcome.delivery.delivered.len(),
                "flow run completed"
            );
            true
        }
        Err(e) => {
            tracing::error!(event_id = %outcome.event_id, error = %e, "flow run completed with failed deliveries");
            metrics::counter!("flow_runs_failed_total").increment(1);
            false
        }
    }
}

fn record(joined: Result<bool, tokio::task::JoinError>, failed: &mut usize) {
    match joined {
        Ok(true) => {}
        Ok(false) => *failed += 1,
        Err(e) => {
            tracing::error!(error = %e, "flow run task aborted");
            *failed += 1;
        }
    }
}

#[async_trait::async_trait]
impl Sink<EventMessage> for FlowRunner {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<EventMessage>, PipelineError>> + Send + Unpin + 'static,
    {
        let slots = Arc::new(Semaphore::new(self.max_concurrent_runs));
        let mut runs = JoinSet::new();
        let mut total: usize = 0;
        let mut failed: usize = 0;

        while let Some(item) = input.next().await {
            total += 1;
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for FlowRunner");
                    failed += 1;
                    continue;
                }
            };

            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Flow(e.to_string()))?;
            let flow = Arc::clone(&self.flow);
            runs.spawn(async move {
                let _permit = permit;
                run_one(&flow, env).await
            });

            while let Some(joined) = runs.try_join_next() {
                record(joined, &mut failed);
            }
        }

        while let Some(joined) = runs.join_next().await {
            record(joined, &mut failed);
        }

        if failed > 0 {
            return Err(PipelineError::Flow(format!("{failed} of {total} flow runs failed")));
        }
        Ok(())
    }
}
