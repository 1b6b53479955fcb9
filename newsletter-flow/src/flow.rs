//! The event-to-newsletter flow: extract → resolve → fetch → transform → notify.

use std::sync::Arc;

use market_client::domain::{EventMessage, Region};
use tracing::Instrument;

use crate::{
    config::AppConfig,
    entsoe::{CapacityError, CapacitySource, EntsoeClient},
    extract::{extract_event_payload, extract_region_code, ExtractError},
    notify::{registry, DeliveryReport, Notifier, NotifyError, SmtpMailer, UserRegistry},
    region::resolve_region,
    retry::RetryPolicy,
    transform::{transform, TransformError, TransformOptions, TransformedResult},
};

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error("rejected event: {0}")]
    Malformed(#[from] ExtractError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub event_id: String,
    pub region: Region,
    pub result: TransformedResult,
    pub delivery: DeliveryReport,
}

pub struct DataFlow {
    capacity: Arc<dyn CapacitySource>,
    notifier: Notifier,
    transform: TransformOptions,
    fetch_retry: RetryPolicy,
    transform_retry: RetryPolicy,
}

impl DataFlow {
    pub fn new(
        capacity: Arc<dyn CapacitySource>,
        notifier: Notifier,
        transform: TransformOptions,
        fetch_retry: RetryPolicy,
        transform_retry: RetryPolicy,
    ) -> Self {
        Self {
            capacity,
            notifier,
            transform,
            fetch_retry,
            transform_retry,
        }
    }

    /// Wires the production collaborators: ENTSO-E client, configured user
    /// registry and SMTP mailer. Secrets are read from the environment here.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let capacity = Arc::new(EntsoeClient::from_config(&cfg.entsoe)?);
        let users: Arc<dyn UserRegistry> = Arc::from(registry::from_config(&cfg.users)?);
        let mailer = Arc::new(SmtpMailer::from_config(&cfg.email)?);

        Ok(Self::new(
            capacity,
            Notifier::new(users, mailer, cfg.retry.notify.policy()),
            TransformOptions::from(&cfg.transform),
            cfg.retry.fetch.policy(),
            cfg.retry.transform.policy(),
        ))
    }

    /// Runs the flow for one event. Each call is independent of every other.
    pub async fn run(&self, event: &EventMessage) -> Result<FlowOutcome, FlowError> {
        let event_id = event_id(event);
        let span = tracing::info_span!("flow_run", event_id = %event_id);
        self.run_steps(event, event_id).instrument(span).await
    }

    async fn run_steps(&self, event: &EventMessage, event_id: String) -> Result<FlowOutcome, FlowError> {
        let payload = extract_event_payload(event.as_str())?;
        let region = resolve_region(extract_region_code(payload)?);
        tracing::info!(region = %region.short_name, code = %region.code, "event accepted");

        let source = &self.capacity;
        let region_ref = &region;
        let capacity = self
            .fetch_retry
            .run("fetch_installed_capacity", move || source.installed_capacity(region_ref))
            .await?;

        let capacity_ref = &capacity;
        let opts = &self.transform;
        let result = self
            .transform_retry
            .run("transform_data", move || async move { transform(payload, capacity_ref, opts) })
            .await?;
        tracing::info!(title = %result.title, rows = result.table.len(), "forecast transformed");

        let delivery = self.notifier.send_newsletters(&result, &region).await?;
        tracing::info!(
            delivered = delivery.delivered.len(),
            failed = delivery.failed.len(),
            "newsletters dispatched"
        );

        Ok(FlowOutcome {
            event_id,
            region,
            result,
            delivery,
        })
    }
}

/// Content digest of an event, used to correlate log lines of one run.
pub fn event_id(event: &EventMessage) -> String {
    let hex = blake3::hash(event.as_str().as_bytes()).to_hex();
    hex.as_str()[..16].to_string()
}


#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering, time::Duration};

    use market_client::domain::CapacityTable;

    use super::testing::{FlakyCapacity, SAMPLE_EVENT};
    use super::*;
    use crate::notify::{
        testing::{users, RecordingMailer},
        StaticUserRegistry,
    };

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn flow(capacity: Arc<dyn CapacitySource>, mailer: Arc<RecordingMailer>, n_users: usize) -> DataFlow {
        DataFlow::new(
            capacity,
            Notifier::new(Arc::new(StaticUserRegistry::new(users(n_users))), mailer, fast_retry()),
            TransformOptions::default(),
            fast_retry(),
            fast_retry(),
        )
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried() {
        let capacity = Arc::new(FlakyCapacity::new(2, 8_000.0));
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(capacity.clone(), mailer.clone(), 2);

        let outcome = flow.run(&EventMessage::new(SAMPLE_EVENT)).await.unwrap();

        assert_eq!(capacity.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.region.short_name, "DE_50HZ");
        assert_eq!(outcome.result.table[0].installed_mw, Some(8_000.0));
        assert_eq!(outcome.delivery.delivered.len(), 2);
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exhausted_fetch_retries_fail_the_run_without_sending() {
        let capacity = Arc::new(FlakyCapacity::new(3, 8_000.0));
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(capacity.clone(), mailer.clone(), 2);

        let res = flow.run(&EventMessage::new(SAMPLE_EVENT)).await;

        assert!(matches!(res, Err(FlowError::Capacity(CapacityError::Status { status: 503, .. }))));
        assert_eq!(capacity.calls.load(Ordering::SeqCst), 3);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    struct NoCapacity;

    #[async_trait::async_trait]
    impl CapacitySource for NoCapacity {
        async fn installed_capacity(&self, _region: &Region) -> Result<CapacityTable, CapacityError> {
            Ok(CapacityTable::default())
        }
    }

    #[tokio::test]
    async fn empty_capacity_still_sends_newsletter() {
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(Arc::new(NoCapacity), mailer.clone(), 1);

        let outcome = flow.run(&EventMessage::new(SAMPLE_EVENT)).await.unwrap();

        assert!(outcome.result.chart.contains("n/a"));
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn event_without_payload_marker_is_rejected() {
        let capacity = Arc::new(FlakyCapacity::new(0, 8_000.0));
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(capacity.clone(), mailer.clone(), 1);

        let res = flow.run(&EventMessage::new("<msg:Message><msg:Header/></msg:Message>")).await;

        assert!(matches!(res, Err(FlowError::Malformed(ExtractError::MissingPayloadMarker))));
        assert_eq!(capacity.calls.load(Ordering::SeqCst), 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_without_bidding_zone_is_rejected() {
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(Arc::new(NoCapacity), mailer, 1);
        let event = SAMPLE_EVENT.replace("inBiddingZone_Domain.mRID", "outBiddingZone_Domain.mRID");

        let res = flow.run(&EventMessage::new(event)).await;

        assert!(matches!(res, Err(FlowError::Malformed(ExtractError::MissingBiddingZone))));
    }

    #[tokio::test]
    async fn each_user_gets_exactly_one_newsletter_per_run() {
        let mailer = Arc::new(RecordingMailer::default());
        let flow = flow(Arc::new(FlakyCapacity::new(0, 8_000.0)), mailer.clone(), 4);

        flow.run(&EventMessage::new(SAMPLE_EVENT)).await.unwrap();
        flow.run(&EventMessage::new(SAMPLE_EVENT)).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 8);
        for i in 0..4 {
            let to = format!("user{i}@example.com");
            assert_eq!(sent.iter().filter(|m| m.to == to).count(), 2);
        }
    }

    #[test]
    fn event_id_is_stable_content_digest() {
        let a = event_id(&EventMessage::new(SAMPLE_EVENT));
        assert_eq!(a.len(), 16);
        assert_eq!(a, event_id(&EventMessage::new(SAMPLE_EVENT)));
        assert_ne!(a, event_id(&EventMessage::new("other")));
    }
}
