use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use market_client::domain::{CapacityTable, EventMessage, Region, User};
use newsletter_flow::{
    entsoe::{CapacityError, CapacitySource},
    notify::{Mailer, Notifier, NotifyError, OutgoingEmail, StaticUserRegistry},
    pipeline::{Pipeline, PipelineError},
    retry::RetryPolicy,
    sinks::FlowRunner,
    sources::EventFileSource,
    transform::TransformOptions,
    DataFlow,
};
use time::macros::datetime;

struct FixedCapacity;

#[async_trait::async_trait]
impl CapacitySource for FixedCapacity {
    async fn installed_capacity(&self, region: &Region) -> Result<CapacityTable, CapacityError> {
        assert_eq!(region.short_name, "DE_50HZ");
        let mut table = CapacityTable::new();
        table.insert("Wind Offshore", datetime!(2023-12-31 23:00:00 UTC), 8_000.0);
        Ok(table)
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<OutgoingEmail>>);

#[async_trait::async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(email);
        Ok(())
    }
}

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_event.xml")
}

fn runner(outbox: Arc<Outbox>) -> FlowRunner {
    let users = vec![
        User {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        },
        User {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
        },
    ];
    let retry = RetryPolicy::new(2, Duration::from_millis(1));
    let flow = DataFlow::new(
        Arc::new(FixedCapacity),
        Notifier::new(Arc::new(StaticUserRegistry::new(users)), outbox, retry),
        TransformOptions::default(),
        retry,
        retry,
    );
    FlowRunner::new(Arc::new(flow), 2)
}

#[tokio::test]
async fn event_file_produces_one_newsletter_per_user() {
    let outbox = Arc::new(Outbox::default());
    let pipeline: Pipeline<_, EventMessage, _> =
        Pipeline::new(EventFileSource::new([fixture()]), runner(outbox.clone()));

    pipeline.run().await.unwrap();

    let sent = outbox.0.lock().unwrap();
    assert_eq!(sent.len(), 2);
    for mail in sent.iter() {
        assert_eq!(mail.subject, "Newsletter: Intraday Generation Forecasts Wind Offshore");
        assert!(mail.html_body.contains("(50Hertz CA, DE(50HzT) BZA):</h1>"));
        assert!(mail.html_body.contains("50% (4000MW/8000MW)"));
        assert!(mail.html_body.contains("<table border=\"1\" class=\"dataframe\">"));
    }
    assert!(sent.iter().any(|m| m.to == "ada@example.com" && m.html_body.starts_with("Hello Ada, <br>")));
    assert!(sent.iter().any(|m| m.to == "grace@example.com"));
}

#[tokio::test]
async fn unreadable_file_fails_the_batch_but_not_the_other_runs() {
    let outbox = Arc::new(Outbox::default());
    let pipeline: Pipeline<_, EventMessage, _> = Pipeline::new(
        EventFileSource::new([fixture(), PathBuf::from("/nonexistent/event.xml")]),
        runner(outbox.clone()),
    );

    let res = pipeline.run().await;

    assert!(matches!(res, Err(PipelineError::Flow(msg)) if msg == "1 of 2 flow runs failed"));
    assert_eq!(outbox.0.lock().unwrap().len(), 2);
}
