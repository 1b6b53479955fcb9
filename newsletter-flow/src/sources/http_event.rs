use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use futures::StreamExt;
use market_client::domain::EventMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

pub const EVENT_PATH: &str = "/events/entsoe";

#[derive(Clone)]
struct SharedState {
    tx: mpsc::Sender<Envelope<EventMessage>>,
    auth_bearer_token: Option<Arc<str>>,
}

/// Webhook endpoint receiving ENTSO-E event messages.
///
/// `POST /events/entsoe` accepts the message either as the raw request
/// body or wrapped as JSON `{"body": "<message>"}`.
#[derive(Clone)]
pub struct HttpEventSource {
    receiver: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<Envelope<EventMessage>>>>>,
    local_addr: SocketAddr,
}

#[derive(serde::Deserialize)]
struct WebhookBody {
    body: String,
}

impl HttpEventSource {
    pub async fn new(
        bind_addr: &str,
        channel_capacity: usize,
        auth_bearer_token: Option<String>,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let state = SharedState {
            tx,
            auth_bearer_token: auth_bearer_token.map(Arc::from),
        };

        let app = Router::new()
            .route(EVENT_PATH, post(receive_event))
            .with_state(state);

        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to bind event listener: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| PipelineError::Source(format!("event listener has no address: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                tracing::error!(error = %e, "HTTP event source server error");
            }
        });
        tracing::info!(addr = %local_addr, path = EVENT_PATH, "listening for events");

        Ok(Self {
            receiver: Arc::new(tokio::sync::Mutex::new(Some(rx))),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl Source<EventMessage> for HttpEventSource {
    async fn stream(&self) -> EnvelopeStream<EventMessage> {
        let mut guard = self.receiver.lock().await;
        match guard.take() {
            Some(rx) => Box::pin(ReceiverStream::new(rx).map(Ok)),
            None => Box::pin(futures::stream::once(async {
                Err(PipelineError::Source(
                    "HttpEventSource stream already taken; only one consumer supported".to_string(),
                ))
            })),
        }
    }
}

async fn receive_event(State(state): State<SharedState>, headers: HeaderMap, body: String) -> StatusCode {
    metrics::counter!("events_received_total").increment(1);

    if !authorized(&headers, state.auth_bearer_token.as_deref()) {
        metrics::counter!("events_rejected_total", "reason" => "unauthorized").increment(1);
        return StatusCode::UNAUTHORIZED;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(event) = decode_event_body(content_type, body) else {
        metrics::counter!("events_rejected_total", "reason" => "empty").increment(1);
        return StatusCode::BAD_REQUEST;
    };

    if state.tx.send(Envelope::now(event)).await.is_err() {
        // Channel closed; the runner is gone.
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::ACCEPTED
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Unwraps a webhook body. JSON bodies carry the message in `body`;
/// anything else is taken verbatim. Empty messages yield `None`.
pub fn decode_event_body(content_type: &str, body: String) -> Option<EventMessage> {
    let text = if content_type.starts_with("application/json") {
        serde_json::from_str::<WebhookBody>(&body).ok()?.body
    } else {
        body
    };
    let event = EventMessage::from(text);
    (!event.is_empty()).then_some(event)
}
