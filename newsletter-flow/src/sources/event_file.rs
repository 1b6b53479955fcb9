use std::path::PathBuf;

use market_client::domain::EventMessage;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Event messages stored on disk, one message per file.
///
/// A file that cannot be read is reported as an error item for that file
/// only; the remaining files are still yielded.
pub struct EventFileSource {
    paths: Vec<PathBuf>,
}

impl EventFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Source<EventMessage> for EventFileSource {
    async fn stream(&self) -> EnvelopeStream<EventMessage> {
        let paths = self.paths.clone();
        let s = async_stream::stream! {
            for path in paths {
                match tokio::fs::read_to_string(&path).await {
                    Ok(body) => yield Ok(Envelope::now(EventMessage::from(body))),
                    Err(e) => {
                        metrics::counter!("event_file_read_errors_total").increment(1);
                        yield Err(PipelineError::Source(format!(
                            "failed to read event file {}: {e}",
                            path.display()
                        )));
                    }
                }
            }
        };

        Box::pin(s)
    }
}
