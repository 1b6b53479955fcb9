pub mod config;
pub mod entsoe;
pub mod extract;
pub mod flow;
pub mod metrics_server;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod region;
pub mod retry;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use flow::{DataFlow, FlowError, FlowOutcome};
pub use pipeline::{Envelope, Pipeline};
