pub mod flow_runner;

pub use flow_runner::FlowRunner;
