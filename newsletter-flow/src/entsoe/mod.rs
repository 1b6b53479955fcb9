//! ENTSO-E Transparency Platform integration.

pub mod client;
pub mod parser;

pub use client::{CapacityError, CapacitySource, EntsoeClient};
pub use parser::{parse_generation_series, ParseError};
