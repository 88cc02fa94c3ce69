//! Metric records and the decoder that produces them

mod decoder;
mod model;

pub use decoder::{LineProtocolDecoder, MetricDecoder, ParseError, Precision};
pub use model::{labels_to_string, Metric};
