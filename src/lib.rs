//! lineframe: line protocol metrics to columnar frames
//!
//! Groups a batch of line protocol metric records into typed, nullable
//! columnar frames ready for visualization or storage backends.
//!
//! # Features
//!
//! - **Per-time frames**: one frame per (metric name, timestamp), with each
//!   field column labeled by the record's tag set
//! - **Labels column mode**: one wide frame per metric name, with time, a
//!   `labels` column and one column per tag key
//! - **Type unification**: every field column is nullable; integers can be
//!   coerced to float64
//! - **Deterministic output**: frames come out in first-seen order
//! - **HTTP surface**: `POST /write` returns the JSON-encoded frames
//!
//! # Example
//!
//! ```
//! use lineframe::convert::{Converter, ConverterConfig};
//!
//! let converter = Converter::new(ConverterConfig::default());
//! let frames = converter
//!     .convert(b"cpu,host=a usage=0.5 1000\ncpu,host=b usage=0.7 1000\n")
//!     .unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].fields().len(), 3); // time + one column per host
//! println!("{}", frames[0].to_json());
//! ```

pub mod api;
pub mod convert;
pub mod data;
pub mod metric;

// Re-export commonly used types
pub use convert::{ConvertError, Converter, ConverterConfig, GroupKey};
pub use data::{Column, Field, FieldType, FieldValue, Frame, Value};
pub use metric::{LineProtocolDecoder, Metric, MetricDecoder, ParseError};
