//! Grouping converter: metric batches to frames
//!
//! Two grouping modes are supported:
//!
//! - **Per-time** (default): every distinct (metric name, timestamp) pair
//!   becomes its own frame. Each field column carries the tag set of the
//!   record it came from, so records with different tags at the same instant
//!   land side by side in one frame.
//! - **Labels column**: all records sharing a metric name are merged into one
//!   frame, one row per record. Time and tags become ordinary columns and a
//!   `labels` column keeps each row's tag set.
//!
//! Frames are returned in the order their key was first seen in the input.
//!
//! ```
//! use lineframe::convert::{Converter, ConverterConfig};
//!
//! let converter = Converter::new(ConverterConfig::default().with_labels_column(true));
//! let frames = converter
//!     .convert(b"temp,host=a value=3 1\ntemp,host=b value=4 2\n")
//!     .unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].len(), 2);
//! ```

mod frame_builder;
pub mod values;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::data::{FieldType, Frame, FrameError};
use crate::metric::{LineProtocolDecoder, Metric, MetricDecoder, ParseError};
use frame_builder::{PerTimeFrame, WideFrame};

pub use frame_builder::{LABELS_FIELD, TIME_FIELD};
pub use values::ConversionError;

/// Converter options, fixed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Merge all records of a metric name into one frame with a labels column
    pub use_labels_column: bool,
    /// Store integer fields as float64
    pub float_numbers: bool,
}

impl ConverterConfig {
    pub fn with_labels_column(mut self, enabled: bool) -> Self {
        self.use_labels_column = enabled;
        self
    }

    pub fn with_float_numbers(mut self, enabled: bool) -> Self {
        self.float_numbers = enabled;
        self
    }

    /// Read options from environment variables
    /// LINEFRAME_USE_LABELS_COLUMN=true
    /// LINEFRAME_FLOAT_NUMBERS=true
    pub fn from_env() -> Self {
        let flag = |name: &str| {
            std::env::var(name)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };
        Self {
            use_labels_column: flag("LINEFRAME_USE_LABELS_COLUMN"),
            float_numbers: flag("LINEFRAME_FLOAT_NUMBERS"),
        }
    }
}

/// Identifies the frame a record contributes to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    PerTime { name: String, timestamp: i64 },
    Wide { name: String },
}

impl GroupKey {
    pub fn for_metric(metric: &Metric, use_labels_column: bool) -> Self {
        if use_labels_column {
            GroupKey::Wide {
                name: metric.name.clone(),
            }
        } else {
            GroupKey::PerTime {
                name: metric.name.clone(),
                timestamp: metric.timestamp,
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GroupKey::PerTime { name, .. } | GroupKey::Wide { name } => name,
        }
    }
}

enum MetricFrame {
    PerTime(PerTimeFrame),
    Wide(WideFrame),
}

impl MetricFrame {
    fn new(metric: &Metric, use_labels_column: bool) -> Self {
        if use_labels_column {
            MetricFrame::Wide(WideFrame::new(metric))
        } else {
            MetricFrame::PerTime(PerTimeFrame::new(metric))
        }
    }

    fn fold(&mut self, metric: &Metric, float_numbers: bool) -> Result<(), ConvertError> {
        match self {
            MetricFrame::PerTime(frame) => frame.fold(metric, float_numbers),
            MetricFrame::Wide(frame) => frame.fold(metric, float_numbers),
        }
    }

    fn finish(self) -> Result<Frame, ConvertError> {
        match self {
            MetricFrame::PerTime(frame) => frame.finish(),
            MetricFrame::Wide(frame) => frame.finish(),
        }
    }
}

/// Converts raw line protocol batches into frames.
///
/// Holds only immutable options and a stateless decoder, so one instance can
/// be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Converter<D = LineProtocolDecoder> {
    config: ConverterConfig,
    decoder: D,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self::with_decoder(config, LineProtocolDecoder::new())
    }
}

impl<D: MetricDecoder> Converter<D> {
    pub fn with_decoder(config: ConverterConfig, decoder: D) -> Self {
        Self { config, decoder }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Decode a batch and group it into frames. Any error rejects the whole
    /// batch.
    pub fn convert(&self, raw: &[u8]) -> Result<Vec<Frame>, ConvertError> {
        let metrics = self.decoder.decode(raw)?;
        self.convert_metrics(&metrics)
    }

    /// Group already decoded records into frames
    pub fn convert_metrics(&self, metrics: &[Metric]) -> Result<Vec<Frame>, ConvertError> {
        let ConverterConfig {
            use_labels_column,
            float_numbers,
        } = self.config;

        // Frames in first-seen key order, looked up through the key index
        let mut frames: Vec<MetricFrame> = Vec::new();
        let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();

        for metric in metrics {
            let key = GroupKey::for_metric(metric, use_labels_column);
            let idx = match index.get(&key) {
                Some(&idx) => idx,
                None => {
                    frames.push(MetricFrame::new(metric, use_labels_column));
                    index.insert(key, frames.len() - 1);
                    frames.len() - 1
                }
            };
            frames[idx].fold(metric, float_numbers)?;
        }

        let frames = frames
            .into_iter()
            .map(MetricFrame::finish)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            metrics = metrics.len(),
            frames = frames.len(),
            labels_column = use_labels_column,
            "Converted batch"
        );
        Ok(frames)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("error parsing metrics: {0}")]
    Parse(#[from] ParseError),

    #[error("value convert error: {0}")]
    Conversion(#[from] ConversionError),

    /// Records under one frame key disagree on a field's type. This is a
    /// contract violation by the input feed and is not recoverable here:
    /// enable `float_numbers` or fix the source.
    #[error("type conflict in frame {frame}: field {field} is {existing}, got {incoming}")]
    TypeConflict {
        frame: String,
        field: String,
        existing: FieldType,
        incoming: FieldType,
    },

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl ConvertError {
    /// True for errors that signal inconsistent input rather than bad data
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConvertError::TypeConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldValue, Value};

    fn load_test_data(name: &str) -> &'static [u8] {
        let data: &'static str = match name {
            "single_metric" => include_str!("../../testdata/single_metric.txt"),
            "single_metric_different_field_order" => {
                include_str!("../../testdata/single_metric_different_field_order.txt")
            }
            "same_metrics_same_labels_different_time" => {
                include_str!("../../testdata/same_metrics_same_labels_different_time.txt")
            }
            "same_metrics_different_labels_different_time" => {
                include_str!("../../testdata/same_metrics_different_labels_different_time.txt")
            }
            "same_metrics_different_labels_same_time" => {
                include_str!("../../testdata/same_metrics_different_labels_same_time.txt")
            }
            "mixed_number_types" => include_str!("../../testdata/mixed_number_types.txt"),
            "part_metrics_different_labels_different_time" => {
                include_str!("../../testdata/part_metrics_different_labels_different_time.txt")
            }
            other => panic!("unknown test data {}", other),
        };
        assert!(!data.is_empty());
        data.as_bytes()
    }

    fn converter(use_labels_column: bool, float_numbers: bool) -> Converter {
        Converter::new(
            ConverterConfig::default()
                .with_labels_column(use_labels_column)
                .with_float_numbers(float_numbers),
        )
    }

    #[test]
    fn test_config_builder() {
        let c = converter(true, false);
        assert!(c.config().use_labels_column);
        assert!(!c.config().float_numbers);
        assert_eq!(ConverterConfig::default(), converter(false, false).config);
    }

    #[test]
    fn test_convert_per_time() {
        // (name, fields per frame, rows per frame, frames)
        let cases = [
            ("single_metric", 6, 1, 1),
            ("same_metrics_same_labels_different_time", 6, 1, 3),
            ("same_metrics_different_labels_different_time", 6, 1, 2),
            ("same_metrics_different_labels_same_time", 131, 1, 1),
        ];

        for (name, num_fields, rows, num_frames) in cases {
            let frames = converter(false, false)
                .convert(load_test_data(name))
                .unwrap();
            assert_eq!(frames.len(), num_frames, "{}", name);
            for frame in &frames {
                assert_eq!(frame.fields().len(), num_fields, "{}", name);
                assert_eq!(frame.fields()[0].len(), rows, "{}", name);
                assert_eq!(frame.fields()[0].name, TIME_FIELD);
                frame.to_json_bytes().unwrap();
            }
        }
    }

    #[test]
    fn test_convert_labels_column() {
        // time + labels + fields + one column per tag key
        let cases = [
            ("single_metric", 9, 1, 1),
            ("same_metrics_same_labels_different_time", 9, 3, 1),
            ("same_metrics_different_labels_different_time", 9, 2, 1),
            ("same_metrics_different_labels_same_time", 15, 13, 1),
        ];

        for (name, num_fields, rows, num_frames) in cases {
            let frames = converter(true, false)
                .convert(load_test_data(name))
                .unwrap();
            assert_eq!(frames.len(), num_frames, "{}", name);
            for frame in &frames {
                assert_eq!(frame.fields().len(), num_fields, "{}", name);
                assert_eq!(frame.len(), rows, "{}", name);
                assert_eq!(frame.fields()[1].name, LABELS_FIELD);
                frame.validate().unwrap();
                frame.to_json_bytes().unwrap();
            }
        }
    }

    #[test]
    fn test_field_order_independence() {
        let c = converter(false, false);
        let first = c.convert(load_test_data("single_metric")).unwrap();
        let second = c
            .convert(load_test_data("single_metric_different_field_order"))
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].to_json(), second[0].to_json());
    }

    #[test]
    fn test_order_stability() {
        let c = converter(false, false);
        let data = load_test_data("same_metrics_different_labels_different_time");
        let first = c.convert(data).unwrap();
        let second = c.convert(data).unwrap();
        assert_eq!(first, second);

        let mixed = b"b v=1 1\na v=1 1\nb v=2 2\na v=3 1\n";
        let frames = c.convert(mixed).unwrap();
        let keys: Vec<(&str, Value)> = frames
            .iter()
            .map(|f| (f.name(), f.fields()[0].get(0)))
            .collect();
        assert_eq!(
            keys,
            vec![("b", Value::Time(1)), ("a", Value::Time(1)), ("b", Value::Time(2))]
        );
    }

    #[test]
    fn test_mixed_number_types_conflict_in_labels_column() {
        let err = converter(true, false)
            .convert(load_test_data("mixed_number_types"))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ConvertError::TypeConflict { ref field, .. } if field == "value"));
    }

    #[test]
    fn test_mixed_number_types_float_numbers() {
        let frames = converter(false, true)
            .convert(load_test_data("mixed_number_types"))
            .unwrap();
        assert_eq!(frames.len(), 2);

        let frames = converter(true, true)
            .convert(load_test_data("mixed_number_types"))
            .unwrap();
        assert_eq!(frames.len(), 1);
        let value = frames[0].field("value").unwrap();
        assert_eq!(value.field_type(), FieldType::NullableFloat64);
        assert_eq!(value.get(0), Value::Float64(3.0));
        assert_eq!(value.get(1), Value::Float64(4.5));
    }

    #[test]
    fn test_same_key_conflict_in_per_time_mode() {
        let err = converter(false, false)
            .convert(b"temp,host=a x=3i 1\ntemp,host=a x=4.5 1\n")
            .unwrap_err();
        assert!(matches!(err, ConvertError::TypeConflict { .. }));

        let frames = converter(false, true)
            .convert(b"temp,host=a x=3i 1\ntemp,host=a x=4.5 1\n")
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 2);
        assert_eq!(
            frames[0].field("x").unwrap().field_type(),
            FieldType::NullableFloat64
        );
    }

    #[test]
    fn test_conflict_across_tag_sets_in_per_time_mode() {
        let data = b"temp,host=a x=3i 1\ntemp,host=b x=4.5 1\n";
        let err = converter(false, false).convert(data).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            ConvertError::TypeConflict {
                ref field,
                existing: FieldType::NullableInt64,
                incoming: FieldType::NullableFloat64,
                ..
            } if field == "x"
        ));

        let frames = converter(false, true).convert(data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields().len(), 3);
    }

    #[test]
    fn test_reserved_field_names_keep_columns_unique() {
        let frames = converter(true, false)
            .convert(b"m,host=a time=5i,labels=\"x\" 1\n")
            .unwrap();
        let names: Vec<&str> = frames[0].fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["time", "labels", "field.labels", "field.time", "host"]
        );
        assert_eq!(frames[0].field("time").unwrap().field_type(), FieldType::Time);
    }

    #[test]
    fn test_part_input() {
        let data = load_test_data("part_metrics_different_labels_different_time");
        assert_eq!(converter(false, false).convert(data).unwrap().len(), 2);

        let frames = converter(true, false).convert(data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 2);
    }

    #[test]
    fn test_nullability_in_labels_column() {
        let frames = converter(true, false)
            .convert(b"cpu,host=a user=1.5,idle=90 1\ncpu,host=b user=2.5 2\n")
            .unwrap();
        let idle = frames[0].field("idle").unwrap();
        assert_eq!(idle.field_type(), FieldType::NullableFloat64);
        assert_eq!(idle.get(0), Value::Float64(90.0));
        assert_eq!(idle.get(1), Value::Null);
    }

    #[test]
    fn test_wide_consolidation_shape() {
        let metrics: Vec<Metric> = (0..4)
            .map(|i| {
                Metric::new("net", i)
                    .with_tag("iface", "eth0")
                    .with_tag("host", "a")
                    .with_field("rx", FieldValue::Int64(i * 10))
                    .with_field("tx", FieldValue::Int64(i))
            })
            .collect();

        let frames = converter(true, false).convert_metrics(&metrics).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4);
        // time + labels + 2 fields + 2 tag keys
        assert_eq!(frames[0].fields().len(), 6);
        assert_eq!(
            frames[0].field("labels").unwrap().get(3),
            Value::String("host=a, iface=eth0".into())
        );
    }

    #[test]
    fn test_golden_per_time() {
        let frames = converter(false, false)
            .convert(load_test_data("same_metrics_different_labels_same_time"))
            .unwrap();
        let golden: serde_json::Value =
            serde_json::from_str(include_str!("../../testdata/golden_per_time.json")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to_json(), golden);
    }

    #[test]
    fn test_golden_labels_column() {
        let frames = converter(true, false)
            .convert(load_test_data("same_metrics_different_labels_same_time"))
            .unwrap();
        let golden: serde_json::Value =
            serde_json::from_str(include_str!("../../testdata/golden_labels_column.json"))
                .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to_json(), golden);
    }

    #[test]
    fn test_parse_errors() {
        let err = converter(false, false).convert(b"cpu usage=").unwrap_err();
        assert!(matches!(err, ConvertError::Parse(_)));
        assert!(!err.is_fatal());

        let err = converter(false, false).convert(b"cpu usage=1 1\nbroken").unwrap_err();
        assert!(matches!(err, ConvertError::Parse(ParseError::Syntax { line: 2, .. })));
    }

    #[test]
    fn test_empty_batch() {
        assert!(converter(false, false).convert(b"").unwrap().is_empty());
        assert!(converter(true, true).convert(b"\n").unwrap().is_empty());
    }

    #[test]
    fn test_custom_decoder() {
        struct Fixed;

        impl MetricDecoder for Fixed {
            fn decode(&self, _buf: &[u8]) -> Result<Vec<Metric>, ParseError> {
                Ok(vec![Metric::new("fixed", 7).with_field("ok", FieldValue::Bool(true))])
            }
        }

        let c = Converter::with_decoder(ConverterConfig::default(), Fixed);
        let frames = c.convert(b"ignored").unwrap();
        assert_eq!(frames[0].name(), "fixed");
        assert_eq!(frames[0].field("ok").unwrap().get(0), Value::Bool(true));
    }
}
