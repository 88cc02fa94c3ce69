//! Decoded metric record

use crate::data::{FieldValue, Labels};
use std::collections::BTreeMap;

/// One decoded observation. Tags and fields are kept sorted by key so the
/// order they were written in does not leak into the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    /// Unix nanoseconds
    pub timestamp: i64,
    pub tags: Labels,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Metric {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            tags: Labels::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Render a tag set as `k1=v1, k2=v2`
pub fn labels_to_string(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
