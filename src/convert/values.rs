//! Field value conversion into column cells
//!
//! Each nullable column type has exactly one converter. Strings pass through
//! (any value is rendered), numbers pass through or are parsed from strings,
//! booleans pass through or are parsed from `true`/`false`.

use crate::data::{FieldType, FieldValue, Value};

/// Column type a field value lands in. Always nullable, so a field missing
/// from some records can be represented as null.
pub fn target_type(value: &FieldValue, float_numbers: bool) -> FieldType {
    let field_type = FieldType::for_value(value);
    if float_numbers && field_type == FieldType::NullableInt64 {
        FieldType::NullableFloat64
    } else {
        field_type
    }
}

/// Convert `value` into a cell of column type `target`
pub fn convert_value(
    field: &str,
    value: &FieldValue,
    target: FieldType,
) -> Result<Value, ConversionError> {
    let converted = match target {
        FieldType::String | FieldType::NullableString => Some(to_string(value)),
        FieldType::NullableFloat64 => to_float64(value),
        FieldType::NullableInt64 => to_int64(value),
        FieldType::NullableBool => to_bool(value),
        FieldType::Time => None,
    };

    converted.ok_or_else(|| ConversionError {
        field: field.to_string(),
        value: value.to_string(),
        kind: value.kind(),
        target,
    })
}

fn to_string(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn to_float64(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Float64(f) => Some(Value::Float64(*f)),
        FieldValue::Int64(i) => Some(Value::Float64(*i as f64)),
        FieldValue::String(s) => s.trim().parse::<f64>().ok().map(Value::Float64),
        FieldValue::Bool(_) => None,
    }
}

fn to_int64(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Int64(i) => Some(Value::Int64(*i)),
        // Only integral floats that fit survive
        FieldValue::Float64(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(Value::Int64(*f as i64))
        }
        FieldValue::String(s) => s.trim().parse::<i64>().ok().map(Value::Int64),
        _ => None,
    }
}

fn to_bool(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Bool(b) => Some(Value::Bool(*b)),
        FieldValue::String(s) => s.trim().parse::<bool>().ok().map(Value::Bool),
        _ => None,
    }
}

/// A field value that cannot be stored in its column type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert field {field}={value} ({kind}) to {target}")]
pub struct ConversionError {
    pub field: String,
    pub value: String,
    pub kind: &'static str,
    pub target: FieldType,
}
