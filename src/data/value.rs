use std::fmt;

/// Value of a single metric field as produced by the decoder
#[derive(Debug, Clone)]
pub enum FieldValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl FieldValue {
    /// Name of the union case, used in conversion errors
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int64(_) => "int64",
            FieldValue::Float64(_) => "float64",
            FieldValue::String(_) => "string",
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int64(a), FieldValue::Int64(b)) => a == b,
            (FieldValue::Float64(a), FieldValue::Float64(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int64(i) => write!(f, "{}", i),
            FieldValue::Float64(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// A single cell stored in a frame column
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    /// Unix nanoseconds
    Time(i64),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Time(_) => "time",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JSON form used by frame serialization. Time is written as epoch
    /// milliseconds.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int64(i) => serde_json::json!(i),
            Value::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Time(t) => serde_json::json!(t.div_euclid(1_000_000)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t),
        }
    }
}

/// Semantic type of a frame column. `Time` and `String` back the synthetic
/// time and labels columns; metric fields always land in nullable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Time,
    String,
    NullableBool,
    NullableInt64,
    NullableFloat64,
    NullableString,
}

impl FieldType {
    /// Nullable column type matching the union case of a field value
    pub fn for_value(value: &FieldValue) -> Self {
        match value {
            FieldValue::Bool(_) => FieldType::NullableBool,
            FieldValue::Int64(_) => FieldType::NullableInt64,
            FieldValue::Float64(_) => FieldType::NullableFloat64,
            FieldValue::String(_) => FieldType::NullableString,
        }
    }

    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            FieldType::NullableBool
                | FieldType::NullableInt64
                | FieldType::NullableFloat64
                | FieldType::NullableString
        )
    }

    /// Storage type name, without nullability
    pub fn item_type(self) -> &'static str {
        match self {
            FieldType::Time => "time",
            FieldType::NullableBool => "bool",
            FieldType::NullableInt64 => "int64",
            FieldType::NullableFloat64 => "float64",
            FieldType::String | FieldType::NullableString => "string",
        }
    }

    /// Coarse type reported in the serialized schema
    pub fn json_type(self) -> &'static str {
        match self {
            FieldType::Time => "time",
            FieldType::NullableBool => "boolean",
            FieldType::String | FieldType::NullableString => "string",
            _ => "number",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable() {
            write!(f, "nullable {}", self.item_type())
        } else {
            write!(f, "{}", self.item_type())
        }
    }
}
