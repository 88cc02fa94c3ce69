use super::frame::FrameError;
use super::value::{FieldType, Value};

/// Typed column storage. Nullable variants keep per-row absence as `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Unix nanoseconds
    Time(Vec<i64>),
    String(Vec<String>),
    NullableBool(Vec<Option<bool>>),
    NullableInt64(Vec<Option<i64>>),
    NullableFloat64(Vec<Option<f64>>),
    NullableString(Vec<Option<String>>),
}

impl Column {
    pub fn new(field_type: FieldType) -> Self {
        Self::with_capacity(field_type, 0)
    }

    pub fn with_capacity(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Time => Column::Time(Vec::with_capacity(capacity)),
            FieldType::String => Column::String(Vec::with_capacity(capacity)),
            FieldType::NullableBool => Column::NullableBool(Vec::with_capacity(capacity)),
            FieldType::NullableInt64 => Column::NullableInt64(Vec::with_capacity(capacity)),
            FieldType::NullableFloat64 => Column::NullableFloat64(Vec::with_capacity(capacity)),
            FieldType::NullableString => Column::NullableString(Vec::with_capacity(capacity)),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Column::Time(_) => FieldType::Time,
            Column::String(_) => FieldType::String,
            Column::NullableBool(_) => FieldType::NullableBool,
            Column::NullableInt64(_) => FieldType::NullableInt64,
            Column::NullableFloat64(_) => FieldType::NullableFloat64,
            Column::NullableString(_) => FieldType::NullableString,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Time(v) => v.len(),
            Column::String(v) => v.len(),
            Column::NullableBool(v) => v.len(),
            Column::NullableInt64(v) => v.len(),
            Column::NullableFloat64(v) => v.len(),
            Column::NullableString(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a value. The value must match the column type exactly; nulls are
    /// accepted by nullable columns only.
    pub fn push(&mut self, value: Value) -> Result<(), FrameError> {
        let field_type = self.field_type();
        match (self, value) {
            (Column::Time(v), Value::Time(t)) => v.push(t),
            (Column::String(v), Value::String(s)) => v.push(s),
            (Column::NullableBool(v), Value::Bool(b)) => v.push(Some(b)),
            (Column::NullableBool(v), Value::Null) => v.push(None),
            (Column::NullableInt64(v), Value::Int64(i)) => v.push(Some(i)),
            (Column::NullableInt64(v), Value::Null) => v.push(None),
            (Column::NullableFloat64(v), Value::Float64(f)) => v.push(Some(f)),
            (Column::NullableFloat64(v), Value::Null) => v.push(None),
            (Column::NullableString(v), Value::String(s)) => v.push(Some(s)),
            (Column::NullableString(v), Value::Null) => v.push(None),
            (_, value) => {
                return Err(FrameError::TypeMismatch {
                    expected: field_type,
                    actual: value.type_name(),
                })
            }
        }
        Ok(())
    }

    pub fn push_null(&mut self) -> Result<(), FrameError> {
        self.push(Value::Null)
    }

    /// Pad with nulls up to `len` rows
    pub fn extend_nulls(&mut self, len: usize) -> Result<(), FrameError> {
        while self.len() < len {
            self.push_null()?;
        }
        Ok(())
    }

    /// Get value at index
    pub fn get(&self, index: usize) -> Value {
        let value = match self {
            Column::Time(v) => v.get(index).copied().map(Value::Time),
            Column::String(v) => v.get(index).cloned().map(Value::String),
            Column::NullableBool(v) => v.get(index).copied().flatten().map(Value::Bool),
            Column::NullableInt64(v) => v.get(index).copied().flatten().map(Value::Int64),
            Column::NullableFloat64(v) => v.get(index).copied().flatten().map(Value::Float64),
            Column::NullableString(v) => v.get(index).cloned().flatten().map(Value::String),
        };
        value.unwrap_or(Value::Null)
    }

    /// Whether the row holds a non-null value
    pub fn is_set(&self, index: usize) -> bool {
        !self.get(index).is_null()
    }

    /// Create an iterator over column values
    pub fn iter(&self) -> ColumnIter<'_> {
        ColumnIter {
            column: self,
            index: 0,
        }
    }
}

pub struct ColumnIter<'a> {
    column: &'a Column,
    index: usize,
}

impl<'a> Iterator for ColumnIter<'a> {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.column.len() {
            return None;
        }
        let value = self.column.get(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.column.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for ColumnIter<'a> {}
