use super::column::Column;
use super::value::{FieldType, Value};
use std::collections::BTreeMap;

/// Tag set attached to a field
pub type Labels = BTreeMap<String, String>;

/// A named column of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// Originating tag set; empty for wide frames
    pub labels: Labels,
    pub column: Column,
}

impl Field {
    pub fn new(name: impl Into<String>, column: Column) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            column,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.column.field_type()
    }

    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    pub fn get(&self, index: usize) -> Value {
        self.column.get(index)
    }

    fn schema_json(&self) -> serde_json::Value {
        let field_type = self.field_type();
        let mut schema = serde_json::json!({
            "name": self.name,
            "type": field_type.json_type(),
            "typeInfo": {
                "frame": field_type.item_type(),
                "nullable": field_type.is_nullable(),
            },
        });
        if !self.labels.is_empty() {
            schema["labels"] = serde_json::json!(self.labels);
        }
        schema
    }
}

/// Immutable columnar table handed out by the converter
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    name: String,
    fields: Vec<Field>,
}

impl Frame {
    /// Build a frame from finished fields. All fields must have the same length.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self, FrameError> {
        let frame = Self {
            name: name.into(),
            fields,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Row count
    pub fn len(&self) -> usize {
        self.fields.first().map(Field::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every field has the frame's row count
    pub fn validate(&self) -> Result<(), FrameError> {
        let rows = self.len();
        for field in &self.fields {
            if field.len() != rows {
                return Err(FrameError::LengthMismatch {
                    field: field.name.clone(),
                    expected: rows,
                    actual: field.len(),
                });
            }
        }
        Ok(())
    }

    /// Serialize into schema + column-major data
    pub fn to_json(&self) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = self.fields.iter().map(Field::schema_json).collect();
        let values: Vec<Vec<serde_json::Value>> = self
            .fields
            .iter()
            .map(|f| f.column.iter().map(|v| v.to_json()).collect())
            .collect();

        serde_json::json!({
            "schema": {
                "name": self.name,
                "fields": fields,
            },
            "data": {
                "values": values,
            },
        })
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, FrameError> {
        Ok(serde_json::to_vec(&self.to_json())?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Field {field} has {actual} rows, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot store {actual} value in {expected} column")]
    TypeMismatch {
        expected: FieldType,
        actual: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
