//! In-progress frames
//!
//! Columns are padded lazily: a column may be shorter than the frame's row
//! count while records are folded in, and is filled with nulls when it is
//! written to or when the frame is finished.

use fxhash::FxHashMap;

use super::values::{convert_value, target_type};
use super::ConvertError;
use crate::data::{Column, Field, FieldType, Frame, Labels, Value};
use crate::metric::{labels_to_string, Metric};

pub const TIME_FIELD: &str = "time";
pub const LABELS_FIELD: &str = "labels";

/// Prefixes for columns whose name clashes with an earlier column
const TAG_COLUMN_PREFIX: &str = "tag.";
const FIELD_COLUMN_PREFIX: &str = "field.";

/// Frame collecting every record of one (name, timestamp) pair. Each field
/// column carries the record's tag set.
#[derive(Debug)]
pub struct PerTimeFrame {
    name: String,
    time: Column,
    fields: Vec<Field>,
    /// tag set -> field name -> index into `fields`
    index: FxHashMap<Labels, FxHashMap<String, usize>>,
    /// Resolved type per field name, whatever the tag set
    types: FxHashMap<String, FieldType>,
}

impl PerTimeFrame {
    /// New frame with a one-row time column
    pub fn new(metric: &Metric) -> Self {
        Self {
            name: metric.name.clone(),
            time: Column::Time(vec![metric.timestamp]),
            fields: Vec::new(),
            index: FxHashMap::default(),
            types: FxHashMap::default(),
        }
    }

    fn rows(&self) -> usize {
        self.time.len()
    }

    pub fn fold(&mut self, metric: &Metric, float_numbers: bool) -> Result<(), ConvertError> {
        let columns = self.index.get(&metric.tags);

        // Resolve types before touching any column
        let mut planned = Vec::with_capacity(metric.fields.len());
        let mut recurs = false;
        for (key, value) in &metric.fields {
            let target = target_type(value, float_numbers);
            if let Some(&known) = self.types.get(key) {
                check_type(&self.name, key, known, target)?;
            }
            let existing = columns.and_then(|c| c.get(key)).copied();
            if let Some(idx) = existing {
                recurs |= self.fields[idx].column.is_set(self.rows() - 1);
            }
            planned.push((key, value, target, existing));
        }

        // A field identity already filled in the current row opens a new row
        if recurs {
            self.time.push(Value::Time(metric.timestamp))?;
        }
        let row = self.rows() - 1;

        for (key, value, target, existing) in planned {
            let cell = convert_value(key, value, target)?;
            let idx = match existing {
                Some(idx) => idx,
                None => {
                    self.fields.push(
                        Field::new(key.clone(), Column::new(target))
                            .with_labels(metric.tags.clone()),
                    );
                    let idx = self.fields.len() - 1;
                    self.index
                        .entry(metric.tags.clone())
                        .or_default()
                        .insert(key.clone(), idx);
                    self.types.insert(key.clone(), target);
                    idx
                }
            };
            let column = &mut self.fields[idx].column;
            column.extend_nulls(row)?;
            column.push(cell)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Frame, ConvertError> {
        let rows = self.rows();
        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(Field::new(TIME_FIELD, self.time));
        for mut field in self.fields {
            field.column.extend_nulls(rows)?;
            field.name = column_name(FIELD_COLUMN_PREFIX, &field, &fields);
            fields.push(field);
        }
        Ok(Frame::new(self.name, fields)?)
    }
}

/// Frame collecting every record of one metric name, one row per record.
/// Timestamps and tags become ordinary columns.
#[derive(Debug)]
pub struct WideFrame {
    name: String,
    time: Column,
    row_tags: Vec<Labels>,
    /// Tag keys in first-seen order
    tag_keys: Vec<String>,
    fields: Vec<Field>,
    index: FxHashMap<String, usize>,
}

impl WideFrame {
    pub fn new(metric: &Metric) -> Self {
        Self {
            name: metric.name.clone(),
            time: Column::new(FieldType::Time),
            row_tags: Vec::new(),
            tag_keys: Vec::new(),
            fields: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn fold(&mut self, metric: &Metric, float_numbers: bool) -> Result<(), ConvertError> {
        for (key, value) in &metric.fields {
            if let Some(&idx) = self.index.get(key) {
                let target = target_type(value, float_numbers);
                check_type(&self.name, key, self.fields[idx].field_type(), target)?;
            }
        }

        let row = self.time.len();
        self.time.push(Value::Time(metric.timestamp))?;
        for key in metric.tags.keys() {
            if !self.tag_keys.contains(key) {
                self.tag_keys.push(key.clone());
            }
        }
        self.row_tags.push(metric.tags.clone());

        for (key, value) in &metric.fields {
            let target = target_type(value, float_numbers);
            let cell = convert_value(key, value, target)?;
            let idx = match self.index.get(key) {
                Some(&idx) => idx,
                None => {
                    self.fields.push(Field::new(key.clone(), Column::new(target)));
                    self.index.insert(key.clone(), self.fields.len() - 1);
                    self.fields.len() - 1
                }
            };
            let column = &mut self.fields[idx].column;
            column.extend_nulls(row)?;
            column.push(cell)?;
        }
        Ok(())
    }

    /// Pad field columns, then flatten tags into one column per key and add
    /// the labels column.
    pub fn finish(self) -> Result<Frame, ConvertError> {
        let rows = self.time.len();

        let mut labels = Column::with_capacity(FieldType::String, rows);
        for tags in &self.row_tags {
            labels.push(Value::String(labels_to_string(tags)))?;
        }

        let mut fields = Vec::with_capacity(self.fields.len() + self.tag_keys.len() + 2);
        fields.push(Field::new(TIME_FIELD, self.time));
        fields.push(Field::new(LABELS_FIELD, labels));

        for mut field in self.fields {
            field.column.extend_nulls(rows)?;
            field.name = column_name(FIELD_COLUMN_PREFIX, &field, &fields);
            fields.push(field);
        }

        for key in &self.tag_keys {
            let mut column = Column::with_capacity(FieldType::NullableString, rows);
            for tags in &self.row_tags {
                match tags.get(key) {
                    Some(v) => column.push(Value::String(v.clone()))?,
                    None => column.push_null()?,
                }
            }
            let mut field = Field::new(key.clone(), column);
            field.name = column_name(TAG_COLUMN_PREFIX, &field, &fields);
            fields.push(field);
        }

        Ok(Frame::new(self.name, fields)?)
    }
}

/// Name for `field` that no column in `taken` already uses with the same
/// labels, prefixing until it is unique
fn column_name(prefix: &str, field: &Field, taken: &[Field]) -> String {
    let mut name = field.name.clone();
    while taken
        .iter()
        .any(|f| f.name == name && f.labels == field.labels)
    {
        name = format!("{}{}", prefix, name);
    }
    name
}

fn check_type(
    frame: &str,
    field: &str,
    existing: FieldType,
    incoming: FieldType,
) -> Result<(), ConvertError> {
    if existing == incoming {
        return Ok(());
    }
    Err(ConvertError::TypeConflict {
        frame: frame.to_string(),
        field: field.to_string(),
        existing,
        incoming,
    })
}
