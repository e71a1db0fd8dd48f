use crate::common::{DbError, RecordId, Result};

use super::Value;

/// A row flowing between operators.
///
/// Rows read from a table carry the record id they were read from so that
/// delete and update know which tuple to touch.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    pub fn with_rid(values: Vec<Value>, rid: RecordId) -> Self {
        Self {
            values,
            rid: Some(rid),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or(DbError::ColumnNotFound(index))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Concatenates two rows; the result has no record id.
    pub fn concat(&self, right: &Row) -> Row {
        let mut values = Vec::with_capacity(self.len() + right.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&right.values);
        Row::new(values)
    }

    /// This row followed by `width` nulls.
    pub fn pad_nulls(&self, width: usize) -> Row {
        let mut values = self.values.clone();
        values.resize(self.len() + width, Value::Null);
        Row::new(values)
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}
