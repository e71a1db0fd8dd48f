use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{DbError, Result};
use crate::storage::TableIterator;
use crate::tuple::{decode_row, Row, Schema, Value};

use super::{Expression, Operator};

/// Full scan of a table heap.
///
/// Rows carry the record id they were read from. A pushed-down predicate
/// is applied before a row leaves the operator. Between calls to `next` the
/// scan pins at most one page and latches none.
pub struct SeqScan {
    table: Arc<TableInfo>,
    predicate: Option<Expression>,
    iter: Option<TableIterator>,
}

impl SeqScan {
    pub fn new(table: Arc<TableInfo>, predicate: Option<Expression>) -> Self {
        Self {
            table,
            predicate,
            iter: None,
        }
    }
}

impl Operator for SeqScan {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.iter = Some(self.table.heap().iter());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        for item in iter.by_ref() {
            let (rid, bytes) = item?;
            let row = Row::with_rid(decode_row(self.table.schema(), &bytes)?, rid);
            match &self.predicate {
                Some(predicate) if !predicate.matches(&row)? => continue,
                _ => return Ok(Some(row)),
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.iter = None;
    }
}

/// Emits literal rows.
pub struct Values {
    schema: Schema,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl Values {
    /// Fails with `SchemaMismatch` if a row does not have one value per
    /// column.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != schema.column_count()) {
            return Err(DbError::SchemaMismatch(format!(
                "literal row has {} values, schema has {} columns",
                bad.len(),
                schema.column_count()
            )));
        }
        Ok(Self {
            schema,
            rows,
            cursor: 0,
        })
    }
}

impl Operator for Values {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.cursor).cloned().map(Row::new);
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.cursor = self.rows.len();
    }
}
