use std::sync::Arc;

use tracing::debug;

use crate::catalog::TableInfo;
use crate::common::{DbError, RecordId, Result};
use crate::tuple::{encode_row, DataType, Row, Schema, Value};

use super::{drain, BoxedOperator, Expression, Operator};

/// Schema of the single row emitted by write operators.
fn count_schema() -> Schema {
    Schema::builder().column("count", DataType::Integer).build()
}

/// Shared driver of the write operators: the child is drained before any
/// mutation happens, then `apply` runs once and its count is emitted as the
/// only row.
struct WriteState {
    schema: Schema,
    done: bool,
}

impl WriteState {
    fn new() -> Self {
        Self {
            schema: count_schema(),
            done: false,
        }
    }

    fn run(
        &mut self,
        child: &mut BoxedOperator,
        apply: impl FnOnce(Vec<Row>) -> Result<usize>,
    ) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let rows = drain(child)?;
        // Input is buffered; the child's pages are no longer needed
        child.close();
        let count = apply(rows)?;
        Ok(Some(Row::new(vec![Value::Integer(count as i64)])))
    }
}

fn record_id(row: &Row) -> Result<RecordId> {
    row.rid().ok_or(DbError::MissingRecordId)
}

/// Inserts every child row into a table.
pub struct Insert {
    table: Arc<TableInfo>,
    child: BoxedOperator,
    state: WriteState,
}

impl Insert {
    pub fn new(table: Arc<TableInfo>, child: BoxedOperator) -> Self {
        Self {
            table,
            child,
            state: WriteState::new(),
        }
    }
}

impl Operator for Insert {
    fn schema(&self) -> &Schema {
        &self.state.schema
    }

    fn open(&mut self) -> Result<()> {
        self.state.done = false;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let table = &self.table;
        self.state.run(&mut self.child, |rows| {
            for row in &rows {
                let bytes = encode_row(table.schema(), row.values())?;
                table.heap().insert_tuple(&bytes)?;
            }
            debug!(table = table.name(), rows = rows.len(), "inserted rows");
            Ok(rows.len())
        })
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Deletes the rows produced by the child, identified by their record ids.
pub struct Delete {
    table: Arc<TableInfo>,
    child: BoxedOperator,
    state: WriteState,
}

impl Delete {
    pub fn new(table: Arc<TableInfo>, child: BoxedOperator) -> Self {
        Self {
            table,
            child,
            state: WriteState::new(),
        }
    }
}

impl Operator for Delete {
    fn schema(&self) -> &Schema {
        &self.state.schema
    }

    fn open(&mut self) -> Result<()> {
        self.state.done = false;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let table = &self.table;
        self.state.run(&mut self.child, |rows| {
            let rids = rows.iter().map(record_id).collect::<Result<Vec<_>>>()?;
            for &rid in &rids {
                table.heap().delete_tuple(rid)?;
            }
            debug!(table = table.name(), rows = rids.len(), "deleted rows");
            Ok(rids.len())
        })
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Replaces each child row with the values of `expressions` evaluated over
/// it. One expression per table column.
pub struct Update {
    table: Arc<TableInfo>,
    child: BoxedOperator,
    expressions: Vec<Expression>,
    state: WriteState,
}

impl Update {
    pub fn new(
        table: Arc<TableInfo>,
        child: BoxedOperator,
        expressions: Vec<Expression>,
    ) -> Result<Self> {
        if expressions.len() != table.schema().column_count() {
            return Err(DbError::SchemaMismatch(format!(
                "update of {} needs {} expressions, got {}",
                table.name(),
                table.schema().column_count(),
                expressions.len()
            )));
        }
        Ok(Self {
            table,
            child,
            expressions,
            state: WriteState::new(),
        })
    }
}

impl Operator for Update {
    fn schema(&self) -> &Schema {
        &self.state.schema
    }

    fn open(&mut self) -> Result<()> {
        self.state.done = false;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let table = &self.table;
        let expressions = &self.expressions;
        self.state.run(&mut self.child, |rows| {
            // Evaluate everything first so a bad row leaves the table untouched
            let updates = rows
                .iter()
                .map(|row| {
                    let values = expressions
                        .iter()
                        .map(|expr| expr.evaluate(row))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((record_id(row)?, encode_row(table.schema(), &values)?))
                })
                .collect::<Result<Vec<_>>>()?;

            for (rid, bytes) in &updates {
                table.heap().update_tuple(*rid, bytes)?;
            }
            debug!(table = table.name(), rows = updates.len(), "updated rows");
            Ok(updates.len())
        })
    }

    fn close(&mut self) {
        self.child.close();
    }
}
