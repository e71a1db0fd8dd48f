use std::collections::HashMap;

use tracing::trace;

use crate::common::Result;
use crate::tuple::{Column, Row, Schema, Value};

use super::{drain, BoxedOperator, Expression, Operator};

/// Output schema of a join: left columns then right columns, the right side
/// made nullable for outer joins.
fn join_schema(left: &Schema, right: &Schema, outer: bool) -> Schema {
    if !outer {
        return left.join(right);
    }
    let padded: Vec<Column> = right.columns().map(Column::to_nullable).collect();
    left.join(&Schema::new(padded))
}

/// Nested loop join.
///
/// The right input is buffered on the first `next` and rescanned for every
/// left row.
/// The optional predicate sees the concatenated row. With `outer` set, a
/// left row without any match is emitted once, padded with nulls.
pub struct NestedLoopJoin {
    left: BoxedOperator,
    right: BoxedOperator,
    predicate: Option<Expression>,
    outer: bool,
    schema: Schema,
    right_rows: Vec<Row>,
    buffered: bool,
    current_left: Option<Row>,
    right_pos: usize,
    matched: bool,
}

impl NestedLoopJoin {
    pub fn new(
        left: BoxedOperator,
        right: BoxedOperator,
        predicate: Option<Expression>,
        outer: bool,
    ) -> Self {
        let schema = join_schema(left.schema(), right.schema(), outer);
        Self {
            left,
            right,
            predicate,
            outer,
            schema,
            right_rows: Vec::new(),
            buffered: false,
            current_left: None,
            right_pos: 0,
            matched: false,
        }
    }
}

impl Operator for NestedLoopJoin {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.current_left = None;
        self.right_rows.clear();
        self.buffered = false;
        self.left.open()?;
        self.right.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.buffered {
            self.right_rows = drain(&mut self.right)?;
            // Buffered: release the right side's pages now
            self.right.close();
            self.buffered = true;
            trace!(rows = self.right_rows.len(), "buffered nested loop inner side");
        }
        loop {
            if self.current_left.is_none() {
                match self.left.next()? {
                    Some(row) => {
                        self.current_left = Some(row);
                        self.right_pos = 0;
                        self.matched = false;
                    }
                    None => return Ok(None),
                }
            }
            let Some(left) = self.current_left.as_ref() else {
                continue;
            };

            while let Some(right) = self.right_rows.get(self.right_pos) {
                self.right_pos += 1;
                let candidate = left.concat(right);
                let keep = match &self.predicate {
                    Some(predicate) => predicate.matches(&candidate)?,
                    None => true,
                };
                if keep {
                    self.matched = true;
                    return Ok(Some(candidate));
                }
            }

            let unmatched = self.outer && !self.matched;
            let padded = unmatched.then(|| left.pad_nulls(self.right.schema().column_count()));
            self.current_left = None;
            if padded.is_some() {
                return Ok(padded);
            }
        }
    }

    fn close(&mut self) {
        self.right_rows.clear();
        self.buffered = false;
        self.current_left = None;
        self.left.close();
        self.right.close();
    }
}

/// Equi-join through an in-memory hash table.
///
/// The table is built from the right input on the first `next`, keyed by
/// the right key expressions; the left input probes it. A key containing
/// null or NaN never matches. With `outer` set, unmatched left rows are padded with nulls.
pub struct HashJoin {
    left: BoxedOperator,
    right: BoxedOperator,
    left_keys: Vec<Expression>,
    right_keys: Vec<Expression>,
    outer: bool,
    schema: Schema,
    table: HashMap<Vec<Value>, Vec<Row>>,
    built: bool,
    /// Left row being probed, its key and the next match to emit
    probe: Option<(Row, Vec<Value>, usize)>,
}

impl HashJoin {
    pub fn new(
        left: BoxedOperator,
        right: BoxedOperator,
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
        outer: bool,
    ) -> Self {
        let schema = join_schema(left.schema(), right.schema(), outer);
        Self {
            left,
            right,
            left_keys,
            right_keys,
            outer,
            schema,
            table: HashMap::new(),
            built: false,
            probe: None,
        }
    }

    /// Evaluates a key, None if any part of it is null or NaN.
    fn key(keys: &[Expression], row: &Row) -> Result<Option<Vec<Value>>> {
        let values = keys
            .iter()
            .map(|k| k.evaluate(row))
            .collect::<Result<Vec<_>>>()?;
        if values.iter().any(Value::is_undefined) {
            return Ok(None);
        }
        Ok(Some(values))
    }
}

impl Operator for HashJoin {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.probe = None;
        self.table.clear();
        self.built = false;
        self.left.open()?;
        self.right.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.built {
            while let Some(row) = self.right.next()? {
                if let Some(key) = Self::key(&self.right_keys, &row)? {
                    self.table.entry(key).or_default().push(row);
                }
            }
            self.right.close();
            self.built = true;
            trace!(keys = self.table.len(), "built hash join table");
        }
        loop {
            if self.probe.is_none() {
                let Some(row) = self.left.next()? else {
                    return Ok(None);
                };
                let key = Self::key(&self.left_keys, &row)?
                    .filter(|key| self.table.contains_key(key));
                match key {
                    Some(key) => self.probe = Some((row, key, 0)),
                    None if self.outer => {
                        return Ok(Some(row.pad_nulls(self.right.schema().column_count())));
                    }
                    None => continue,
                }
            }

            let Some((left, key, pos)) = self.probe.as_mut() else {
                continue;
            };
            match self.table.get(&*key).and_then(|matches| matches.get(*pos)) {
                Some(right) => {
                    *pos += 1;
                    return Ok(Some(left.concat(right)));
                }
                None => self.probe = None,
            }
        }
    }

    fn close(&mut self) {
        self.table.clear();
        self.built = false;
        self.probe = None;
        self.left.close();
        self.right.close();
    }
}
