use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::common::Result;
use crate::tuple::{Row, Schema, Value};

use super::{drain, BoxedOperator, Expression, Operator};

/// Passes through the rows for which the predicate is true.
pub struct Filter {
    child: BoxedOperator,
    predicate: Expression,
}

impl Filter {
    pub fn new(child: BoxedOperator, predicate: Expression) -> Self {
        Self { child, predicate }
    }
}

impl Operator for Filter {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.next()? {
            if self.predicate.matches(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Computes one output column per expression. The input record id is kept
/// so a projection can sit below a delete or update.
pub struct Projection {
    child: BoxedOperator,
    expressions: Vec<Expression>,
    schema: Schema,
}

impl Projection {
    pub fn new(child: BoxedOperator, expressions: Vec<Expression>) -> Result<Self> {
        let columns = expressions
            .iter()
            .enumerate()
            .map(|(i, expr)| expr.output_column(child.schema(), i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            child,
            expressions,
            schema: Schema::new(columns),
        })
    }
}

impl Operator for Projection {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.next()? else {
            return Ok(None);
        };
        let values = self
            .expressions
            .iter()
            .map(|expr| expr.evaluate(&row))
            .collect::<Result<Vec<_>>>()?;
        let mut projected = Row::new(values);
        projected.set_rid(row.rid());
        Ok(Some(projected))
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Stops after `limit` rows.
pub struct Limit {
    child: BoxedOperator,
    limit: usize,
    emitted: usize,
}

impl Limit {
    pub fn new(child: BoxedOperator, limit: usize) -> Self {
        Self {
            child,
            limit,
            emitted: 0,
        }
    }
}

impl Operator for Limit {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.emitted = 0;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if self.emitted >= self.limit {
            return Ok(None);
        }
        let row = self.child.next()?;
        if row.is_some() {
            self.emitted += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// Skips the first `offset` rows.
pub struct Offset {
    child: BoxedOperator,
    offset: usize,
    skipped: usize,
}

impl Offset {
    pub fn new(child: BoxedOperator, offset: usize) -> Self {
        Self {
            child,
            offset,
            skipped: 0,
        }
    }
}

impl Operator for Offset {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.skipped = 0;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        while self.skipped < self.offset {
            if self.child.next()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        self.child.next()
    }

    fn close(&mut self) {
        self.child.close();
    }
}

/// One ordering key of a [`Sort`].
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expression: Expression,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            descending: false,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            descending: true,
        }
    }
}

/// Blocking multi-key sort, buffering its input on the first `next`. Nulls
/// sort before every other value; the sort is stable.
pub struct Sort {
    child: BoxedOperator,
    keys: Vec<SortKey>,
    sorted: VecDeque<Row>,
    buffered: bool,
}

impl Sort {
    pub fn new(child: BoxedOperator, keys: Vec<SortKey>) -> Self {
        Self {
            child,
            keys,
            sorted: VecDeque::new(),
            buffered: false,
        }
    }

    fn sort_input(&mut self) -> Result<VecDeque<Row>> {
        let rows = drain(&mut self.child)?;
        let mut keyed = rows
            .into_iter()
            .map(|row| {
                let key = self
                    .keys
                    .iter()
                    .map(|k| k.expression.evaluate(&row))
                    .collect::<Result<Vec<_>>>()?;
                Ok((key, row))
            })
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for ((key, a), b) in self.keys.iter().zip(a).zip(b) {
            let ordering = if key.descending { b.cmp(a) } else { a.cmp(b) };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl Operator for Sort {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.sorted.clear();
        self.buffered = false;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.buffered {
            self.sorted = self.sort_input()?;
            self.buffered = true;
        }
        Ok(self.sorted.pop_front())
    }

    fn close(&mut self) {
        self.sorted.clear();
        self.buffered = false;
        self.child.close();
    }
}
