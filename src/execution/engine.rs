use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::Result;
use crate::tuple::Row;

use super::{
    Aggregate, BoxedOperator, Delete, Filter, HashJoin, Insert, Limit, NestedLoopJoin, Offset,
    PlanNode, Projection, SeqScan, Sort, Update, Values,
};

/// Materialized result of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Runs operator trees in the calling thread.
pub struct LocalEngine {
    bpm: Arc<BufferPoolManager>,
    catalog: Arc<dyn Catalog>,
}

impl LocalEngine {
    pub fn new(bpm: Arc<BufferPoolManager>, catalog: Arc<dyn Catalog>) -> Self {
        Self { bpm, catalog }
    }

    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Turns a plan into an operator tree, resolving table names.
    pub fn build(&self, plan: PlanNode) -> Result<BoxedOperator> {
        Ok(match plan {
            PlanNode::SeqScan { table, predicate } => {
                Box::new(SeqScan::new(self.catalog.table(&table)?, predicate))
            }
            PlanNode::Values { schema, rows } => Box::new(Values::new(schema, rows)?),
            PlanNode::Filter { input, predicate } => {
                Box::new(Filter::new(self.build(*input)?, predicate))
            }
            PlanNode::Projection { input, expressions } => {
                Box::new(Projection::new(self.build(*input)?, expressions)?)
            }
            PlanNode::Limit { input, limit } => Box::new(Limit::new(self.build(*input)?, limit)),
            PlanNode::Offset { input, offset } => {
                Box::new(Offset::new(self.build(*input)?, offset))
            }
            PlanNode::Sort { input, keys } => Box::new(Sort::new(self.build(*input)?, keys)),
            PlanNode::NestedLoopJoin {
                left,
                right,
                predicate,
                outer,
            } => Box::new(NestedLoopJoin::new(
                self.build(*left)?,
                self.build(*right)?,
                predicate,
                outer,
            )),
            PlanNode::HashJoin {
                left,
                right,
                left_keys,
                right_keys,
                outer,
            } => Box::new(HashJoin::new(
                self.build(*left)?,
                self.build(*right)?,
                left_keys,
                right_keys,
                outer,
            )),
            PlanNode::Aggregate {
                input,
                group_by,
                aggregates,
            } => Box::new(Aggregate::new(self.build(*input)?, group_by, aggregates)?),
            PlanNode::Insert { table, input } => Box::new(Insert::new(
                self.catalog.table(&table)?,
                self.build(*input)?,
            )),
            PlanNode::Delete { table, input } => Box::new(Delete::new(
                self.catalog.table(&table)?,
                self.build(*input)?,
            )),
            PlanNode::Update {
                table,
                input,
                expressions,
            } => Box::new(Update::new(
                self.catalog.table(&table)?,
                self.build(*input)?,
                expressions,
            )?),
        })
    }

    /// Builds and runs a plan to completion.
    pub fn execute(&self, plan: PlanNode) -> Result<ResultSet> {
        self.execute_operator(self.build(plan)?)
    }

    /// Runs an operator tree to completion. The tree is closed on every
    /// path.
    pub fn execute_operator(&self, op: BoxedOperator) -> Result<ResultSet> {
        let stream = self.stream_operator(op)?;
        let columns = stream.columns().to_vec();
        let rows = stream.collect::<Result<Vec<_>>>()?;
        debug!(rows = rows.len(), "statement finished");
        Ok(ResultSet { columns, rows })
    }

    /// Builds a plan and returns its rows lazily.
    pub fn stream(&self, plan: PlanNode) -> Result<RowStream> {
        self.stream_operator(self.build(plan)?)
    }

    /// Opens an operator tree and returns its rows lazily.
    pub fn stream_operator(&self, mut op: BoxedOperator) -> Result<RowStream> {
        let columns = op.schema().column_names();
        if let Err(err) = op.open() {
            op.close();
            return Err(err);
        }
        Ok(RowStream {
            op: Some(op),
            columns,
        })
    }
}

/// Rows of an opened operator tree.
///
/// The tree is closed as soon as it is exhausted or fails, and at the
/// latest when the stream is dropped, so an abandoned stream releases its
/// page pins.
pub struct RowStream {
    op: Option<BoxedOperator>,
    columns: Vec<String>,
}

impl RowStream {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn finish(&mut self) {
        if let Some(mut op) = self.op.take() {
            op.close();
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let op = self.op.as_mut()?;
        match op.next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(err) => {
                warn!(%err, "statement failed");
                self.finish();
                Some(Err(err))
            }
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.finish();
    }
}
