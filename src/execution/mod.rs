mod aggregate;
mod engine;
mod expression;
mod join;
mod operator;
mod plan;
mod source;
mod transform;
mod write;

pub use aggregate::{Aggregate, AggregateExpr, AggregateFunction};
pub use engine::{LocalEngine, ResultSet, RowStream};
pub use expression::Expression;
pub use join::{HashJoin, NestedLoopJoin};
pub use operator::{BoxedOperator, Operator};
pub use plan::PlanNode;
pub use source::{SeqScan, Values};
pub use transform::{Filter, Limit, Offset, Projection, Sort, SortKey};
pub use write::{Delete, Insert, Update};

pub(crate) use operator::drain;
