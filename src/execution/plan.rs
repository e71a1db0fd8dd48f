use crate::tuple::{Schema, Value};

use super::{AggregateExpr, Expression, SortKey};

/// Physical plan handed to the engine by a planner.
///
/// Tables are referenced by name and resolved through the catalog when the
/// operator tree is built.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    SeqScan {
        table: String,
        predicate: Option<Expression>,
    },
    Values {
        schema: Schema,
        rows: Vec<Vec<Value>>,
    },
    Filter {
        input: Box<PlanNode>,
        predicate: Expression,
    },
    Projection {
        input: Box<PlanNode>,
        expressions: Vec<Expression>,
    },
    Limit {
        input: Box<PlanNode>,
        limit: usize,
    },
    Offset {
        input: Box<PlanNode>,
        offset: usize,
    },
    Sort {
        input: Box<PlanNode>,
        keys: Vec<SortKey>,
    },
    NestedLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        predicate: Option<Expression>,
        outer: bool,
    },
    HashJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
        outer: bool,
    },
    Aggregate {
        input: Box<PlanNode>,
        group_by: Vec<Expression>,
        aggregates: Vec<AggregateExpr>,
    },
    Insert {
        table: String,
        input: Box<PlanNode>,
    },
    Delete {
        table: String,
        input: Box<PlanNode>,
    },
    Update {
        table: String,
        input: Box<PlanNode>,
        expressions: Vec<Expression>,
    },
}

impl PlanNode {
    pub fn scan(table: impl Into<String>) -> Self {
        PlanNode::SeqScan {
            table: table.into(),
            predicate: None,
        }
    }

    pub fn scan_where(table: impl Into<String>, predicate: Expression) -> Self {
        PlanNode::SeqScan {
            table: table.into(),
            predicate: Some(predicate),
        }
    }

    pub fn values(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        PlanNode::Values { schema, rows }
    }

    pub fn filter(self, predicate: Expression) -> Self {
        PlanNode::Filter {
            input: Box::new(self),
            predicate,
        }
    }

    pub fn project(self, expressions: Vec<Expression>) -> Self {
        PlanNode::Projection {
            input: Box::new(self),
            expressions,
        }
    }

    pub fn limit(self, limit: usize) -> Self {
        PlanNode::Limit {
            input: Box::new(self),
            limit,
        }
    }

    pub fn offset(self, offset: usize) -> Self {
        PlanNode::Offset {
            input: Box::new(self),
            offset,
        }
    }

    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        PlanNode::Sort {
            input: Box::new(self),
            keys,
        }
    }

    pub fn nested_loop_join(self, right: PlanNode, predicate: Option<Expression>, outer: bool) -> Self {
        PlanNode::NestedLoopJoin {
            left: Box::new(self),
            right: Box::new(right),
            predicate,
            outer,
        }
    }

    pub fn hash_join(
        self,
        right: PlanNode,
        left_keys: Vec<Expression>,
        right_keys: Vec<Expression>,
        outer: bool,
    ) -> Self {
        PlanNode::HashJoin {
            left: Box::new(self),
            right: Box::new(right),
            left_keys,
            right_keys,
            outer,
        }
    }

    pub fn aggregate(self, group_by: Vec<Expression>, aggregates: Vec<AggregateExpr>) -> Self {
        PlanNode::Aggregate {
            input: Box::new(self),
            group_by,
            aggregates,
        }
    }

    pub fn insert_into(self, table: impl Into<String>) -> Self {
        PlanNode::Insert {
            table: table.into(),
            input: Box::new(self),
        }
    }

    pub fn delete_from(self, table: impl Into<String>) -> Self {
        PlanNode::Delete {
            table: table.into(),
            input: Box::new(self),
        }
    }

    pub fn update(self, table: impl Into<String>, expressions: Vec<Expression>) -> Self {
        PlanNode::Update {
            table: table.into(),
            input: Box::new(self),
            expressions,
        }
    }
}
