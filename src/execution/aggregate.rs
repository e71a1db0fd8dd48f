use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::common::{DbError, Result};
use crate::tuple::{Column, DataType, Row, Schema, Value};

use super::{BoxedOperator, Expression, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Average,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Average => "avg",
        };
        f.write_str(name)
    }
}

/// An aggregate function applied to an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub expression: Expression,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, expression: Expression) -> Self {
        Self {
            function,
            expression,
        }
    }

    pub fn count(expression: Expression) -> Self {
        Self::new(AggregateFunction::Count, expression)
    }

    pub fn sum(expression: Expression) -> Self {
        Self::new(AggregateFunction::Sum, expression)
    }

    pub fn min(expression: Expression) -> Self {
        Self::new(AggregateFunction::Min, expression)
    }

    pub fn max(expression: Expression) -> Self {
        Self::new(AggregateFunction::Max, expression)
    }

    pub fn avg(expression: Expression) -> Self {
        Self::new(AggregateFunction::Average, expression)
    }

    fn output_column(&self, input: &Schema, position: usize) -> Result<Column> {
        let input_type = self.expression.output_column(input, position)?.data_type();
        let name = format!("{}({})", self.function, self.expression);
        Ok(match self.function {
            AggregateFunction::Count => Column::new(name, DataType::Integer, false),
            AggregateFunction::Average => Column::new(name, DataType::Float, true),
            AggregateFunction::Sum => Column::new(name, input_type, true),
            AggregateFunction::Min | AggregateFunction::Max => {
                Column::new(name, input_type, true)
            }
        })
    }
}

/// Running state of one aggregate in one group.
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum(Option<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
    Average { sum: f64, count: i64 },
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum(None),
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::Average => Accumulator::Average { sum: 0.0, count: 0 },
        }
    }

    /// Folds in one input value. Nulls are ignored.
    fn update(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Count(count) => *count += 1,
            Accumulator::Sum(sum) => {
                *sum = Some(match sum.take() {
                    None => numeric(value)?,
                    Some(acc) => add(acc, numeric(value)?)?,
                });
            }
            Accumulator::Min(min) => {
                if min.as_ref().map_or(true, |current| value < *current) {
                    *min = Some(value);
                }
            }
            Accumulator::Max(max) => {
                if max.as_ref().map_or(true, |current| value > *current) {
                    *max = Some(value);
                }
            }
            Accumulator::Average { sum, count } => {
                *sum += numeric(value)?.as_f64().unwrap_or(0.0);
                *count += 1;
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(count) => Value::Integer(count),
            Accumulator::Sum(v) | Accumulator::Min(v) | Accumulator::Max(v) => {
                v.unwrap_or(Value::Null)
            }
            Accumulator::Average { count: 0, .. } => Value::Null,
            Accumulator::Average { sum, count } => Value::Float(sum / count as f64),
        }
    }
}

fn numeric(value: Value) -> Result<Value> {
    match value {
        Value::Integer(_) | Value::Float(_) => Ok(value),
        other => Err(DbError::InvalidExpression(format!(
            "cannot aggregate non-numeric value {}",
            other
        ))),
    }
}

fn add(acc: Value, value: Value) -> Result<Value> {
    match (&acc, &value) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_add(*b)
            .map(Value::Integer)
            .ok_or_else(|| DbError::InvalidExpression("integer overflow in sum".into())),
        _ => Ok(Value::Float(
            acc.as_f64().unwrap_or(0.0) + value.as_f64().unwrap_or(0.0),
        )),
    }
}

/// Grouping aggregate.
///
/// Blocking: the whole input is consumed by the first `next`, so input
/// errors surface there. Groups are kept in a `BTreeMap` and emitted in key
/// order, each row being the group-by values followed by the aggregate
/// results. Without group-by expressions exactly
/// one row is produced, even for empty input.
pub struct Aggregate {
    child: BoxedOperator,
    group_by: Vec<Expression>,
    aggregates: Vec<AggregateExpr>,
    schema: Schema,
    output: std::vec::IntoIter<Row>,
    computed: bool,
}

impl Aggregate {
    pub fn new(
        child: BoxedOperator,
        group_by: Vec<Expression>,
        aggregates: Vec<AggregateExpr>,
    ) -> Result<Self> {
        let input = child.schema();
        let mut columns = Vec::with_capacity(group_by.len() + aggregates.len());
        for (i, expr) in group_by.iter().enumerate() {
            columns.push(expr.output_column(input, i)?);
        }
        for (i, agg) in aggregates.iter().enumerate() {
            columns.push(agg.output_column(input, group_by.len() + i)?);
        }

        Ok(Self {
            child,
            group_by,
            aggregates,
            schema: Schema::new(columns),
            output: Vec::new().into_iter(),
            computed: false,
        })
    }

    fn new_accumulators(&self) -> Vec<Accumulator> {
        self.aggregates
            .iter()
            .map(|agg| Accumulator::new(agg.function))
            .collect()
    }

    /// Consumes the whole child input and returns one row per group.
    fn compute(&mut self) -> Result<Vec<Row>> {
        let mut groups: BTreeMap<Vec<Value>, Vec<Accumulator>> = BTreeMap::new();
        while let Some(row) = self.child.next()? {
            let key = self
                .group_by
                .iter()
                .map(|expr| expr.evaluate(&row))
                .collect::<Result<Vec<_>>>()?;
            if !groups.contains_key(&key) {
                groups.insert(key.clone(), self.new_accumulators());
            }
            let Some(accumulators) = groups.get_mut(&key) else {
                continue;
            };
            for (acc, agg) in accumulators.iter_mut().zip(&self.aggregates) {
                acc.update(agg.expression.evaluate(&row)?)?;
            }
        }

        if groups.is_empty() && self.group_by.is_empty() {
            groups.insert(Vec::new(), self.new_accumulators());
        }
        trace!(groups = groups.len(), "aggregated input");

        Ok(groups
            .into_iter()
            .map(|(mut key, accumulators)| {
                key.extend(accumulators.into_iter().map(Accumulator::finish));
                Row::new(key)
            })
            .collect())
    }
}

impl Operator for Aggregate {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.output = Vec::new().into_iter();
        self.computed = false;
        self.child.open()
    }

    fn next(&mut self) -> Result<Option<Row>> {
        if !self.computed {
            self.output = self.compute()?.into_iter();
            self.computed = true;
        }
        Ok(self.output.next())
    }

    fn close(&mut self) {
        self.output = Vec::new().into_iter();
        self.computed = false;
        self.child.close();
    }
}
