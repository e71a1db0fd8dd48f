use std::cmp::Ordering;
use std::fmt;

use crate::common::{DbError, Result};
use crate::tuple::{Column, DataType, Row, Schema, Value};

/// Scalar expression evaluated against a single row.
///
/// Comparisons and boolean connectives follow SQL three-valued logic: a null
/// operand makes the result null (unknown), except where the other operand
/// of `And`/`Or` already decides it.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Value),
    /// Value of the column at this index of the input row
    Column(usize),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessOrEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterOrEqual(Box<Expression>, Box<Expression>),
    IsNull(Box<Expression>),
    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Expression {
    pub fn column(index: usize) -> Self {
        Expression::Column(index)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn eq(self, rhs: Expression) -> Self {
        Expression::Equal(Box::new(self), Box::new(rhs))
    }

    pub fn not_eq(self, rhs: Expression) -> Self {
        Expression::NotEqual(Box::new(self), Box::new(rhs))
    }

    pub fn lt(self, rhs: Expression) -> Self {
        Expression::LessThan(Box::new(self), Box::new(rhs))
    }

    pub fn lt_eq(self, rhs: Expression) -> Self {
        Expression::LessOrEqual(Box::new(self), Box::new(rhs))
    }

    pub fn gt(self, rhs: Expression) -> Self {
        Expression::GreaterThan(Box::new(self), Box::new(rhs))
    }

    pub fn gt_eq(self, rhs: Expression) -> Self {
        Expression::GreaterOrEqual(Box::new(self), Box::new(rhs))
    }

    pub fn and(self, rhs: Expression) -> Self {
        Expression::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expression) -> Self {
        Expression::Or(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expression::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Expression::IsNull(Box::new(self))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, rhs: Expression) -> Self {
        Expression::Add(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, rhs: Expression) -> Self {
        Expression::Subtract(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, rhs: Expression) -> Self {
        Expression::Multiply(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, rhs: Expression) -> Self {
        Expression::Divide(Box::new(self), Box::new(rhs))
    }

    /// Evaluates the expression against a row.
    pub fn evaluate(&self, row: &Row) -> Result<Value> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::Column(index) => row.value(*index).cloned(),
            Expression::Not(inner) => match inner.evaluate_bool(row)? {
                Some(b) => Ok(Value::Boolean(!b)),
                None => Ok(Value::Null),
            },
            Expression::And(lhs, rhs) => {
                let l = lhs.evaluate_bool(row)?;
                let r = rhs.evaluate_bool(row)?;
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            Expression::Or(lhs, rhs) => {
                let l = lhs.evaluate_bool(row)?;
                let r = rhs.evaluate_bool(row)?;
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            Expression::Equal(lhs, rhs) => compare(lhs, rhs, row, |o| o == Ordering::Equal),
            Expression::NotEqual(lhs, rhs) => compare(lhs, rhs, row, |o| o != Ordering::Equal),
            Expression::LessThan(lhs, rhs) => compare(lhs, rhs, row, |o| o == Ordering::Less),
            Expression::LessOrEqual(lhs, rhs) => {
                compare(lhs, rhs, row, |o| o != Ordering::Greater)
            }
            Expression::GreaterThan(lhs, rhs) => {
                compare(lhs, rhs, row, |o| o == Ordering::Greater)
            }
            Expression::GreaterOrEqual(lhs, rhs) => {
                compare(lhs, rhs, row, |o| o != Ordering::Less)
            }
            Expression::IsNull(inner) => Ok(Value::Boolean(inner.evaluate(row)?.is_null())),
            Expression::Add(lhs, rhs) => arithmetic(Arith::Add, lhs, rhs, row),
            Expression::Subtract(lhs, rhs) => arithmetic(Arith::Subtract, lhs, rhs, row),
            Expression::Multiply(lhs, rhs) => arithmetic(Arith::Multiply, lhs, rhs, row),
            Expression::Divide(lhs, rhs) => arithmetic(Arith::Divide, lhs, rhs, row),
        }
    }

    /// Evaluates to a boolean, None for null.
    fn evaluate_bool(&self, row: &Row) -> Result<Option<bool>> {
        match self.evaluate(row)? {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(b)),
            other => Err(DbError::InvalidExpression(format!(
                "expected a boolean, got {}",
                other
            ))),
        }
    }

    /// Evaluates a predicate. Only `true` passes; null counts as false.
    pub fn matches(&self, row: &Row) -> Result<bool> {
        Ok(self.evaluate_bool(row)? == Some(true))
    }

    /// Describes the column this expression produces over `input`.
    pub fn output_column(&self, input: &Schema, position: usize) -> Result<Column> {
        if let Expression::Column(index) = self {
            return input
                .column(*index)
                .cloned()
                .ok_or(DbError::ColumnNotFound(*index));
        }
        let data_type = self.output_type(input)?;
        Ok(Column::new(format!("expr{}", position), data_type, true))
    }

    fn output_type(&self, input: &Schema) -> Result<DataType> {
        match self {
            Expression::Constant(value) => Ok(value.data_type().unwrap_or(DataType::Integer)),
            Expression::Column(index) => input
                .column(*index)
                .map(|c| c.data_type())
                .ok_or(DbError::ColumnNotFound(*index)),
            Expression::Add(lhs, rhs)
            | Expression::Subtract(lhs, rhs)
            | Expression::Multiply(lhs, rhs)
            | Expression::Divide(lhs, rhs) => {
                let l = lhs.output_type(input)?;
                let r = rhs.output_type(input)?;
                if l == DataType::Float || r == DataType::Float {
                    Ok(DataType::Float)
                } else {
                    Ok(DataType::Integer)
                }
            }
            _ => Ok(DataType::Boolean),
        }
    }
}

fn compare(
    lhs: &Expression,
    rhs: &Expression,
    row: &Row,
    test: impl Fn(Ordering) -> bool,
) -> Result<Value> {
    let l = lhs.evaluate(row)?;
    let r = rhs.evaluate(row)?;
    Ok(match l.compare(&r)? {
        Some(ordering) => Value::Boolean(test(ordering)),
        None => Value::Null,
    })
}

fn arithmetic(op: Arith, lhs: &Expression, rhs: &Expression, row: &Row) -> Result<Value> {
    let l = lhs.evaluate(row)?;
    let r = rhs.evaluate(row)?;
    match (&l, &r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                Arith::Add => a.checked_add(*b),
                Arith::Subtract => a.checked_sub(*b),
                Arith::Multiply => a.checked_mul(*b),
                Arith::Divide if *b == 0 => {
                    return Err(DbError::InvalidExpression("division by zero".into()));
                }
                Arith::Divide => a.checked_div(*b),
            };
            result.map(Value::Integer).ok_or_else(|| {
                DbError::InvalidExpression(format!("integer overflow evaluating {} and {}", l, r))
            })
        }
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => match op {
                Arith::Add => Ok(Value::Float(a + b)),
                Arith::Subtract => Ok(Value::Float(a - b)),
                Arith::Multiply => Ok(Value::Float(a * b)),
                Arith::Divide if b == 0.0 => {
                    Err(DbError::InvalidExpression("division by zero".into()))
                }
                Arith::Divide => Ok(Value::Float(a / b)),
            },
            _ => Err(DbError::InvalidExpression(format!(
                "arithmetic on non-numeric values {} and {}",
                l, r
            ))),
        },
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::Column(i) => write!(f, "#{}", i),
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::IsNull(e) => write!(f, "{} IS NULL", e),
            Expression::And(l, r) => write!(f, "({} AND {})", l, r),
            Expression::Or(l, r) => write!(f, "({} OR {})", l, r),
            Expression::Equal(l, r) => write!(f, "({} = {})", l, r),
            Expression::NotEqual(l, r) => write!(f, "({} <> {})", l, r),
            Expression::LessThan(l, r) => write!(f, "({} < {})", l, r),
            Expression::LessOrEqual(l, r) => write!(f, "({} <= {})", l, r),
            Expression::GreaterThan(l, r) => write!(f, "({} > {})", l, r),
            Expression::GreaterOrEqual(l, r) => write!(f, "({} >= {})", l, r),
            Expression::Add(l, r) => write!(f, "({} + {})", l, r),
            Expression::Subtract(l, r) => write!(f, "({} - {})", l, r),
            Expression::Multiply(l, r) => write!(f, "({} * {})", l, r),
            Expression::Divide(l, r) => write!(f, "({} / {})", l, r),
        }
    }
}
