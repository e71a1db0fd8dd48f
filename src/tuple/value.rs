use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::common::{DbError, Result};

use super::DataType;

/// A typed value of one column.
///
/// `Value` is totally ordered so it can key sorts, groups and min/max:
/// `Null` sorts lowest, then booleans, then numbers (integers and floats
/// compare numerically with each other, NaN above every number), then
/// strings. SQL comparisons that must yield *unknown* for nulls go through
/// [`Value::compare`] and [`Value::sql_eq`] instead.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Used for both Char and VarChar columns
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type that best matches this value, None for null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::String(s) => Some(DataType::VarChar(s.len().min(u16::MAX as usize) as u16)),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
        }
    }

    /// True for a floating-point NaN.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) if f.is_nan())
    }

    /// True for values that never compare equal to anything, including
    /// themselves: null and NaN.
    pub fn is_undefined(&self) -> bool {
        self.is_null() || self.is_nan()
    }

    /// SQL comparison. Returns `Ok(None)` (unknown) if either side is null
    /// or NaN, and `InvalidExpression` for values of incomparable types.
    ///
    /// The total order used by sorting and grouping is `Ord`, where NaN
    /// sorts above every other number.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        if self.is_undefined() || other.is_undefined() {
            return Ok(None);
        }
        if self.rank() != other.rank() {
            return Err(DbError::InvalidExpression(format!(
                "cannot compare {} with {}",
                self, other
            )));
        }
        Ok(Some(self.cmp(other)))
    }

    /// SQL equality: unknown if either side is null or NaN.
    pub fn sql_eq(&self, other: &Value) -> Result<Option<bool>> {
        Ok(self.compare(other)?.map(|ord| ord == Ordering::Equal))
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Less;
    }
    match cmp_f64(i as f64, f) {
        // Equal after rounding; compare exactly against the integral float
        Ordering::Equal => i.cmp(&(f as i64)),
        ord => ord,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_f64(*a, *b),
            (Value::Integer(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_int_float(*b, *a).reverse(),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(v) => v.hash(state),
            // Integral floats hash like the equal integer
            Value::Float(v) if v.is_nan() => u64::MAX.hash(state),
            Value::Float(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => {
                (*v as i64).hash(state)
            }
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
