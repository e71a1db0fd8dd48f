use crate::common::Result;
use crate::tuple::{Row, Schema};

/// A node of a pull-based (Volcano) operator tree.
///
/// `open` (re)initialises the operator and its children, `next` yields one
/// row at a time until `Ok(None)`, `close` releases buffered rows and page
/// pins. `open` and `close` may be called repeatedly. After an error from
/// `next` the caller is expected to `close` the tree.
pub trait Operator {
    /// Shape of the rows this operator produces.
    fn schema(&self) -> &Schema;

    fn open(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<Row>>;

    fn close(&mut self);
}

pub type BoxedOperator = Box<dyn Operator + Send>;

/// Pulls every remaining row out of an opened operator.
pub(crate) fn drain(op: &mut BoxedOperator) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = op.next()? {
        rows.push(row);
    }
    Ok(rows)
}
