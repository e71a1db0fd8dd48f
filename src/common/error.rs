use thiserror::Error;

use super::types::{PageId, SlotId};

/// Coarse classification of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No frame is free or evictable.
    ResourceExhausted,
    /// A page, slot, table or column does not exist.
    NotFound,
    /// A table page has no room for the tuple. Handled inside the table heap.
    Full,
    /// The caller passed something unusable: bad ids, rows that do not fit
    /// the schema, ill-typed expressions.
    InvalidArgument,
    /// I/O failures and corrupted on-disk data.
    Internal,
}

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Page is full: tuple of {tuple_size} bytes needs {needed}, {available} available")]
    PageFull {
        tuple_size: usize,
        needed: usize,
        available: usize,
    },

    #[error("Tuple of {size} bytes exceeds the page capacity of {max} bytes")]
    TupleTooLarge { size: usize, max: usize },

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(SlotId),

    #[error("Slot {0} not found")]
    SlotNotFound(SlotId),

    #[error("Corrupt tuple: {0}")]
    CorruptTuple(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Column {0} not found")]
    ColumnNotFound(usize),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Row has no record id; write operators need rows produced by a table scan")]
    MissingRecordId,
}

impl DbError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::BufferPoolFull => ErrorKind::ResourceExhausted,
            DbError::PageNotFound(_)
            | DbError::SlotNotFound(_)
            | DbError::TableNotFound(_)
            | DbError::ColumnNotFound(_) => ErrorKind::NotFound,
            DbError::PageFull { .. } => ErrorKind::Full,
            DbError::InvalidPageId(_)
            | DbError::PageStillPinned(_)
            | DbError::TupleTooLarge { .. }
            | DbError::InvalidSlotId(_)
            | DbError::SchemaMismatch(_)
            | DbError::TableAlreadyExists(_)
            | DbError::InvalidExpression(_)
            | DbError::MissingRecordId => ErrorKind::InvalidArgument,
            DbError::Io(_) | DbError::DiskScheduler(_) | DbError::CorruptTuple(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true for the table-page `Full` signal.
    pub fn is_full(&self) -> bool {
        self.kind() == ErrorKind::Full
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DbError::BufferPoolFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(
            DbError::SlotNotFound(SlotId::new(3)).kind(),
            ErrorKind::NotFound
        );
        let full = DbError::PageFull {
            tuple_size: 10,
            needed: 16,
            available: 4,
        };
        assert!(full.is_full());
        assert_eq!(
            DbError::SchemaMismatch("arity".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DbError::InvalidPageId(PageId::new(7)).kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            DbError::PageStillPinned(PageId::new(7)).to_string(),
            "Page PageId(7) is still pinned"
        );
    }
}
