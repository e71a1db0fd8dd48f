//! Slate - buffer-pool storage and a pull-based execution core
//!
//! Tables live in pages cached by a fixed-size buffer pool; queries are trees
//! of operators that pull rows from their children one at a time.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and page organization
//!   - `DiskManager`: page-granular persistent storage (file or memory)
//!   - `DiskScheduler`: background worker that performs page I/O
//!   - `TablePage`: slotted page holding variable-length tuples
//!   - `TableHeap`: chain of table pages forming one table
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages in frames, writes them back on eviction
//!   - `LruKReplacer`: LRU-K victim selection
//!   - `PageGuard`: RAII pin with short-lived read/write latches
//!
//! - **Tuples** (`tuple`): types, values, schemas and the row byte codec
//!
//! - **Catalog** (`catalog`): table name resolution
//!
//! - **Execution** (`execution`): operators, plans and the `LocalEngine`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use slate::buffer::BufferPoolManager;
//! use slate::catalog::MemoryCatalog;
//! use slate::execution::{Expression, LocalEngine, PlanNode};
//! use slate::tuple::{DataType, Schema, Value};
//!
//! let bpm = Arc::new(BufferPoolManager::builder().pool_size(16).build());
//! let catalog = Arc::new(MemoryCatalog::new(Arc::clone(&bpm)));
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::VarChar(32))
//!     .build();
//! catalog.create_table("users", schema.clone()).unwrap();
//!
//! let engine = LocalEngine::new(Arc::clone(&bpm), catalog);
//! let rows = vec![
//!     vec![Value::from(1), Value::from("ada")],
//!     vec![Value::from(2), Value::from("linus")],
//! ];
//! engine
//!     .execute(PlanNode::values(schema, rows).insert_into("users"))
//!     .unwrap();
//!
//! let result = engine
//!     .execute(PlanNode::scan_where(
//!         "users",
//!         Expression::column(0).gt(Expression::constant(1)),
//!     ))
//!     .unwrap();
//! assert_eq!(result.rows.len(), 1);
//! assert_eq!(result.rows[0].values()[1], Value::from("linus"));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{DbError, ErrorKind, PageId, RecordId, Result, SlotId};
