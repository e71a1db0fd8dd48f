use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{DbError, Result};
use crate::storage::TableHeap;
use crate::tuple::Schema;

/// A table known to the catalog.
pub struct TableInfo {
    name: String,
    schema: Arc<Schema>,
    heap: Arc<TableHeap>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, schema: Arc<Schema>, heap: Arc<TableHeap>) -> Self {
        Self {
            name: name.into(),
            schema,
            heap,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn heap(&self) -> &Arc<TableHeap> {
        &self.heap
    }
}

/// Resolves table names for the engine.
pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> Result<Arc<TableInfo>>;
}

/// Catalog that keeps table metadata in memory. Table data lives in the
/// buffer pool like any other page.
pub struct MemoryCatalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
}

impl MemoryCatalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty table backed by a new heap.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<TableInfo>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }

        let heap = Arc::new(TableHeap::create(Arc::clone(&self.bpm))?);
        let info = Arc::new(TableInfo::new(name, Arc::new(schema), heap));
        tables.insert(name.to_string(), Arc::clone(&info));
        debug!(table = name, first_page_id = %info.heap().first_page_id(), "created table");
        Ok(info)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }
}
