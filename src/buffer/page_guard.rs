use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::common::PageId;

use super::buffer_pool_manager::PoolShared;
use super::{FrameHeader, PageData};

/// RAII pin on a resident page.
///
/// The guard owns exactly one pin. Latches on the page bytes are taken only
/// for the lifetime of the borrow returned by [`PageGuard::read`] or
/// [`PageGuard::write`], so a guard can be held across calls without
/// blocking other readers or writers. Dropping the guard unpins the page and
/// reports it dirty if `write` was ever called.
pub struct PageGuard {
    page_id: PageId,
    frame: Arc<FrameHeader>,
    pool: Arc<PoolShared>,
    is_dirty: bool,
}

impl PageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, pool: Arc<PoolShared>) -> Self {
        Self {
            page_id,
            frame,
            pool,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Shared latch on the page bytes.
    pub fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.frame.read_data()
    }

    /// Exclusive latch on the page bytes; marks the page dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, PageData> {
        self.is_dirty = true;
        self.frame.write_data()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Err(err) = self.pool.unpin(self.page_id, self.is_dirty) {
            warn!(page_id = %self.page_id, %err, "failed to release page guard");
        }
    }
}
