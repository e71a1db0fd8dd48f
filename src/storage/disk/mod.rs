mod disk_manager;
mod disk_scheduler;
mod memory_disk_manager;

pub use disk_manager::*;
pub use disk_scheduler::*;
pub use memory_disk_manager::*;

use crate::common::{PageId, Result};

/// Page-granular persistent storage.
///
/// Buffers passed to `read_page` and `write_page` are exactly `PAGE_SIZE`
/// bytes. Implementations are shared between the buffer pool and the disk
/// scheduler thread, so they synchronize internally.
pub trait DiskManager: Send + Sync {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Returns a zeroed page id, reusing deallocated ids first.
    fn allocate_page(&self) -> Result<PageId>;

    fn deallocate_page(&self, page_id: PageId) -> Result<()>;

    /// Number of page ids handed out so far, including deallocated ones.
    fn num_pages(&self) -> u32;

    /// Forces completed writes down to durable storage. A no-op for
    /// volatile managers.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
