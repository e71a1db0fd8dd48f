use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::{
    DbError, FrameId, PageId, Result, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K,
};
use crate::storage::disk::{DiskManager, DiskScheduler, MemoryDiskManager};

use super::{FrameHeader, LruKReplacer, PageGuard};

/// Bookkeeping guarded by the pool lock
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// State shared between the pool and the page guards it hands out.
pub(crate) struct PoolShared {
    frames: Vec<Arc<FrameHeader>>,
    inner: Mutex<PoolInner>,
    replacer: LruKReplacer,
}

impl PoolShared {
    /// Drops one pin and ORs in the dirty flag. Returns false if the page
    /// was not pinned.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let inner = self.inner.lock();
        let frame_id = *inner
            .page_table
            .get(&page_id)
            .ok_or(DbError::PageNotFound(page_id))?;
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() == 0 {
            return Ok(false);
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            Some(0) => self.replacer.set_evictable(frame_id, true),
            Some(_) => {}
            None => return Ok(false),
        }
        trace!(%page_id, pin_count = frame.pin_count(), is_dirty, "unpinned page");
        Ok(true)
    }
}

/// BufferPoolManager caches a fixed number of pages in memory.
///
/// Callers pin a page with [`fetch_page`](Self::fetch_page) or
/// [`new_page`](Self::new_page) and release it with
/// [`unpin_page`](Self::unpin_page), or let a [`PageGuard`] do both. A page is
/// only evicted once its pin count is zero; the victim among unpinned frames
/// is chosen by the LRU-K replacer. When no frame is free or evictable the
/// request fails with `BufferPoolFull` instead of waiting.
///
/// A caller must not call into the pool while holding the data latch of a
/// page it pinned.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    state: Arc<PoolShared>,
    /// Background worker performing page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames using LRU-`k` replacement.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolShared {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruKReplacer::new(k, pool_size),
        });

        debug!(pool_size, k, "created buffer pool");
        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    pub fn builder() -> BufferPoolManagerBuilder {
        BufferPoolManagerBuilder::default()
    }

    /// Pins a page, reading it from disk if it is not resident.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            trace!(%page_id, %frame_id, "buffer pool hit");
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let data = match self.disk_scheduler.read_page(page_id) {
            Ok(data) => data,
            Err(err) => {
                inner.free_list.push_back(frame_id);
                return Err(err);
            }
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        frame.copy_from(&data);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        debug!(%page_id, %frame_id, "buffer pool miss, page read from disk");
        Ok(Arc::clone(frame))
    }

    /// Allocates a fresh zeroed page and returns it pinned.
    pub fn new_page(&self) -> Result<Arc<FrameHeader>> {
        let mut inner = self.state.inner.lock();
        let frame_id = self.acquire_frame(&mut inner)?;

        let page_id = match self.disk_scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(err) => {
                inner.free_list.push_back(frame_id);
                return Err(err);
            }
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        debug!(%page_id, %frame_id, "allocated new page");
        Ok(Arc::clone(frame))
    }

    /// Releases one pin on a page. See [`PageGuard`] for the scoped form.
    ///
    /// Returns `Ok(false)` if the page was resident but not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes a resident page to disk whether or not it is dirty.
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.write_back(&self.state.frames[frame_id.as_usize()], page_id)?;
        Ok(true)
    }

    /// Writes every dirty resident page to disk, then syncs the disk
    /// manager.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        let mut flushed = 0usize;
        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                self.write_back(frame, page_id)?;
                flushed += 1;
            }
        }
        self.disk_manager().sync()?;
        debug!(flushed, "flushed dirty pages");
        Ok(())
    }

    /// Removes a page from the pool and deallocates it on disk.
    ///
    /// Fails with `PageStillPinned` if anyone holds a pin. Returns false if
    /// the page does not exist.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Err(DbError::PageStillPinned(page_id));
            }

            inner.page_table.remove(&page_id);
            frame.reset();
            self.state.replacer.remove(frame_id);
            inner.free_list.push_back(frame_id);
        }

        match self.disk_scheduler.disk_manager().deallocate_page(page_id) {
            Ok(()) => {
                debug!(%page_id, "deleted page");
                Ok(true)
            }
            Err(DbError::PageNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Pins a page and wraps the pin in a guard.
    pub fn fetch_page_guard(&self, page_id: PageId) -> Result<PageGuard> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Allocates a page and wraps its pin in a guard.
    pub fn new_page_guard(&self) -> Result<PageGuard> {
        let frame = self.new_page()?;
        Ok(PageGuard::new(
            frame.page_id(),
            frame,
            Arc::clone(&self.state),
        ))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    pub fn resident_page_count(&self) -> usize {
        self.state.inner.lock().page_table.len()
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.frame_of(page_id).map(|frame| frame.pin_count())
    }

    /// Returns the dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.frame_of(page_id).map(|frame| frame.is_dirty())
    }

    pub fn disk_manager(&self) -> &Arc<dyn DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    fn frame_of(&self, page_id: PageId) -> Option<Arc<FrameHeader>> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| Arc::clone(&self.state.frames[frame_id.as_usize()]))
    }

    fn write_back(&self, frame: &FrameHeader, page_id: PageId) -> Result<()> {
        let data = Bytes::copy_from_slice(&frame.read_data()[..]);
        self.disk_scheduler.write_page(page_id, data)?;
        frame.set_dirty(false);
        trace!(%page_id, "wrote page back to disk");
        Ok(())
    }

    /// Takes a frame from the free list, or evicts the replacer's victim
    /// after writing it back if dirty.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.state.replacer.evict().ok_or_else(|| {
            warn!(pool_size = self.pool_size, "buffer pool exhausted");
            DbError::BufferPoolFull
        })?;
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            if let Err(err) = self.write_back(frame, old_page_id) {
                // Keep the victim resident and evictable
                self.state.replacer.record_access(frame_id);
                self.state.replacer.set_evictable(frame_id, true);
                return Err(err);
            }
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();
        debug!(page_id = %old_page_id, %frame_id, "evicted page");
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all_pages() {
            warn!(%err, "failed to flush buffer pool on shutdown");
        }
    }
}

/// Builder for [`BufferPoolManager`]. Unset fields fall back to the defaults
/// in `common::config` and an in-memory disk.
pub struct BufferPoolManagerBuilder {
    pool_size: usize,
    replacer_k: usize,
    disk_manager: Option<Arc<dyn DiskManager>>,
}

impl Default for BufferPoolManagerBuilder {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            replacer_k: DEFAULT_LRUK_K,
            disk_manager: None,
        }
    }
}

impl BufferPoolManagerBuilder {
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn replacer_k(mut self, k: usize) -> Self {
        self.replacer_k = k.max(1);
        self
    }

    pub fn disk_manager(mut self, disk_manager: Arc<dyn DiskManager>) -> Self {
        self.disk_manager = Some(disk_manager);
        self
    }

    pub fn build(self) -> BufferPoolManager {
        let disk_manager = self
            .disk_manager
            .unwrap_or_else(|| Arc::new(MemoryDiskManager::new()));
        BufferPoolManager::new(self.pool_size, self.replacer_k, disk_manager)
    }
}
