use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Raw bytes of one page.
pub type PageData = Box<[u8; PAGE_SIZE]>;

/// One slot of the buffer pool arena.
///
/// Metadata (resident page, pin count, dirty flag) is only changed while the
/// buffer pool lock is held; the atomics make it readable without that lock.
/// The page bytes sit behind their own latch.
#[derive(Debug)]
pub struct FrameHeader {
    frame_id: FrameId,
    page_id: AtomicU32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
    data: RwLock<PageData>,
}

impl FrameHeader {
    /// Creates an empty, unpinned frame with zeroed bytes.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    /// Position of this frame in the pool arena.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page held by this frame, `INVALID_PAGE_ID` when empty.
    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    /// Records which page now lives in this frame.
    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_u32(), Ordering::Release);
    }

    /// Number of outstanding pins. A pinned frame is never evicted.
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None, leaving the count at zero, if it was already 0.
    pub(crate) fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    /// Whether the bytes differ from what is on disk.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Sets or clears the dirty flag.
    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Shared latch on the page bytes.
    pub fn read_data(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.read()
    }

    /// Exclusive latch on the page bytes. Does not mark the frame dirty; the
    /// caller reports that through `unpin_page`.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.write()
    }

    /// Overwrites the page bytes, e.g. with a page just read from disk.
    pub(crate) fn copy_from(&self, data: &[u8]) {
        self.data.write().copy_from_slice(data);
    }

    /// Resets the frame to its empty state.
    pub(crate) fn reset(&self) {
        self.set_page_id(INVALID_PAGE_ID);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
