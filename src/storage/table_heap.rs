use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{DbError, PageId, RecordId, Result, INVALID_PAGE_ID, PAGE_SIZE};

use super::page::{TablePage, HEADER_SIZE, SLOT_SIZE};

/// Largest tuple that fits on an empty table page.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - HEADER_SIZE - SLOT_SIZE;

/// A table stored as a singly linked chain of table pages.
///
/// Inserts go to the last page and grow the chain when it is full, so the
/// `PageFull` signal of a single page never reaches callers. Inserts are
/// serialized by the lock on the tail pointer.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Allocates the first page of a new, empty heap.
    pub fn create(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let first_page_id = Self::allocate_page(&bpm)?;
        debug!(page_id = %first_page_id, "created table heap");
        Ok(Self {
            bpm,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    /// Reopens an existing heap starting at `first_page_id`, walking the chain
    /// to find its tail.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Result<Self> {
        let mut last_page_id = first_page_id;
        loop {
            let guard = bpm.fetch_page_guard(last_page_id)?;
            let next = TablePage::new(&guard.read()[..]).next_page_id();
            if !next.is_valid() {
                break;
            }
            last_page_id = next;
        }
        Ok(Self {
            bpm,
            first_page_id,
            last_page_id: Mutex::new(last_page_id),
        })
    }

    fn allocate_page(bpm: &BufferPoolManager) -> Result<PageId> {
        let mut guard = bpm.new_page_guard()?;
        let page_id = guard.page_id();
        TablePage::new(&mut guard.write()[..]).init(page_id);
        Ok(page_id)
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Stores a tuple and returns where it landed.
    pub fn insert_tuple(&self, tuple: &[u8]) -> Result<RecordId> {
        if tuple.len() > MAX_TUPLE_SIZE {
            return Err(DbError::TupleTooLarge {
                size: tuple.len(),
                max: MAX_TUPLE_SIZE,
            });
        }

        let mut last_page_id = self.last_page_id.lock();
        let mut page_id = *last_page_id;
        loop {
            let mut guard = self.bpm.fetch_page_guard(page_id)?;
            let next_page_id = {
                let mut data = guard.write();
                let mut page = TablePage::new(&mut data[..]);
                match page.insert_tuple(tuple) {
                    Ok(slot_id) => return Ok(RecordId::new(page_id, slot_id)),
                    Err(err) if err.is_full() => page.next_page_id(),
                    Err(err) => return Err(err),
                }
            };

            if next_page_id.is_valid() {
                page_id = next_page_id;
                continue;
            }

            // End of the chain: link a fresh page behind this one
            drop(guard);
            let new_page_id = Self::allocate_page(&self.bpm)?;
            let mut guard = self.bpm.fetch_page_guard(page_id)?;
            TablePage::new(&mut guard.write()[..]).set_next_page_id(new_page_id);
            debug!(from = %page_id, to = %new_page_id, "extended table heap");

            *last_page_id = new_page_id;
            page_id = new_page_id;
        }
    }

    /// Returns a copy of the tuple bytes.
    pub fn get_tuple(&self, rid: RecordId) -> Result<Vec<u8>> {
        let guard = self.bpm.fetch_page_guard(rid.page_id)?;
        let data = guard.read();
        let tuple = TablePage::new(&data[..]).get_tuple(rid.slot_id)?.to_vec();
        Ok(tuple)
    }

    /// Tombstones a tuple.
    pub fn delete_tuple(&self, rid: RecordId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_guard(rid.page_id)?;
        let mut data = guard.write();
        TablePage::new(&mut data[..]).delete_tuple(rid.slot_id)
    }

    /// Replaces a tuple by deleting it and inserting the new bytes. The new
    /// record id may differ from `rid`. If the insert fails the old tuple is
    /// restored.
    pub fn update_tuple(&self, rid: RecordId, tuple: &[u8]) -> Result<RecordId> {
        self.delete_tuple(rid)?;
        match self.insert_tuple(tuple) {
            Ok(new_rid) => Ok(new_rid),
            Err(err) => {
                if let Err(restore_err) = self.restore_tuple(rid) {
                    warn!(%rid, %restore_err, "failed to restore tuple after update error");
                }
                Err(err)
            }
        }
    }

    fn restore_tuple(&self, rid: RecordId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_guard(rid.page_id)?;
        let mut data = guard.write();
        TablePage::new(&mut data[..]).restore_tuple(rid.slot_id)
    }

    /// Iterates live tuples in chain order, then slot order.
    pub fn iter(&self) -> TableIterator {
        TableIterator {
            bpm: Arc::clone(&self.bpm),
            guard: None,
            next_page_id: self.first_page_id,
            next_slot: 0,
        }
    }
}

/// Cursor over a [`TableHeap`].
///
/// Pins the page it is positioned on but takes the page latch only inside
/// `next`. Dropping the iterator releases the pin.
pub struct TableIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<PageGuard>,
    next_page_id: PageId,
    next_slot: u16,
}

enum Step {
    Tuple(RecordId, Vec<u8>),
    EndOfPage(PageId),
    Failed(DbError),
}

impl Iterator for TableIterator {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.guard.is_none() {
                if !self.next_page_id.is_valid() {
                    return None;
                }
                match self.bpm.fetch_page_guard(self.next_page_id) {
                    Ok(guard) => {
                        self.guard = Some(guard);
                        self.next_slot = 0;
                    }
                    Err(err) => {
                        self.next_page_id = INVALID_PAGE_ID;
                        return Some(Err(err));
                    }
                }
            }

            let guard = self.guard.as_ref()?;
            let step = {
                let data = guard.read();
                let page = TablePage::new(&data[..]);
                match page.next_live_slot(self.next_slot) {
                    Some(slot_id) => match page.get_tuple(slot_id) {
                        Ok(tuple) => {
                            Step::Tuple(RecordId::new(guard.page_id(), slot_id), tuple.to_vec())
                        }
                        Err(err) => Step::Failed(err),
                    },
                    None => Step::EndOfPage(page.next_page_id()),
                }
            };

            match step {
                Step::Tuple(rid, tuple) => {
                    self.next_slot = rid.slot_id.as_u16() + 1;
                    return Some(Ok((rid, tuple)));
                }
                Step::EndOfPage(next_page_id) => {
                    self.guard = None;
                    self.next_page_id = next_page_id;
                }
                Step::Failed(err) => {
                    self.guard = None;
                    self.next_page_id = INVALID_PAGE_ID;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_heap(pool_size: usize) -> (Arc<BufferPoolManager>, TableHeap) {
        let bpm = Arc::new(BufferPoolManager::builder().pool_size(pool_size).build());
        let heap = TableHeap::create(Arc::clone(&bpm)).unwrap();
        (bpm, heap)
    }

    #[test]
    fn test_table_heap_insert_get() {
        let (bpm, heap) = create_heap(4);
        let rid = heap.insert_tuple(b"tuple-one").unwrap();
        assert_eq!(rid.page_id, heap.first_page_id());
        assert_eq!(heap.get_tuple(rid).unwrap(), b"tuple-one".to_vec());
        assert_eq!(bpm.pin_count(rid.page_id), Some(0));
    }

    #[test]
    fn test_table_heap_grows_chain_in_order() {
        let (bpm, heap) = create_heap(3);
        let tuple = vec![1u8; 1000];
        let rids: Vec<_> = (0..10).map(|_| heap.insert_tuple(&tuple).unwrap()).collect();

        let pages: std::collections::BTreeSet<_> = rids.iter().map(|rid| rid.page_id).collect();
        assert!(pages.len() >= 3);

        let scanned: Vec<_> = heap.iter().map(|item| item.unwrap().0).collect();
        assert_eq!(scanned, rids);
        for page_id in pages {
            assert!(matches!(bpm.pin_count(page_id), None | Some(0)));
        }
    }

    #[test]
    fn test_table_heap_too_large() {
        let (_bpm, heap) = create_heap(2);
        let err = heap.insert_tuple(&vec![0u8; MAX_TUPLE_SIZE + 1]).unwrap_err();
        assert!(matches!(err, DbError::TupleTooLarge { .. }));
        heap.insert_tuple(&vec![0u8; MAX_TUPLE_SIZE]).unwrap();
    }

    #[test]
    fn test_table_heap_delete_and_update() {
        let (_bpm, heap) = create_heap(4);
        let a = heap.insert_tuple(b"a").unwrap();
        let b = heap.insert_tuple(b"b").unwrap();

        heap.delete_tuple(a).unwrap();
        assert!(matches!(heap.get_tuple(a), Err(DbError::SlotNotFound(_))));

        let b2 = heap.update_tuple(b, b"bb").unwrap();
        assert_eq!(heap.get_tuple(b2).unwrap(), b"bb".to_vec());

        let remaining: Vec<_> = heap.iter().map(|item| item.unwrap().1).collect();
        assert_eq!(remaining, vec![b"bb".to_vec()]);
    }

    #[test]
    fn test_table_heap_update_failure_restores() {
        let (_bpm, heap) = create_heap(4);
        let rid = heap.insert_tuple(b"keep me").unwrap();

        let err = heap
            .update_tuple(rid, &vec![0u8; MAX_TUPLE_SIZE + 1])
            .unwrap_err();
        assert!(matches!(err, DbError::TupleTooLarge { .. }));
        assert_eq!(heap.get_tuple(rid).unwrap(), b"keep me".to_vec());
    }

    #[test]
    fn test_table_heap_reopen() {
        let (bpm, heap) = create_heap(4);
        for _ in 0..8 {
            heap.insert_tuple(&vec![2u8; 1500]).unwrap();
        }
        let first = heap.first_page_id();
        drop(heap);

        let reopened = TableHeap::open(Arc::clone(&bpm), first).unwrap();
        reopened.insert_tuple(b"tail").unwrap();
        assert_eq!(reopened.iter().count(), 9);
    }
}
