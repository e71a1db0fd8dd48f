use parking_lot::Mutex;

use crate::common::{DbError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

#[derive(Default)]
struct MemoryState {
    pages: Vec<Box<[u8; PAGE_SIZE]>>,
    free_pages: Vec<PageId>,
}

/// In-memory disk manager for tests and scratch databases.
///
/// Unlike the file manager, reading a page id that was never allocated is an
/// error.
#[derive(Default)]
pub struct MemoryDiskManager {
    state: Mutex<MemoryState>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        let page = state
            .pages
            .get(page_id.as_u32() as usize)
            .ok_or(DbError::PageNotFound(page_id))?;
        if data.len() != PAGE_SIZE {
            return Err(DbError::InvalidPageId(page_id));
        }
        data.copy_from_slice(&page[..]);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let page = state
            .pages
            .get_mut(page_id.as_u32() as usize)
            .ok_or(DbError::PageNotFound(page_id))?;
        if data.len() != PAGE_SIZE {
            return Err(DbError::InvalidPageId(page_id));
        }
        page.copy_from_slice(data);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.state.lock();
        if let Some(page_id) = state.free_pages.pop() {
            state.pages[page_id.as_u32() as usize].fill(0);
            return Ok(page_id);
        }
        let page_id = PageId::new(state.pages.len() as u32);
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }
        state.pages.push(Box::new([0u8; PAGE_SIZE]));
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        if page_id.as_u32() as usize >= state.pages.len() {
            return Err(DbError::PageNotFound(page_id));
        }
        if !state.free_pages.contains(&page_id) {
            state.free_pages.push(page_id);
        }
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.state.lock().pages.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_disk_manager_round_trip() {
        let dm = MemoryDiskManager::new();
        let page_id = dm.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[10] = 77;
        dm.write_page(page_id, &data).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut out).unwrap();
        assert_eq!(out[10], 77);
    }

    #[test]
    fn test_memory_disk_manager_unknown_page() {
        let dm = MemoryDiskManager::new();
        let mut out = [0u8; PAGE_SIZE];
        let err = dm.read_page(PageId::new(4), &mut out).unwrap_err();
        assert!(matches!(err, DbError::PageNotFound(_)));
    }

    #[test]
    fn test_memory_disk_manager_reuses_freed_ids() {
        let dm = MemoryDiskManager::new();
        let p0 = dm.allocate_page().unwrap();
        dm.write_page(p0, &[5u8; PAGE_SIZE]).unwrap();
        dm.deallocate_page(p0).unwrap();
        dm.deallocate_page(p0).unwrap();

        assert_eq!(dm.allocate_page().unwrap(), p0);
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(1));

        let mut out = [1u8; PAGE_SIZE];
        dm.read_page(p0, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }
}
