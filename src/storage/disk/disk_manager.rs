use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{DbError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// File-backed disk manager.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE` of a single database file.
/// Reading past the end of the file yields zeros. Deallocated page ids are
/// kept in memory and handed out again by `allocate_page`.
pub struct FileDiskManager {
    db_file: Mutex<File>,
    db_path: PathBuf,
    num_pages: AtomicU32,
    free_pages: Mutex<Vec<PageId>>,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
    /// Number of `sync` calls that reached the device
    num_syncs: AtomicU32,
}

impl FileDiskManager {
    /// Opens the database file, creating it if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;
        debug!(path = %db_path.as_ref().display(), num_pages, "opened database file");

        Ok(Self {
            db_file: Mutex::new(file),
            db_path: db_path.as_ref().to_path_buf(),
            num_pages: AtomicU32::new(num_pages),
            free_pages: Mutex::new(Vec::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
            num_syncs: AtomicU32::new(0),
        })
    }

    fn offset(page_id: PageId) -> u64 {
        page_id.as_u32() as u64 * PAGE_SIZE as u64
    }

    fn check_page_id(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }
        Ok(())
    }

    fn check_buffer(len: usize) -> Result<()> {
        if len != PAGE_SIZE {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("page buffer must be {PAGE_SIZE} bytes, got {len}"),
            )));
        }
        Ok(())
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn num_syncs(&self) -> u32 {
        self.num_syncs.load(Ordering::Relaxed)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        self.check_page_id(page_id)?;
        Self::check_buffer(data.len())?;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(Self::offset(page_id)))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data[filled..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!(%page_id, "read page");
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_page_id(page_id)?;
        Self::check_buffer(data.len())?;

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(%page_id, "wrote page");
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let recycled = self.free_pages.lock().pop();
        let page_id = match recycled {
            Some(page_id) => page_id,
            None => PageId::new(self.num_pages.fetch_add(1, Ordering::SeqCst)),
        };

        let zeros = [0u8; PAGE_SIZE];
        self.write_page(page_id, &zeros)?;
        debug!(%page_id, recycled = recycled.is_some(), "allocated page");
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.check_page_id(page_id)?;
        if page_id.as_u32() >= self.num_pages() {
            return Err(DbError::PageNotFound(page_id));
        }

        let mut free_pages = self.free_pages.lock();
        if !free_pages.contains(&page_id) {
            free_pages.push(page_id);
        }
        debug!(%page_id, "deallocated page");
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.db_file.lock().sync_all()?;
        self.num_syncs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.db_file.get_mut().sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_disk_manager_new() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();
        assert_eq!(dm.num_pages(), 0);
        assert_eq!(dm.db_path(), temp_file.path());
    }

    #[test]
    fn test_file_disk_manager_allocate_sequential() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        assert_eq!(dm.allocate_page().unwrap(), PageId::new(0));
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(1));
        assert_eq!(dm.num_pages(), 2);
    }

    #[test]
    fn test_file_disk_manager_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();
        let page_id = dm.allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();
        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);
        assert_eq!(dm.num_reads(), 1);
        // Allocation zero-fills, so two writes
        assert_eq!(dm.num_writes(), 2);
    }

    #[test]
    fn test_file_disk_manager_read_past_end_is_zeroed() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let mut data = [7u8; PAGE_SIZE];
        dm.read_page(PageId::new(5), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_disk_manager_recycles_deallocated() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();
        let p0 = dm.allocate_page().unwrap();
        let _p1 = dm.allocate_page().unwrap();

        let mut data = [9u8; PAGE_SIZE];
        dm.write_page(p0, &data).unwrap();
        dm.deallocate_page(p0).unwrap();

        assert_eq!(dm.allocate_page().unwrap(), p0);
        assert_eq!(dm.num_pages(), 2);
        dm.read_page(p0, &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_disk_manager_rejects_bad_input() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let mut short = [0u8; 16];
        assert!(dm.read_page(PageId::new(0), &mut short).is_err());
        assert!(matches!(
            dm.deallocate_page(PageId::new(3)),
            Err(DbError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_file_disk_manager_persistence() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let dm = FileDiskManager::new(&path).unwrap();
            let page_id = dm.allocate_page().unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(page_id, &data).unwrap();
        }

        let dm = FileDiskManager::new(&path).unwrap();
        assert_eq!(dm.num_pages(), 1);
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(0), &mut data).unwrap();
        assert_eq!(data[0], 123);
    }
}
