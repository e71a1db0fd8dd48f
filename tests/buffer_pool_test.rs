//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use rand::seq::SliceRandom;
use rand::thread_rng;
use slate::buffer::BufferPoolManager;
use slate::common::{DbError, PageId, PAGE_SIZE};
use slate::storage::disk::{DiskManager, FileDiskManager, MemoryDiskManager};
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    (Arc::new(BufferPoolManager::new(pool_size, 2, dm)), temp_file)
}

fn write_marker(bpm: &BufferPoolManager, page_id: PageId, marker: u8) {
    let mut guard = bpm.fetch_page_guard(page_id).unwrap();
    let mut data = guard.write();
    data[0] = marker;
    data[PAGE_SIZE - 1] = marker;
}

fn read_marker(bpm: &BufferPoolManager, page_id: PageId) -> (u8, u8) {
    let guard = bpm.fetch_page_guard(page_id).unwrap();
    let data = guard.read();
    (data[0], data[PAGE_SIZE - 1])
}

#[test]
fn test_buffer_pool_basic() {
    let (bpm, _temp) = create_bpm(10);

    let page_id = {
        let mut guard = bpm.new_page_guard().unwrap();
        guard.write()[..5].copy_from_slice(b"hello");
        guard.page_id()
    };
    assert_eq!(bpm.pin_count(page_id), Some(0));
    assert_eq!(bpm.is_dirty(page_id), Some(true));

    let guard = bpm.fetch_page_guard(page_id).unwrap();
    assert_eq!(&guard.read()[..5], b"hello");
    assert_eq!(bpm.pin_count(page_id), Some(1));
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let mut page_ids = Vec::new();
    {
        let dm = Arc::new(FileDiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(4, 2, dm);
        for i in 0..8u8 {
            let mut guard = bpm.new_page_guard().unwrap();
            guard.write()[0] = i + 1;
            page_ids.push(guard.page_id());
        }
        bpm.flush_all_pages().unwrap();
    }

    let dm = Arc::new(FileDiskManager::new(&path).unwrap());
    let bpm = BufferPoolManager::new(4, 2, dm);
    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_guard(page_id).unwrap();
        assert_eq!(guard.read()[0], i as u8 + 1);
    }
}

#[test]
fn test_buffer_pool_eviction_writes_back() {
    let (bpm, _temp) = create_bpm(3);

    let mut page_ids = Vec::new();
    for i in 0..10u8 {
        let page_id = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(page_id, false).unwrap();
        write_marker(&bpm, page_id, i);
        page_ids.push(page_id);
    }
    assert_eq!(bpm.resident_page_count(), 3);

    page_ids.shuffle(&mut thread_rng());
    for page_id in page_ids {
        let expected = page_id.as_u32() as u8;
        assert_eq!(read_marker(&bpm, page_id), (expected, expected));
    }
}

#[test]
fn test_buffer_pool_resident_fetch_never_evicts() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(4, 2, Arc::clone(&dm) as Arc<dyn DiskManager>);

    // Fill every frame with a dirty, unpinned page
    let page_ids: Vec<PageId> = (0..4u8)
        .map(|i| {
            let mut guard = bpm.new_page_guard().unwrap();
            guard.write()[0] = i;
            guard.page_id()
        })
        .collect();
    assert_eq!(bpm.free_frame_count(), 0);
    let (reads, writes) = (dm.num_reads(), dm.num_writes());

    for &page_id in page_ids.iter().rev() {
        let guard = bpm.fetch_page_guard(page_id).unwrap();
        assert_eq!(guard.read()[0], page_id.as_u32() as u8);
        assert_eq!(bpm.resident_page_count(), 4);
    }

    for &page_id in &page_ids {
        assert_eq!(bpm.pin_count(page_id), Some(0));
        assert_eq!(bpm.is_dirty(page_id), Some(true));
    }
    assert_eq!(dm.num_reads(), reads);
    assert_eq!(dm.num_writes(), writes);
}

#[test]
fn test_buffer_pool_flush_all_syncs_disk() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(4, 2, Arc::clone(&dm) as Arc<dyn DiskManager>);

    let page_id = {
        let mut guard = bpm.new_page_guard().unwrap();
        guard.write()[0] = 42;
        guard.page_id()
    };
    assert_eq!(dm.num_syncs(), 0);
    let writes = dm.num_writes();

    bpm.flush_all_pages().unwrap();
    assert_eq!(dm.num_syncs(), 1);
    assert_eq!(dm.num_writes(), writes + 1);
    assert_eq!(bpm.is_dirty(page_id), Some(false));

    // A clean pool still syncs but writes nothing
    bpm.flush_all_pages().unwrap();
    assert_eq!(dm.num_syncs(), 2);
    assert_eq!(dm.num_writes(), writes + 1);
}

#[test]
fn test_buffer_pool_pinned_pages_not_evicted() {
    let (bpm, _temp) = create_bpm(3);

    let guards: Vec<_> = (0..3).map(|_| bpm.new_page_guard().unwrap()).collect();
    assert!(matches!(bpm.new_page(), Err(DbError::BufferPoolFull)));
    assert!(matches!(
        bpm.fetch_page(PageId::new(100)),
        Err(DbError::BufferPoolFull)
    ));

    let released = guards[1].page_id();
    drop(guards);
    assert_eq!(bpm.pin_count(released), Some(0));

    let page = bpm.new_page().unwrap();
    assert_eq!(page.pin_count(), 1);
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(4);

    let guard = bpm.new_page_guard().unwrap();
    let page_id = guard.page_id();
    assert!(matches!(
        bpm.delete_page(page_id),
        Err(DbError::PageStillPinned(_))
    ));

    drop(guard);
    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.pin_count(page_id), None);
    assert_eq!(bpm.free_frame_count(), 4);

    // The id is recycled by the next allocation
    let reused = bpm.new_page_guard().unwrap();
    assert_eq!(reused.page_id(), page_id);
    assert!(reused.read().iter().all(|&b| b == 0));
}

#[test]
fn test_buffer_pool_flush() {
    let dm = Arc::new(MemoryDiskManager::new());
    let bpm = BufferPoolManager::builder()
        .pool_size(4)
        .disk_manager(Arc::clone(&dm) as Arc<dyn DiskManager>)
        .build();

    let page_id = {
        let mut guard = bpm.new_page_guard().unwrap();
        guard.write()[10] = 42;
        guard.page_id()
    };

    let mut on_disk = vec![0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut on_disk).unwrap();
    assert_eq!(on_disk[10], 0);

    assert!(bpm.flush_page(page_id).unwrap());
    assert_eq!(bpm.is_dirty(page_id), Some(false));
    dm.read_page(page_id, &mut on_disk).unwrap();
    assert_eq!(on_disk[10], 42);

    assert!(!bpm.flush_page(PageId::new(77)).unwrap());
}

#[test]
fn test_buffer_pool_concurrent_reads() {
    let (bpm, _temp) = create_bpm(8);

    let page_ids: Vec<_> = (0..4u8)
        .map(|i| {
            let mut guard = bpm.new_page_guard().unwrap();
            guard.write()[0] = i;
            guard.page_id()
        })
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            let page_ids = page_ids.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    for (i, &page_id) in page_ids.iter().enumerate() {
                        let guard = bpm.fetch_page_guard(page_id).unwrap();
                        assert_eq!(guard.read()[0], i as u8);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for page_id in page_ids {
        assert_eq!(bpm.pin_count(page_id), Some(0));
    }
}

#[test]
fn test_buffer_pool_concurrent_writers_with_eviction() {
    let (bpm, _temp) = create_bpm(4);

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                let mut mine = Vec::new();
                for _ in 0..6 {
                    // Another thread may briefly hold every frame
                    let page_id = loop {
                        match bpm.new_page_guard() {
                            Ok(mut guard) => {
                                guard.write()[0] = t;
                                break guard.page_id();
                            }
                            Err(DbError::BufferPoolFull) => thread::yield_now(),
                            Err(err) => panic!("unexpected error: {err}"),
                        }
                    };
                    mine.push(page_id);
                }
                mine
            })
        })
        .collect();

    let written: Vec<(u8, Vec<PageId>)> = handles
        .into_iter()
        .enumerate()
        .map(|(t, handle)| (t as u8, handle.join().unwrap()))
        .collect();

    for (t, page_ids) in written {
        for page_id in page_ids {
            let guard = bpm.fetch_page_guard(page_id).unwrap();
            assert_eq!(guard.read()[0], t);
        }
    }
}
