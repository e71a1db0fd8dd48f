use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::common::{DbError, PageId, Result, DISK_SCHEDULER_QUEUE_DEPTH, PAGE_SIZE};

use super::DiskManager;

/// A disk I/O request. Each request carries the channel its result is sent
/// back on.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        reply: Sender<Result<Bytes>>,
    },
    Write {
        page_id: PageId,
        data: Bytes,
        reply: Sender<Result<()>>,
    },
}

/// Serializes page I/O through a single background worker.
///
/// Requests are processed in the order they were queued. Dropping the
/// scheduler closes the queue, lets the worker drain what is left and joins
/// it.
pub struct DiskScheduler {
    disk_manager: Arc<dyn DiskManager>,
    sender: Option<Sender<DiskRequest>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (sender, receiver) = bounded(DISK_SCHEDULER_QUEUE_DEPTH);
        let worker_dm = Arc::clone(&disk_manager);
        let worker_handle = thread::spawn(move || Self::run_worker(worker_dm, receiver));

        Self {
            disk_manager,
            sender: Some(sender),
            worker_handle: Some(worker_handle),
        }
    }

    /// Queues a request without waiting for it.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| DbError::DiskScheduler("scheduler is shut down".into()))?;
        sender
            .send(request)
            .map_err(|e| DiskScheduler::closed(e.to_string()))
    }

    /// Reads a page and blocks until the bytes are available.
    pub fn read_page(&self, page_id: PageId) -> Result<Bytes> {
        let (reply, rx) = bounded(1);
        self.schedule(DiskRequest::Read { page_id, reply })?;
        rx.recv().map_err(|e| DiskScheduler::closed(e.to_string()))?
    }

    /// Writes a page and blocks until the write completed.
    pub fn write_page(&self, page_id: PageId, data: Bytes) -> Result<()> {
        let (reply, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data,
            reply,
        })?;
        rx.recv().map_err(|e| DiskScheduler::closed(e.to_string()))?
    }

    pub fn disk_manager(&self) -> &Arc<dyn DiskManager> {
        &self.disk_manager
    }

    fn closed(reason: String) -> DbError {
        DbError::DiskScheduler(format!("request channel closed: {reason}"))
    }

    fn run_worker(disk_manager: Arc<dyn DiskManager>, receiver: Receiver<DiskRequest>) {
        debug!("disk scheduler worker started");
        // Ends once every sender is gone and the queue is drained
        for request in receiver.iter() {
            Self::process_request(disk_manager.as_ref(), request);
        }
        debug!("disk scheduler worker stopped");
    }

    fn process_request(disk_manager: &dyn DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read { page_id, reply } => {
                let mut buf = BytesMut::zeroed(PAGE_SIZE);
                let result = disk_manager
                    .read_page(page_id, &mut buf)
                    .map(|()| buf.freeze());
                if reply.send(result).is_err() {
                    trace!(%page_id, "read requester went away");
                }
            }
            DiskRequest::Write {
                page_id,
                data,
                reply,
            } => {
                let result = disk_manager.write_page(page_id, &data);
                if reply.send(result).is_err() {
                    trace!(%page_id, "write requester went away");
                }
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
