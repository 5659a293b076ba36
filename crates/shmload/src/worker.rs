use crate::entry::Entry;
use crate::list::FifoList;
use crate::region;
use std::marker::PhantomData;
use std::ptr;
use std::slice;

/// Per-worker queue bundle, resident in the shared region.
///
/// A fixed-capacity array of entries plus the three status lists. The entry
/// array itself also lives in the shared region, directly after the worker
/// states.
#[repr(C)]
pub(crate) struct WorkerState {
    /// First entry of this worker's slice of the entry array.
    pub(crate) queue: *mut Entry,
    /// Number of entries in `queue`.
    pub(crate) capacity: usize,

    /// Unused entries, ready to carry a new request.
    pub(crate) free: FifoList,
    /// Requests waiting for the reader to harvest them.
    pub(crate) ready: FifoList,
    /// Requests whose read has finished; waiting for `try_get`.
    pub(crate) completed: FifoList,
}

impl WorkerState {
    /// Writes a fresh worker state in place. `slot` may be uninitialized.
    /// The caller wires the entries into `free` afterwards.
    pub(crate) unsafe fn init_at(slot: *mut WorkerState, queue: *mut Entry, capacity: usize) {
        ptr::write(
            slot,
            WorkerState {
                queue,
                capacity,
                free: FifoList::new(),
                ready: FifoList::new(),
                completed: FifoList::new(),
            },
        );
    }
}

/// Handle to one worker's queues.
///
/// Obtained from [`crate::Loader::worker`]. The handle is valid in any
/// process that inherited the loader's shared region (the usual pattern is
/// `init`, `fork`, then each child grabbing its own index). None of the
/// methods ever block on I/O; the only waiting is a spin on one list lock.
pub struct Worker<'a> {
    state: *mut WorkerState,
    _loader: PhantomData<&'a ()>,
}

// Safety: every pointer reachable from the handle targets the process-shared
// region, and all mutation goes through the per-list spin locks.
unsafe impl Send for Worker<'_> {}

impl Worker<'_> {
    pub(crate) fn new(state: *mut WorkerState) -> Self {
        Self {
            state,
            _loader: PhantomData,
        }
    }

    /// Number of entries in this worker's queue.
    pub fn capacity(&self) -> usize {
        unsafe { (*self.state).capacity }
    }

    /// Enqueues a load request for `path`.
    ///
    /// Returns `false` when every entry is busy (the only failure mode);
    /// the caller decides whether to retry. Paths longer than
    /// [`crate::MAX_PATH_LEN`] bytes are truncated.
    pub fn try_request(&self, path: &str) -> bool {
        unsafe {
            let Some(e) = (*self.state).free.pop() else {
                return false;
            };
            (*e).set_path(path);
            (*self.state).ready.push(e);
        }
        true
    }

    /// Claims one completed request, mapping its payload into this process.
    ///
    /// Returns `None` when nothing has completed. The emptiness probe is
    /// deliberately lock-free so a polling worker does not fight the
    /// responder for the `completed` lock.
    ///
    /// # Panics
    ///
    /// Panics if the payload object published by the loader cannot be opened
    /// or mapped. The loader guarantees a working object exists before the
    /// entry reaches `completed`, so either failure is a corrupted handoff.
    pub fn try_get(&self) -> Option<Fetched<'_>> {
        unsafe {
            if (*self.state).completed.is_empty() {
                return None;
            }
            let e = (*self.state).completed.pop()?;

            let name = (*e).shm_name_cstr();
            let fd = match region::shm_open_existing(name) {
                Ok(fd) => fd,
                Err(err) => panic!(
                    "completed entry for {:?} has no payload object {:?}: {}",
                    (*e).path(),
                    name,
                    err
                ),
            };
            let map = match region::map_rw(fd, (*e).size) {
                Ok(map) => map,
                Err(err) => panic!(
                    "payload object {:?} ({} bytes) cannot be mapped: {}",
                    name,
                    (*e).size,
                    err
                ),
            };
            (*e).shm_worker_fd = fd;
            (*e).shm_worker_map = map;

            Some(Fetched {
                entry: e,
                _worker: PhantomData,
            })
        }
    }
}

/// A served request: the payload bytes plus the entry that carried them.
///
/// Dropping (or calling [`Fetched::release`]) unlinks the payload object,
/// closes the worker-side descriptor, unmaps the payload, and returns the
/// entry to its worker's `free` list.
pub struct Fetched<'a> {
    entry: *mut Entry,
    _worker: PhantomData<&'a ()>,
}

unsafe impl Send for Fetched<'_> {}

impl Fetched<'_> {
    /// The path this payload was read from.
    pub fn path(&self) -> &str {
        unsafe { (*self.entry).path() }
    }

    /// Payload length: the file length rounded up to the next
    /// [`crate::BLOCK_SIZE`] multiple. Bytes past the true file end are
    /// unspecified.
    pub fn size(&self) -> usize {
        unsafe { (*self.entry).size }
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts((*self.entry).shm_worker_map, self.size()) }
    }

    /// Mutable view of the payload. The object is private to this worker
    /// from `try_get` to `release`, so scribbling over it is allowed.
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut((*self.entry).shm_worker_map, self.size()) }
    }

    /// Returns the entry to the free list and tears down the payload
    /// mapping. Equivalent to dropping, spelled out for call sites where the
    /// handoff deserves to be visible.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Fetched<'_> {
    fn drop(&mut self) {
        unsafe {
            let e = self.entry;
            let name = (*e).shm_name_cstr();
            if let Err(err) = region::shm_unlink_name(name) {
                // The payload is still torn down; losing the name just means
                // a stale object if the loader somehow recreates it.
                log::warn!("shm_unlink of {:?} failed: {}", name, err);
            }
            libc::close((*e).shm_worker_fd);
            region::unmap((*e).shm_worker_map, (*e).size);
            (*e).shm_worker_fd = -1;
            (*e).shm_worker_map = ptr::null_mut();

            (*(*e).owner).free.push(e);
        }
    }
}
