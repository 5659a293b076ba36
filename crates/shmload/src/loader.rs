use crate::config::LoaderConfig;
use crate::entry::Entry;
use crate::error::InitError;
use crate::invariants::debug_assert_block_rounded;
use crate::lba;
use crate::region::{self, SharedRegion};
use crate::sort::{self, Sortable};
use crate::worker::{Worker, WorkerState};
use crate::Backoff;
use io_uring::{opcode, types, IoUring, SubmissionQueue};
use log::{debug, error, warn};
use std::io;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Completion tag reserved for responder wakeups; entry tags are pointers
/// into the shared region and are never null.
const WAKE_USER_DATA: u64 = 0;

// =============================================================================
// SHARED ALLOCATION LAYOUT
// =============================================================================
//
// Everything a worker may touch lives in one anonymous shared mapping,
// carved into four back-to-back arrays:
//
//     LO                                                      HI
//     ┌───────────┬───────────┬────────────┬─────────────────┐
//     │WorkerState│   Entry   │  Sortable  │ *mut Sortable   │
//     │  structs  │  structs  │  wrappers  │   sort slots    │
//     └┬──────────┴┬──────────┴┬───────────┴┬────────────────┘
//      │           │           │            └► dispatch_n
//      │           │           └► dispatch_n
//      │           └► n_workers * queue_depth
//      └► n_workers
//
// WorkerState embeds cache-padded spin locks, so it has the strictest
// alignment of the four element types and goes first; the mapping itself is
// page aligned. Each later array starts where the previous one ends, and
// every element size is a multiple of its own alignment, so no padding is
// needed between the arrays.
//
// =============================================================================

/// The loader: owner of the shared allocation, the io_uring instance, and
/// the reader/responder loops.
///
/// One process runs the loops; any number of forked peers use
/// [`Loader::worker`] handles against the inherited region.
pub struct Loader {
    region: SharedRegion,
    states: *mut WorkerState,
    /// LBA staging: `dispatch_n` pointer slots, one per stageable request.
    /// The sort permutes these; each points at a key/payload wrapper carved
    /// from the region just before the slot array.
    slots: *mut *mut Sortable,
    ring: IoUring,
    config: LoaderConfig,
    shutdown: AtomicBool,
}

// Safety: the raw pointers target the process-shared region; list mutation is
// lock-protected and the staging buffer is only ever touched by the reader.
unsafe impl Send for Loader {}
unsafe impl Sync for Loader {}

/// Reader-loop cursor state, kept off the shared region because only the
/// reader thread ever sees it.
struct ReaderState {
    /// Round-robin worker cursor.
    cursor: usize,
    /// Entries staged for the next sorted submission.
    n_queued: usize,
    /// Harvest passes that found nothing while a partial stage waits.
    idle_iters: usize,
}

impl Loader {
    // ---------------------------------------------------------------------
    // BOOTSTRAP
    // ---------------------------------------------------------------------

    /// Allocates the shared region, wires every worker's queues, and sets up
    /// the submission ring.
    ///
    /// Call this *before* forking workers: children inherit the region at
    /// the same address, which is what keeps the intrusive list pointers
    /// valid everywhere.
    pub fn init(config: LoaderConfig) -> Result<Self, InitError> {
        config.validate()?;

        let n_workers = config.n_workers;
        let queue_depth = config.queue_depth;
        let dispatch_n = config.dispatch_n;

        let states_bytes = n_workers * mem::size_of::<WorkerState>();
        let entries_bytes = config.total_entries() * mem::size_of::<Entry>();
        let handles_bytes = dispatch_n * mem::size_of::<Sortable>();
        let slots_bytes = dispatch_n * mem::size_of::<*mut Sortable>();
        let total = states_bytes + entries_bytes + handles_bytes + slots_bytes;

        let region = SharedRegion::alloc(total).map_err(InitError::RegionAlloc)?;
        let base = region.as_ptr();

        let states = base.cast::<WorkerState>();
        // SAFETY: offsets stay inside the allocation computed above, and each
        // array start is aligned for its element type (see layout comment).
        let slots = unsafe {
            let entries = base.add(states_bytes).cast::<Entry>();
            let handles = base.add(states_bytes + entries_bytes).cast::<Sortable>();
            let slots = base
                .add(states_bytes + entries_bytes + handles_bytes)
                .cast::<*mut Sortable>();

            // Wire each worker: its entry slice, then the initial free list
            // linking every entry in index order.
            let mut entry_n = 0;
            for i in 0..n_workers {
                let ws = states.add(i);
                WorkerState::init_at(ws, entries.add(entry_n), queue_depth);
                for j in 0..queue_depth {
                    let e = (*ws).queue.add(j);
                    Entry::init_vacant(e, ws);
                    (*ws).free.push(e);
                }
                entry_n += queue_depth;
            }

            // Sort staging: wrappers plus the pointer slots the sort permutes.
            for k in 0..dispatch_n {
                let h = handles.add(k);
                ptr::write(
                    h,
                    Sortable {
                        key: 0,
                        payload: ptr::null_mut(),
                    },
                );
                ptr::write(slots.add(k), h);
            }

            slots
        };

        // If this fails the region drops here, undoing the allocation.
        let ring = IoUring::builder()
            .setup_clamp()
            .build(config.ring_entries())
            .map_err(InitError::RingSetup)?;

        Ok(Self {
            region,
            states,
            slots,
            ring,
            config,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Handle to worker `i`'s queues.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_workers`.
    pub fn worker(&self, i: usize) -> Worker<'_> {
        assert!(
            i < self.config.n_workers,
            "worker index {i} out of range (n_workers {})",
            self.config.n_workers
        );
        // SAFETY: index checked above; the state array outlives the handle.
        Worker::new(unsafe { self.states.add(i) })
    }

    /// The configuration this loader was initialized with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Total bytes of the shared control allocation.
    pub fn shared_bytes(&self) -> usize {
        self.region.len()
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Runs the engine: reader on a spawned thread, responder inline.
    ///
    /// Does not return under normal operation. It returns only after
    /// [`Loader::request_stop`], and exits the process if the completion
    /// stream wedges (see [`LoaderConfig::max_consecutive_failures`]).
    pub fn start(&self) {
        thread::scope(|s| {
            s.spawn(|| self.run_reader());
            self.run_responder();
        });
    }

    /// Asks both loops to wind down. In-flight reads are still drained and
    /// routed before the responder exits its wait.
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // READER
    // ---------------------------------------------------------------------

    /// Reader loop: harvest requests round-robin, stage them keyed by first
    /// extent address, submit sorted batches.
    ///
    /// Normally run by [`Loader::start`]; exposed for topologies that place
    /// the loops on their own threads. At most one reader may run at a time.
    pub fn run_reader(&self) {
        // SAFETY: this thread is the only toucher of the submission queue
        // (single-reader contract above).
        let mut sq = unsafe { self.ring.submission_shared() };
        let mut st = ReaderState {
            cursor: 0,
            n_queued: 0,
            idle_iters: 0,
        };
        let mut backoff = Backoff::new();

        loop {
            if self.stopping() {
                // Flush whatever is staged so nothing is stranded, then wake
                // the responder out of its completion wait.
                if st.n_queued > 0 {
                    self.submit_stage(&mut sq, st.n_queued);
                }
                self.wake_responder(&mut sq);
                return;
            }

            match self.reader_step(&mut st, &mut sq) {
                StepOutcome::Harvested => backoff.reset(),
                StepOutcome::Nothing => {
                    // Fully idle (nothing staged either): escalating wait.
                    // While a partial stage waits we keep the loop hot so
                    // the idle counter approximates elapsed time.
                    if st.n_queued == 0 {
                        backoff.wait();
                    }
                }
            }
        }
    }

    /// One pass of the reader loop: maybe submit, then harvest and stage at
    /// most one request.
    fn reader_step(&self, st: &mut ReaderState, sq: &mut SubmissionQueue<'_>) -> StepOutcome {
        let n_workers = self.config.n_workers;

        // Submit when the stage is full, or eagerly once the stage has been
        // idle long enough that more work is clearly not coming.
        if st.n_queued == self.config.dispatch_n
            || (st.n_queued > 0
                && st.idle_iters > self.config.max_idle_iters.saturating_mul(n_workers))
        {
            self.submit_stage(sq, st.n_queued);
            st.idle_iters = 0;
            st.n_queued = 0;
        }

        // Harvest one request, round-robin across workers.
        let ws = unsafe { self.states.add(st.cursor % n_workers) };
        st.cursor = st.cursor.wrapping_add(1);
        let Some(e) = (unsafe { (*ws).ready.pop() }) else {
            if st.n_queued > 0 {
                st.idle_iters += 1;
            }
            return StepOutcome::Nothing;
        };
        st.idle_iters = 0;

        // SAFETY: the entry came off a status list of this loader's region;
        // it is exclusively ours until staged or pushed back.
        unsafe {
            let fd = libc::open(
                (*e).path.as_ptr().cast(),
                libc::O_RDONLY | self.config.open_flags,
            );
            if fd < 0 {
                let err = io::Error::last_os_error();
                warn!(
                    "open({:?}) failed, requeueing: {} (flags {:#x})",
                    (*e).path(),
                    err,
                    self.config.open_flags
                );
                (*ws).ready.push(e);
                return StepOutcome::Harvested;
            }
            (*e).fd = fd;

            // Key by first-extent address; a failed probe still loads the
            // file, it just sorts to the front of the batch.
            (*e).lba = match lba::first_extent_lba(fd) {
                Ok(addr) => addr,
                Err(err) => {
                    debug!("extent probe failed for {:?}: {}", (*e).path(), err);
                    0
                }
            };

            let slot = *self.slots.add(st.n_queued);
            (*slot).key = (*e).lba;
            (*slot).payload = e.cast();
        }
        st.n_queued += 1;

        StepOutcome::Harvested
    }

    /// Sorts the staged batch by ascending LBA and submits it with a single
    /// ring flush. Entries whose submission fails go back to `ready`.
    fn submit_stage(&self, sq: &mut SubmissionQueue<'_>, n_queued: usize) {
        // SAFETY: slots holds dispatch_n valid wrapper pointers and only the
        // reader thread touches the staging buffer.
        unsafe {
            let staged = slice::from_raw_parts_mut(self.slots, n_queued);
            sort::sort(staged);

            for &slot in staged.iter() {
                let e = (*slot).payload.cast::<Entry>();
                if let Err(err) = self.perform_io(e, sq) {
                    error!(
                        "submission failed for {:?} (shm {:?}, {} bytes), requeueing: {}",
                        (*e).path(),
                        (*e).shm_name_cstr(),
                        (*e).size,
                        err
                    );
                    libc::close((*e).fd);
                    (*e).fd = -1;
                    (*(*e).owner).ready.push(e);
                }
            }
        }

        sq.sync();
        loop {
            match self.ring.submit() {
                Ok(_) => break,
                Err(err) if err.raw_os_error() == Some(libc::EINTR) => {}
                Err(err) => {
                    error!("io_uring submit failed: {}", err);
                    break;
                }
            }
        }
    }

    /// Sizes the payload, publishes the named shm object, and enqueues the
    /// read. On error, everything done so far is rolled back and the entry
    /// is left exactly as a fresh harvest would find it (fd still open).
    unsafe fn perform_io(&self, e: *mut Entry, sq: &mut SubmissionQueue<'_>) -> io::Result<()> {
        // A stale mapping from the entry's previous trip through the engine
        // is torn down first; reuse of a live mapping is not supported.
        if (*e).shm_loader_mapped {
            region::unmap((*e).shm_loader_map, (*e).size);
            libc::close((*e).shm_loader_fd);
            (*e).shm_loader_fd = -1;
            (*e).shm_loader_map = ptr::null_mut();
            (*e).shm_loader_mapped = false;
        }

        let len = lba::file_size((*e).fd)?;
        (*e).size = lba::round_to_block(len) as usize;
        (*e).derive_shm_name();
        let name = (*e).shm_name_cstr();

        let shm_fd = region::shm_create(name)?;
        if let Err(err) = region::shm_resize(shm_fd, (*e).size) {
            libc::close(shm_fd);
            let _ = region::shm_unlink_name(name);
            return Err(err);
        }
        let map = match region::map_rw(shm_fd, (*e).size) {
            Ok(map) => map,
            Err(err) => {
                libc::close(shm_fd);
                let _ = region::shm_unlink_name(name);
                return Err(err);
            }
        };
        (*e).shm_loader_fd = shm_fd;
        (*e).shm_loader_map = map;
        (*e).shm_loader_mapped = true;

        // One read covering the whole rounded payload, tagged with the entry
        // address for completion routing.
        let read = opcode::Read::new(types::Fd((*e).fd), map, (*e).size as u32)
            .offset(0)
            .build()
            .user_data(e as u64);

        if sq.push(&read).is_err() {
            // Ring view may be stale; publish consumed entries and retry once.
            sq.sync();
            if sq.push(&read).is_err() {
                region::unmap(map, (*e).size);
                libc::close(shm_fd);
                let _ = region::shm_unlink_name(name);
                (*e).shm_loader_fd = -1;
                (*e).shm_loader_map = ptr::null_mut();
                (*e).shm_loader_mapped = false;
                return Err(io::Error::from_raw_os_error(libc::EBUSY));
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // RESPONDER
    // ---------------------------------------------------------------------

    /// Responder loop: block on completions and route each one to the
    /// originating worker's `completed` list.
    ///
    /// Normally run by [`Loader::start`]; exposed for custom topologies. At
    /// most one responder may run at a time.
    pub fn run_responder(&self) {
        // SAFETY: this thread is the only toucher of the completion queue.
        let mut cq = unsafe { self.ring.completion_shared() };
        let mut consecutive_failures: u32 = 0;

        loop {
            cq.sync();
            let Some(cqe) = cq.next() else {
                if self.stopping() {
                    return;
                }
                match self.ring.submit_and_wait(1) {
                    Ok(_) => {}
                    Err(err) if err.raw_os_error() == Some(libc::EINTR) => {}
                    Err(err) => {
                        error!("completion wait failed: {}", err);
                        return;
                    }
                }
                continue;
            };

            if cqe.user_data() == WAKE_USER_DATA {
                continue;
            }

            let e = cqe.user_data() as *mut Entry;
            let res = cqe.result();

            if res < 0 {
                consecutive_failures += 1;
                self.log_failed_completion(e, res);
                if consecutive_failures > self.config.max_consecutive_failures {
                    error!(
                        "completion stream wedged: {} consecutive read failures, giving up",
                        consecutive_failures
                    );
                    std::process::exit(1);
                }
                // Failed reads are not retried; reclaim the entry so the
                // worker's queue depth is conserved.
                unsafe {
                    self.reclaim_failed(e);
                }
                continue;
            }
            consecutive_failures = 0;

            // SAFETY: the tag is the entry address perform_io submitted; the
            // entry stays pinned in the shared region while in flight.
            unsafe {
                debug_assert_block_rounded!((*e).size);
                libc::close((*e).fd);
                (*e).fd = -1;
                // The loader-side mapping stays alive on purpose: the worker
                // reaches the bytes through the object's name, and the
                // mapping is recycled lazily on the entry's next submission.
                (*(*e).owner).completed.push(e);
            }
        }
    }

    /// Tears down everything a failed read holds (file fd, loader-side
    /// payload mapping and object) and returns the entry to its worker's
    /// `free` list. From the worker's point of view the request simply never
    /// completes; the slot is immediately reusable.
    unsafe fn reclaim_failed(&self, e: *mut Entry) {
        libc::close((*e).fd);
        (*e).fd = -1;
        if (*e).shm_loader_mapped {
            region::unmap((*e).shm_loader_map, (*e).size);
            libc::close((*e).shm_loader_fd);
            let _ = region::shm_unlink_name((*e).shm_name_cstr());
            (*e).shm_loader_fd = -1;
            (*e).shm_loader_map = ptr::null_mut();
            (*e).shm_loader_mapped = false;
        }
        (*(*e).owner).free.push(e);
    }

    fn log_failed_completion(&self, e: *mut Entry, res: i32) {
        // SAFETY: same pinned-entry argument as the success path.
        unsafe {
            error!(
                "async read failed: {} (path {:?}, fd {}, flags {:#x}, shm {:?}, \
                 map {:p}, size {} bytes, map alignment {})",
                io::Error::from_raw_os_error(-res),
                (*e).path(),
                (*e).fd,
                self.config.open_flags,
                (*e).shm_name_cstr(),
                (*e).shm_loader_map,
                (*e).size,
                ((*e).shm_loader_map as usize) % crate::BLOCK_SIZE,
            );
        }
    }

    /// Pushes a tagged NOP so a responder parked in `submit_and_wait` gets a
    /// completion to chew on and re-checks the stop flag.
    fn wake_responder(&self, sq: &mut SubmissionQueue<'_>) {
        let nop = opcode::Nop::new().build().user_data(WAKE_USER_DATA);
        // SAFETY: ring capacity covers every entry plus this one nop; a full
        // queue here only delays wakeup until the next natural completion.
        unsafe {
            let _ = sq.push(&nop);
        }
        sq.sync();
        let _ = self.ring.submit();
    }

    /// Drives one blocking responder pass. Test hook for draining
    /// completions without committing a thread to [`Self::run_responder`].
    #[cfg(test)]
    fn drain_one(&self, cq: &mut io_uring::CompletionQueue<'_>) -> bool {
        loop {
            cq.sync();
            if let Some(cqe) = cq.next() {
                if cqe.user_data() == WAKE_USER_DATA {
                    continue;
                }
                let e = cqe.user_data() as *mut Entry;
                if cqe.result() < 0 {
                    unsafe {
                        self.reclaim_failed(e);
                    }
                    return false;
                }
                unsafe {
                    libc::close((*e).fd);
                    (*e).fd = -1;
                    (*(*e).owner).completed.push(e);
                }
                return true;
            }
            if self.ring.submit_and_wait(1).is_err() {
                return false;
            }
        }
    }
}

enum StepOutcome {
    /// A request was harvested (and staged or requeued).
    Harvested,
    /// Every ready list was empty at the cursor.
    Nothing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> String {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path.to_str().unwrap().to_owned()
    }

    #[test]
    fn test_init_layout_and_free_wiring() {
        let loader = Loader::init(LoaderConfig::new(4, 2, 4)).unwrap();

        // All capacity starts on the free lists, in index order.
        for i in 0..2 {
            let w = loader.worker(i);
            assert_eq!(w.capacity(), 4);
            for _ in 0..4 {
                assert!(w.try_request("/nonexistent"));
            }
            assert!(!w.try_request("/nonexistent"));
        }

        let expected = 2 * mem::size_of::<WorkerState>()
            + 8 * mem::size_of::<Entry>()
            + 4 * mem::size_of::<Sortable>()
            + 4 * mem::size_of::<*mut Sortable>();
        assert_eq!(loader.shared_bytes(), expected);
    }

    #[test]
    fn test_init_rejects_bad_config() {
        assert!(Loader::init(LoaderConfig::new(0, 1, 1)).is_err());
        assert!(Loader::init(LoaderConfig::new(2, 2, 5)).is_err());
    }

    #[test]
    fn test_round_robin_harvest_order() {
        // Harvest must interleave workers regardless of enqueue order. Large
        // dispatch_n and idle tolerance keep the stage from submitting, so
        // the staging buffer records the harvest order.
        let loader = Loader::init(
            LoaderConfig::new(4, 2, 8).with_max_idle_iters(usize::MAX / 2),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let a: Vec<String> = (0..3)
            .map(|i| write_temp(&dir, &format!("a{i}"), b"a"))
            .collect();
        let b: Vec<String> = (0..3)
            .map(|i| write_temp(&dir, &format!("b{i}"), b"b"))
            .collect();

        // Worker 0 enqueues all of its requests before worker 1 enqueues any.
        for path in &a {
            assert!(loader.worker(0).try_request(path));
        }
        for path in &b {
            assert!(loader.worker(1).try_request(path));
        }

        let mut sq = unsafe { loader.ring.submission_shared() };
        let mut st = ReaderState {
            cursor: 0,
            n_queued: 0,
            idle_iters: 0,
        };
        for _ in 0..6 {
            loader.reader_step(&mut st, &mut sq);
        }
        assert_eq!(st.n_queued, 6);

        let harvested: Vec<String> = (0..6)
            .map(|k| unsafe {
                let slot = *loader.slots.add(k);
                let e = (*slot).payload.cast::<Entry>();
                (*e).path().to_owned()
            })
            .collect();
        let expected = vec![
            a[0].clone(),
            b[0].clone(),
            a[1].clone(),
            b[1].clone(),
            a[2].clone(),
            b[2].clone(),
        ];
        assert_eq!(harvested, expected);

        // Close the fds the steps opened.
        for k in 0..6 {
            unsafe {
                let e = (*(*loader.slots.add(k))).payload.cast::<Entry>();
                libc::close((*e).fd);
            }
        }
    }

    #[test]
    fn test_full_stage_submits_and_completes() {
        let loader = Loader::init(LoaderConfig::new(4, 1, 2)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let p0 = write_temp(&dir, "x", &[7u8; 100]);
        let p1 = write_temp(&dir, "y", &[9u8; 5000]);

        let w = loader.worker(0);
        assert!(w.try_request(&p0));
        assert!(w.try_request(&p1));

        let mut sq = unsafe { loader.ring.submission_shared() };
        let mut st = ReaderState {
            cursor: 0,
            n_queued: 0,
            idle_iters: 0,
        };
        // Two harvests fill the stage; the next pass flushes it.
        loader.reader_step(&mut st, &mut sq);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 2);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 0);

        let mut cq = unsafe { loader.ring.completion_shared() };
        assert!(loader.drain_one(&mut cq));
        assert!(loader.drain_one(&mut cq));

        let mut sizes: Vec<usize> = (0..2)
            .map(|_| {
                let fetched = w.try_get().expect("completion routed");
                let size = fetched.size();
                fetched.release();
                size
            })
            .collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![4096, 8192]);
    }

    #[test]
    fn test_eager_submit_after_idle_passes() {
        // Stage 1 of a possible 8, then let idle passes push it out.
        let loader = Loader::init(
            LoaderConfig::new(8, 1, 8).with_max_idle_iters(2),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let p = write_temp(&dir, "solo", b"solo");

        let w = loader.worker(0);
        assert!(w.try_request(&p));

        let mut sq = unsafe { loader.ring.submission_shared() };
        let mut st = ReaderState {
            cursor: 0,
            n_queued: 0,
            idle_iters: 0,
        };
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 1);

        // The stage flushes once idle_iters exceeds
        // max_idle_iters * n_workers = 2: three idle passes accumulate, the
        // pass after that submits.
        loader.reader_step(&mut st, &mut sq);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 1);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 1);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 0);

        let mut cq = unsafe { loader.ring.completion_shared() };
        assert!(loader.drain_one(&mut cq));
        let fetched = w.try_get().expect("eagerly submitted read completed");
        assert_eq!(&fetched.data()[..4], b"solo");
        fetched.release();
    }

    #[test]
    fn test_open_failure_requeues() {
        let loader = Loader::init(LoaderConfig::new(2, 1, 2)).unwrap();
        let w = loader.worker(0);
        assert!(w.try_request("/definitely/not/a/file"));

        let mut sq = unsafe { loader.ring.submission_shared() };
        let mut st = ReaderState {
            cursor: 0,
            n_queued: 0,
            idle_iters: 0,
        };
        loader.reader_step(&mut st, &mut sq);
        // Nothing staged; the entry went back to ready for a later pass.
        assert_eq!(st.n_queued, 0);
        loader.reader_step(&mut st, &mut sq);
        assert_eq!(st.n_queued, 0);
    }
}
