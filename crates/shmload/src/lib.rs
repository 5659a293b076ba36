//! shmload - Cross-Process Asynchronous File Loader
//!
//! Worker processes enqueue file-path requests; a dedicated loader process
//! reads the files with io_uring and hands the bytes back through named
//! shared-memory objects. Requests are batched and reordered by the physical
//! block address of each file's first extent before submission, so a burst of
//! randomly-ordered requests turns into a near-sequential device read pattern.
//!
//! # Key Features
//!
//! - Per-worker request queues in one anonymous shared mapping (no copies of
//!   control data between processes)
//! - Three-list entry state machine: `free -> ready -> in flight -> completed`
//! - LBA-sorted bulk submission with eager submit of partial batches under
//!   low load
//! - Zero-copy payload delivery: the loader reads straight into a named shm
//!   object that the worker maps by name
//!
//! # Example
//!
//! ```no_run
//! use shmload_rs::{Loader, LoaderConfig};
//!
//! let loader = Loader::init(LoaderConfig::new(64, 1, 32)).unwrap();
//!
//! // Typical topology: fork workers here, then run the loader loops.
//! // Workers inherit the shared region and use the queue API:
//! let worker = loader.worker(0);
//! worker.try_request("/var/data/shard-00.bin");
//! # loader.start();
//! ```
//!
//! # Cross-process addressing
//!
//! All queue state lives in a single `MAP_SHARED | MAP_ANONYMOUS` region
//! allocated by [`Loader::init`]. Intrusive list links are raw addresses into
//! that region; they stay valid in every participating process because the
//! region is created *before* workers are forked and is inherited at the same
//! virtual address. Processes that do not descend from the initializing
//! process cannot join a loader.

mod backoff;
mod config;
mod entry;
mod error;
mod invariants;
mod lba;
mod list;
mod loader;
mod region;
pub mod sort;
mod spinlock;
mod worker;

pub use backoff::Backoff;
pub use config::LoaderConfig;
pub use entry::{Entry, MAX_PATH_LEN};
pub use error::InitError;
pub use lba::round_to_block;
pub use loader::Loader;
pub use region::shm_name_for_path;
pub use worker::{Fetched, Worker};

/// Alignment (and rounding granularity) of every payload, in bytes.
///
/// File sizes are rounded up to the next multiple of this before the shm
/// object backing the payload is created, which keeps the destination buffer
/// acceptable for `O_DIRECT` reads.
pub const BLOCK_SIZE: usize = 4096;
