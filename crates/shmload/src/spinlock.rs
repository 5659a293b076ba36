use crate::Backoff;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The status lists are mutated by the loader process and by every worker
// process, all of which map the same anonymous shared region. The lock
// therefore cannot be a std::sync::Mutex (whose pthread state is not
// guaranteed process-shared on every libc); it is a bare test-and-test-and-set
// word. An AtomicU32 placed in shared memory is a plain u32 in RAM, and the
// LOCK CMPXCHG / LDAXR instructions that implement compare_exchange operate on
// physical memory, so the same protocol that is correct between threads is
// correct between processes.
//
// Hold times are a handful of pointer writes (one list splice), so a spin
// acquisition with adaptive backoff beats any sleeping lock here.
//
// =============================================================================

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Process-shared spin lock.
///
/// Protects exactly one status list head. Acquire via [`SpinLock::lock`],
/// release by dropping the returned guard.
#[repr(C)]
pub(crate) struct SpinLock {
    state: AtomicU32,
}

impl SpinLock {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Spins until the lock is acquired.
    #[inline]
    pub(crate) fn lock(&self) -> SpinGuard<'_> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            // Wait for the word to look free before retrying the RMW, so
            // contending CPUs are not bouncing the cache line with failed
            // compare-exchanges.
            while self.state.load(Ordering::Relaxed) == LOCKED {
                backoff.wait();
            }
        }
    }

    /// Single acquisition attempt.
    #[inline]
    pub(crate) fn try_lock(&self) -> Option<SpinGuard<'_>> {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }
}

/// RAII guard; the lock is released when this is dropped.
pub(crate) struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        // Release pairs with the Acquire in try_lock and publishes every
        // list-pointer write made while the lock was held.
        self.lock.state.store(UNLOCKED, Ordering::Release);
    }
}
