//! Debug assertion macros for queue and payload invariants.
//!
//! Active only in debug builds, so there is zero overhead in release builds.
//! Used by the FIFO list primitive and the loader's I/O paths.

// =============================================================================
// List membership hygiene
// =============================================================================

/// Assert that an entry is not currently linked into any status list.
///
/// **Invariant**: an entry is on at most one of `free`/`ready`/`completed`;
/// between lists (in flight or served) both link fields are null.
///
/// Used in: `FifoList::push()` before splicing the entry in.
macro_rules! debug_assert_unlinked {
    ($entry:expr) => {
        debug_assert!(
            (*$entry).prev.is_null() && (*$entry).next.is_null(),
            "entry {:p} pushed while still linked (prev {:p}, next {:p})",
            $entry,
            (*$entry).prev,
            (*$entry).next
        )
    };
}

/// Assert the circular-list shape around a non-empty head.
///
/// **Invariant**: the head's `prev` is the tail and the tail's `next` is the
/// head; a singleton points at itself in both directions.
///
/// Used in: `FifoList::pop()` before detaching the head.
macro_rules! debug_assert_circular {
    ($head:expr) => {
        debug_assert!(
            (*(*$head).prev).next == $head && (*(*$head).next).prev == $head,
            "status list not circular around head {:p}",
            $head
        )
    };
}

// =============================================================================
// Payload sizing
// =============================================================================

/// Assert that a payload length has been rounded to the I/O block size.
///
/// **Invariant**: every size published to a worker is a multiple of
/// [`crate::BLOCK_SIZE`].
///
/// Used in: the responder before routing a completion.
macro_rules! debug_assert_block_rounded {
    ($size:expr) => {
        debug_assert!(
            $size % crate::BLOCK_SIZE == 0,
            "payload size {} not rounded to the {} byte block size",
            $size,
            crate::BLOCK_SIZE
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_block_rounded;
pub(crate) use debug_assert_circular;
pub(crate) use debug_assert_unlinked;
