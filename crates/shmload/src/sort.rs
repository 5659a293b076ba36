//! Key-ordered sort over handle arrays.
//!
//! The reader stages pending I/Os as `(key, payload)` handles, where the key
//! is the physical block address of the file's first extent, then sorts the
//! batch ascending before submission so the device sees a near-sequential
//! access pattern.
//!
//! Small batches use insertion sort; larger ones use merge sort with a
//! scratch buffer that stays on the stack while it fits in 64 KiB and spills
//! to the heap beyond that. Stability is not required (ties keep insertion
//! order as implemented, but callers must not rely on it).

use std::mem;
use std::os::raw::c_void;
use std::ptr;

/// Sortable handle: an ordering key plus an opaque payload pointer.
///
/// The payload is never dereferenced here; the sort permutes handle pointers
/// only.
#[repr(C)]
#[derive(Debug)]
pub struct Sortable {
    pub key: u64,
    pub payload: *mut c_void,
}

/// Batches at or below this length use insertion sort.
const SMALL_N: usize = 16;

/// Largest merge scratch kept on the stack.
const MAX_STACK_BYTES: usize = 64 * 1024;

const STACK_SLOTS: usize = MAX_STACK_BYTES / mem::size_of::<*mut Sortable>();

/// Sorts `handles` in ascending key order.
///
/// # Safety
///
/// Every pointer in `handles` must be valid for reads of a [`Sortable`] for
/// the duration of the call.
pub unsafe fn sort(handles: &mut [*mut Sortable]) {
    let n = handles.len();
    if n < SMALL_N {
        insertion_sort(handles);
        return;
    }

    if n <= STACK_SLOTS {
        let mut scratch = [ptr::null_mut::<Sortable>(); STACK_SLOTS];
        merge_sort(handles, &mut scratch[..n]);
    } else {
        let mut scratch = vec![ptr::null_mut::<Sortable>(); n];
        merge_sort(handles, &mut scratch);
    }
}

/// O(n^2) insertion sort, fast when n is small.
unsafe fn insertion_sort(handles: &mut [*mut Sortable]) {
    for i in 1..handles.len() {
        let elem = handles[i];
        let key = (*elem).key;

        // Shift everything larger one slot right, then drop ELEM in.
        let mut j = i;
        while j > 0 && (*handles[j - 1]).key > key {
            handles[j] = handles[j - 1];
            j -= 1;
        }
        handles[j] = elem;
    }
}

/// Recursive merge sort; `scratch` must be at least as long as `handles`.
unsafe fn merge_sort(handles: &mut [*mut Sortable], scratch: &mut [*mut Sortable]) {
    let n = handles.len();
    if n < SMALL_N {
        insertion_sort(handles);
        return;
    }

    let mid = n / 2;
    {
        let (left, right) = handles.split_at_mut(mid);
        let (scratch_left, scratch_right) = scratch.split_at_mut(mid);
        merge_sort(left, scratch_left);
        merge_sort(right, scratch_right);
    }

    // Merge the two sorted halves into scratch, then copy back.
    let mut lptr = 0;
    let mut rptr = mid;
    for slot in scratch[..n].iter_mut() {
        if lptr == mid {
            *slot = handles[rptr];
            rptr += 1;
        } else if rptr == n {
            *slot = handles[lptr];
            lptr += 1;
        } else if (*handles[lptr]).key <= (*handles[rptr]).key {
            *slot = handles[lptr];
            lptr += 1;
        } else {
            *slot = handles[rptr];
            rptr += 1;
        }
    }
    handles.copy_from_slice(&scratch[..n]);
}
