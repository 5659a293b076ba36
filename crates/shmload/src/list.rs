use crate::entry::Entry;
use crate::invariants::{debug_assert_circular, debug_assert_unlinked};
use crate::spinlock::SpinLock;
use crossbeam_utils::CachePadded;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// FIFO status list: a circular doubly-linked list of [`Entry`] records with
/// its own process-shared spin lock.
///
/// Each worker owns three of these (`free`, `ready`, `completed`). The list
/// takes no ownership of the entries it links; it only rewires their
/// `prev`/`next` fields. Exclusive membership (an entry on at most one list)
/// is the callers' contract, upheld by the entry lifecycle: the only way an
/// entry changes list is a `pop` from one followed by a `push` onto another.
///
/// Shape invariant: the head's `prev` points at the tail and the tail's
/// `next` points at the head; a singleton points at itself both ways.
#[repr(C)]
pub(crate) struct FifoList {
    /// Current head, null when empty. Atomic only so that [`Self::is_empty`]
    /// may be read without the lock; all stores happen under the lock.
    head: AtomicPtr<Entry>,
    lock: CachePadded<SpinLock>,
}

impl FifoList {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            lock: CachePadded::new(SpinLock::new()),
        }
    }

    /// Racy emptiness probe.
    ///
    /// Deliberately lock-free: `try_get` uses it to skip the lock entirely on
    /// the (common) empty path. A false negative or positive only delays or
    /// wastes one lock acquisition; it can never corrupt the list.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }

    /// Appends `entry` at the tail.
    ///
    /// # Safety
    ///
    /// `entry` must point at a valid [`Entry`] inside the shared region and
    /// must not currently be linked into any list.
    pub(crate) unsafe fn push(&self, entry: *mut Entry) {
        let _guard = self.lock.lock();
        debug_assert_unlinked!(entry);

        let head = self.head.load(Ordering::Relaxed);
        if head.is_null() {
            (*entry).prev = entry;
            (*entry).next = entry;
            self.head.store(entry, Ordering::Relaxed);
        } else {
            // Splice in front of the head; the newcomer becomes the tail.
            let tail = (*head).prev;
            (*tail).next = entry;
            (*entry).prev = tail;
            (*entry).next = head;
            (*head).prev = entry;
        }
    }

    /// Detaches and returns the head (the oldest element), or `None` when the
    /// list is empty. The returned entry's link fields are nulled.
    ///
    /// # Safety
    ///
    /// Every entry reachable from the head must be a valid [`Entry`] in the
    /// shared region (guaranteed by `push`'s contract).
    pub(crate) unsafe fn pop(&self) -> Option<*mut Entry> {
        let _guard = self.lock.lock();

        let head = self.head.load(Ordering::Relaxed);
        if head.is_null() {
            return None;
        }
        debug_assert_circular!(head);

        if (*head).next == head {
            // Singleton: list becomes empty.
            self.head.store(ptr::null_mut(), Ordering::Relaxed);
        } else {
            let tail = (*head).prev;
            let next = (*head).next;
            (*next).prev = tail;
            (*tail).next = next;
            self.head.store(next, Ordering::Relaxed);
        }

        (*head).prev = ptr::null_mut();
        (*head).next = ptr::null_mut();
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    fn entries(n: usize) -> Vec<Box<Entry>> {
        (0..n)
            .map(|_| {
                let mut boxed = Box::new(unsafe { std::mem::zeroed::<Entry>() });
                boxed.prev = ptr::null_mut();
                boxed.next = ptr::null_mut();
                boxed
            })
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let list = FifoList::new();
        let mut es = entries(3);
        let (a, b, c) = (
            std::ptr::addr_of_mut!(*es[0]),
            std::ptr::addr_of_mut!(*es[1]),
            std::ptr::addr_of_mut!(*es[2]),
        );

        unsafe {
            list.push(a);
            list.push(b);
            list.push(c);

            assert_eq!(list.pop(), Some(a));
            assert_eq!(list.pop(), Some(b));
            assert_eq!(list.pop(), Some(c));
            assert_eq!(list.pop(), None);
        }
    }

    #[test]
    fn test_singleton_points_at_itself() {
        let list = FifoList::new();
        let mut es = entries(2);
        let (a, b) = (
            std::ptr::addr_of_mut!(*es[0]),
            std::ptr::addr_of_mut!(*es[1]),
        );

        unsafe {
            list.push(a);
            list.push(b);
            assert_eq!(list.pop(), Some(a));

            // One element left: it must be circular onto itself.
            assert_eq!((*b).prev, b);
            assert_eq!((*b).next, b);
        }
    }

    #[test]
    fn test_pop_clears_links() {
        let list = FifoList::new();
        let mut es = entries(2);
        let (a, b) = (
            std::ptr::addr_of_mut!(*es[0]),
            std::ptr::addr_of_mut!(*es[1]),
        );

        unsafe {
            list.push(a);
            list.push(b);
            let popped = list.pop().unwrap();
            assert!((*popped).prev.is_null());
            assert!((*popped).next.is_null());
        }
    }

    #[test]
    fn test_interleaved_push_pop() {
        let list = FifoList::new();
        let mut es = entries(4);
        let ptrs: Vec<*mut Entry> = es
            .iter_mut()
            .map(|e| std::ptr::addr_of_mut!(**e))
            .collect();

        unsafe {
            list.push(ptrs[0]);
            list.push(ptrs[1]);
            assert_eq!(list.pop(), Some(ptrs[0]));
            list.push(ptrs[2]);
            list.push(ptrs[3]);
            assert_eq!(list.pop(), Some(ptrs[1]));
            assert_eq!(list.pop(), Some(ptrs[2]));
            assert_eq!(list.pop(), Some(ptrs[3]));
            assert!(list.is_empty());
        }
    }

    #[test]
    fn test_empty_probe() {
        let list = FifoList::new();
        assert!(list.is_empty());

        let mut es = entries(1);
        let a = std::ptr::addr_of_mut!(*es[0]);
        unsafe {
            list.push(a);
            assert!(!list.is_empty());
            list.pop();
            assert!(list.is_empty());
        }
    }
}
