use crate::region;
use crate::worker::WorkerState;
use std::ffi::CStr;
use std::os::unix::io::RawFd;
use std::ptr;

/// Longest request path accepted, in bytes (excluding the terminating NUL).
pub const MAX_PATH_LEN: usize = 128;

/// Length of the derived shm object name buffer: leading `/`, up to
/// [`MAX_PATH_LEN`] path bytes, terminating NUL.
pub const SHM_NAME_LEN: usize = MAX_PATH_LEN + 2;

/// One request/response record.
///
/// Lives inside the shared region for its whole life; moves through the
/// status lists as `free -> ready -> (in flight) -> completed -> (served) ->
/// free`. While in flight it is tracked only by the io_uring user-data tag;
/// while served it is owned by the worker-side [`crate::Fetched`] handle.
///
/// `repr(C)` with raw link pointers: all processes inherit the containing
/// region at the same address, so the pointers are meaningful everywhere.
#[repr(C)]
pub struct Entry {
    /// Request path, NUL-terminated.
    pub(crate) path: [u8; MAX_PATH_LEN + 1],
    /// File under read. Owned by the loader; valid from open to completion.
    pub(crate) fd: RawFd,
    /// Physical block address of the file's first extent. Sort key only.
    pub(crate) lba: u64,
    /// Payload length, rounded up to the next [`crate::BLOCK_SIZE`] multiple.
    pub(crate) size: usize,
    /// Name of the shm object transporting the payload.
    pub(crate) shm_name: [u8; SHM_NAME_LEN],

    /// Loader-side handle and mapping of the payload object.
    pub(crate) shm_loader_fd: RawFd,
    pub(crate) shm_loader_map: *mut u8,
    /// Set while a loader-side mapping exists. A stale mapping from the
    /// entry's previous use is torn down at the start of the next submission.
    pub(crate) shm_loader_mapped: bool,

    /// Worker-side handle and mapping; populated by `try_get`.
    pub(crate) shm_worker_fd: RawFd,
    pub(crate) shm_worker_map: *mut u8,

    /// Owning worker. Written once at init, read-only afterwards; the
    /// responder uses it to route completions.
    pub(crate) owner: *mut WorkerState,

    /// Intrusive status-list links. Null while the entry is in flight or
    /// served.
    pub(crate) prev: *mut Entry,
    pub(crate) next: *mut Entry,
}

impl Entry {
    /// Writes a vacant entry in place. `slot` may be uninitialized memory.
    pub(crate) unsafe fn init_vacant(slot: *mut Entry, owner: *mut WorkerState) {
        ptr::write(
            slot,
            Entry {
                path: [0; MAX_PATH_LEN + 1],
                fd: -1,
                lba: 0,
                size: 0,
                shm_name: [0; SHM_NAME_LEN],
                shm_loader_fd: -1,
                shm_loader_map: ptr::null_mut(),
                shm_loader_mapped: false,
                shm_worker_fd: -1,
                shm_worker_map: ptr::null_mut(),
                owner,
                prev: ptr::null_mut(),
                next: ptr::null_mut(),
            },
        );
    }

    /// Copies `path` in, truncating at [`MAX_PATH_LEN`] and always leaving a
    /// terminating NUL.
    pub(crate) fn set_path(&mut self, path: &str) {
        let bytes = path.as_bytes();
        let n = bytes.len().min(MAX_PATH_LEN);
        self.path[..n].copy_from_slice(&bytes[..n]);
        self.path[n..].fill(0);
    }

    /// The request path as a string slice.
    pub fn path(&self) -> &str {
        let nul = self
            .path
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_PATH_LEN);
        std::str::from_utf8(&self.path[..nul]).unwrap_or("")
    }

    /// Payload length in bytes (block-rounded).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// First-extent physical block address measured for this request.
    #[inline]
    pub fn lba(&self) -> u64 {
        self.lba
    }

    /// Fills `shm_name` from the current path.
    pub(crate) fn derive_shm_name(&mut self) {
        self.shm_name = region::shm_name_for_path(&self.path);
    }

    /// The derived shm name as a `CStr` (valid after `derive_shm_name`).
    pub(crate) fn shm_name_cstr(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.shm_name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vacant() -> Box<Entry> {
        let mut boxed = Box::new(unsafe { std::mem::zeroed::<Entry>() });
        unsafe {
            Entry::init_vacant(std::ptr::addr_of_mut!(*boxed), ptr::null_mut());
        }
        boxed
    }

    #[test]
    fn test_set_path_roundtrip() {
        let mut e = vacant();
        e.set_path("/tmp/hello");
        assert_eq!(e.path(), "/tmp/hello");
        assert_eq!(e.path[10], 0);
    }

    #[test]
    fn test_set_path_truncates_with_nul() {
        let long: String = std::iter::repeat('a').take(MAX_PATH_LEN + 40).collect();
        let mut e = vacant();
        e.set_path(&long);
        assert_eq!(e.path().len(), MAX_PATH_LEN);
        assert_eq!(e.path[MAX_PATH_LEN], 0);
    }

    #[test]
    fn test_set_path_clears_previous_tail() {
        let mut e = vacant();
        e.set_path("/a/very/long/path/here");
        e.set_path("/short");
        assert_eq!(e.path(), "/short");
    }

    #[test]
    fn test_shm_name_derivation() {
        let mut e = vacant();
        e.set_path("/tmp/hello");
        e.derive_shm_name();
        assert_eq!(e.shm_name_cstr().to_bytes(), b"/_tmp_hello");
    }
}
