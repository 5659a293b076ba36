//! Shared-memory plumbing.
//!
//! Two kinds of mapping back the engine:
//!
//! 1. One anonymous `MAP_SHARED` region holding all queue control data
//!    (worker states, entries, sort staging). Allocated once by
//!    [`crate::Loader::init`] before any worker is forked, so every process
//!    sees it at the same address.
//! 2. One named POSIX shm object per in-flight file, carrying the payload.
//!    The loader creates and maps it as the read destination; the worker maps
//!    the same object by name. Ownership moves by name, never by pointer.

use crate::entry::{MAX_PATH_LEN, SHM_NAME_LEN};
use std::ffi::CStr;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr::{self, NonNull};

// =============================================================================
// Anonymous shared region
// =============================================================================

/// Page-aligned anonymous shared mapping; unmapped on drop.
pub(crate) struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
}

// Safety: the region is plain shared memory; all access synchronization is
// the responsibility of the structures placed inside it.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocates `len` bytes of anonymous memory shared with all future
    /// forked children.
    pub(crate) fn alloc(len: usize) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: mmap returned something other than MAP_FAILED, which is
        // never null.
        let base = unsafe { NonNull::new_unchecked(ptr.cast::<u8>()) };
        Ok(Self { base, len })
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: base/len came from a successful mmap and are unmapped
        // exactly once.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.len);
        }
    }
}

// =============================================================================
// Named payload objects
// =============================================================================

/// Derives the shm object name for a request path: a leading `/` followed by
/// the path with every `/` replaced by `_`. The terminating NUL is preserved
/// and the input is truncated at [`MAX_PATH_LEN`] bytes.
pub fn shm_name_for_path(path: &[u8]) -> [u8; SHM_NAME_LEN] {
    let mut name = [0u8; SHM_NAME_LEN];
    name[0] = b'/';
    for (i, &b) in path.iter().take(MAX_PATH_LEN).enumerate() {
        if b == 0 {
            break;
        }
        name[i + 1] = if b == b'/' { b'_' } else { b };
    }
    name
}

/// Creates (or reopens) the named object with owner-only read/write access.
pub(crate) fn shm_create(name: &CStr) -> io::Result<RawFd> {
    // mode 0600: payloads are private to the loader/worker pair.
    let fd = unsafe {
        libc::shm_open(
            name.as_ptr(),
            libc::O_CREAT | libc::O_RDWR,
            0o600 as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Opens an existing named object read/write.
pub(crate) fn shm_open_existing(name: &CStr) -> io::Result<RawFd> {
    let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0o600 as libc::c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Grows the object to `len` bytes.
pub(crate) fn shm_resize(fd: RawFd, len: usize) -> io::Result<()> {
    if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Maps `len` bytes of `fd` read/write shared into this address space.
pub(crate) fn map_rw(fd: RawFd, len: usize) -> io::Result<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr.cast())
}

/// Unmaps a mapping produced by [`map_rw`].
pub(crate) fn unmap(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        // SAFETY: only ever called with a pointer/length pair returned by a
        // successful map_rw.
        unsafe {
            libc::munmap(ptr.cast(), len);
        }
    }
}

/// Removes the name from the shm namespace. The object itself lives on until
/// the last mapping and descriptor are gone.
pub(crate) fn shm_unlink_name(name: &CStr) -> io::Result<()> {
    if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
