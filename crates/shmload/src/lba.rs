//! File sizing and physical-placement probes.
//!
//! The reader keys each staged request by the physical block address of the
//! file's first extent, obtained through the filesystem extent-map ioctl
//! (FIEMAP). A single-extent query is enough: the batch only needs a
//! seek-friendly submission order, not a full extent map.

use crate::BLOCK_SIZE;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

// ioctl request numbers, x86_64/aarch64 Linux.
// FS_IOC_FIEMAP = _IOWR('f', 11, struct fiemap)
const FS_IOC_FIEMAP: libc::c_ulong = 0xc020_660b;
// BLKGETSIZE64 = _IOR(0x12, 114, size_t)
const BLKGETSIZE64: libc::c_ulong = 0x8008_1272;

// Flush dirty pages first so delalloc extents have a physical address.
const FIEMAP_FLAG_SYNC: u32 = 0x0001;

// Kernel-facing mirrors of the uapi structs; several fields exist only for
// the ioctl ABI and are never read on the Rust side.
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct FiemapExtent {
    logical: u64,
    physical: u64,
    length: u64,
    reserved64: [u64; 2],
    flags: u32,
    reserved: [u32; 3],
}

/// `struct fiemap` header with room for exactly one inline extent.
#[repr(C)]
#[allow(dead_code)]
struct FiemapReq {
    start: u64,
    length: u64,
    flags: u32,
    mapped_extents: u32,
    extent_count: u32,
    reserved: u32,
    extents: [FiemapExtent; 1],
}

/// Physical block address of `fd`'s first extent.
///
/// Returns 0 for an empty file (nothing mapped). Callers treat a probe
/// failure as address 0 as well; the request still loads, it just sorts to
/// the front of its batch.
pub(crate) fn first_extent_lba(fd: RawFd) -> io::Result<u64> {
    let mut req = FiemapReq {
        start: 0,
        length: u64::MAX,
        flags: FIEMAP_FLAG_SYNC,
        mapped_extents: 0,
        extent_count: 1,
        reserved: 0,
        extents: [FiemapExtent {
            logical: 0,
            physical: 0,
            length: 0,
            reserved64: [0; 2],
            flags: 0,
            reserved: [0; 3],
        }],
    };

    let rc = unsafe { libc::ioctl(fd, FS_IOC_FIEMAP, std::ptr::addr_of_mut!(req)) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    if req.mapped_extents == 0 {
        return Ok(0);
    }
    Ok(req.extents[0].physical)
}

/// Length in bytes of the object behind `fd`.
///
/// Regular files report their stat size; block devices answer the device
/// size ioctl. Anything else is an error: the loader only reads files and
/// raw devices.
pub(crate) fn file_size(fd: RawFd) -> io::Result<u64> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    if unsafe { libc::fstat(fd, st.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstat succeeded and fully initialized the buffer.
    let st = unsafe { st.assume_init() };

    match st.st_mode & libc::S_IFMT {
        libc::S_IFREG => Ok(st.st_size as u64),
        libc::S_IFBLK => {
            let mut bytes: u64 = 0;
            let rc = unsafe { libc::ioctl(fd, BLKGETSIZE64, std::ptr::addr_of_mut!(bytes)) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(bytes)
        }
        _ => Err(io::Error::from_raw_os_error(libc::EINVAL)),
    }
}

/// Rounds `len` up to the next [`BLOCK_SIZE`] multiple, with a minimum of one
/// block so even an empty file gets a mappable payload.
#[inline]
pub fn round_to_block(len: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    len.max(1).div_ceil(block) * block
}
