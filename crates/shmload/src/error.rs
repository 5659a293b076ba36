use std::io;
use thiserror::Error;

/// Errors surfaced by [`crate::Loader::init`].
///
/// Every variant that wraps an OS failure keeps the original `io::Error`, so
/// callers that need the classic negated-errno convention can recover it via
/// [`InitError::to_errno`].
#[derive(Debug, Error)]
pub enum InitError {
    /// The configuration failed validation before any resource was touched.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The anonymous shared region could not be allocated.
    #[error("shared region allocation failed: {0}")]
    RegionAlloc(#[source] io::Error),

    /// io_uring setup failed.
    #[error("io_uring setup failed: {0}")]
    RingSetup(#[source] io::Error),
}

impl InitError {
    /// Returns the failure as a negated errno value.
    ///
    /// Falls back to `-EINVAL` when the underlying error carries no errno
    /// (which only happens for validation failures).
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) => -libc::EINVAL,
            Self::RegionAlloc(e) | Self::RingSetup(e) => {
                -e.raw_os_error().unwrap_or(libc::EINVAL)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        let e = InitError::RegionAlloc(io::Error::from_raw_os_error(libc::ENOMEM));
        assert_eq!(e.to_errno(), -libc::ENOMEM);

        let e = InitError::InvalidConfig("dispatch_n too large");
        assert_eq!(e.to_errno(), -libc::EINVAL);
    }
}
