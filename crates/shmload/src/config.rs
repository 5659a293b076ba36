use crate::error::InitError;

/// Configuration for [`crate::Loader::init`].
#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// Entries per worker queue (and hence max outstanding requests per
    /// worker).
    pub queue_depth: usize,
    /// Number of worker peers served by the loader.
    pub n_workers: usize,
    /// Target sort/submit batch size. Must not exceed
    /// `n_workers * queue_depth`.
    pub dispatch_n: usize,
    /// Per-worker idle tolerance before a partial batch is submitted eagerly.
    pub max_idle_iters: usize,
    /// Extra flags OR'd into the loader's `open(2)` calls. Always combined
    /// with `O_RDONLY`; write access is rejected. `O_DIRECT` is supported.
    pub open_flags: libc::c_int,
    /// Consecutive failing completions tolerated before the loader
    /// crash-stops (default 32).
    pub max_consecutive_failures: u32,
}

impl LoaderConfig {
    /// Creates a configuration with the three load-bearing knobs; the rest
    /// take their defaults.
    pub fn new(queue_depth: usize, n_workers: usize, dispatch_n: usize) -> Self {
        Self {
            queue_depth,
            n_workers,
            dispatch_n,
            ..Self::default()
        }
    }

    /// Sets the eager-submit idle tolerance.
    pub fn with_max_idle_iters(mut self, iters: usize) -> Self {
        self.max_idle_iters = iters;
        self
    }

    /// Sets extra `open(2)` flags (e.g. `libc::O_DIRECT`).
    pub fn with_open_flags(mut self, flags: libc::c_int) -> Self {
        self.open_flags = flags;
        self
    }

    /// Sets the crash-stop threshold for consecutive failing completions.
    pub fn with_max_consecutive_failures(mut self, n: u32) -> Self {
        self.max_consecutive_failures = n;
        self
    }

    /// Total queue entries across all workers.
    #[inline]
    pub(crate) fn total_entries(&self) -> usize {
        self.n_workers * self.queue_depth
    }

    /// Ring capacity: enough to hold every possible in-flight request at
    /// once. io_uring wants a power of two.
    #[inline]
    pub(crate) fn ring_entries(&self) -> u32 {
        (self.total_entries() as u32).next_power_of_two()
    }

    pub(crate) fn validate(&self) -> Result<(), InitError> {
        if self.queue_depth == 0 {
            return Err(InitError::InvalidConfig("queue_depth must be positive"));
        }
        if self.n_workers == 0 {
            return Err(InitError::InvalidConfig("n_workers must be positive"));
        }
        if self.dispatch_n == 0 {
            return Err(InitError::InvalidConfig("dispatch_n must be positive"));
        }
        if self.dispatch_n > self.total_entries() {
            return Err(InitError::InvalidConfig(
                "dispatch_n exceeds n_workers * queue_depth",
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(InitError::InvalidConfig(
                "max_consecutive_failures must be positive",
            ));
        }
        // The loader only ever reads; any write access mode is a caller bug.
        if self.open_flags & libc::O_ACCMODE != 0 {
            return Err(InitError::InvalidConfig(
                "open_flags must not request write access",
            ));
        }
        Ok(())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            n_workers: 1,
            dispatch_n: 32,
            max_idle_iters: 1024,
            open_flags: 0,
            max_consecutive_failures: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(LoaderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_dispatch_bounded_by_total_entries() {
        let config = LoaderConfig::new(2, 2, 5);
        assert!(config.validate().is_err());

        let config = LoaderConfig::new(2, 2, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_write_flags_rejected() {
        let config = LoaderConfig::new(4, 1, 2).with_open_flags(libc::O_WRONLY);
        assert!(config.validate().is_err());

        let config = LoaderConfig::new(4, 1, 2).with_open_flags(libc::O_RDWR);
        assert!(config.validate().is_err());

        let config = LoaderConfig::new(4, 1, 2).with_open_flags(libc::O_DIRECT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ring_entries_power_of_two() {
        let config = LoaderConfig::new(3, 3, 2);
        assert_eq!(config.ring_entries(), 16);
        assert!(config.ring_entries() as usize >= config.total_entries());
    }
}
