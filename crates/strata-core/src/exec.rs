//! Execution-mode configuration for element-wise dispatch.

/// How element-wise operations over a range are executed.
///
/// Sequential mode runs on the controlling thread. Parallel mode fans
/// out one logical worker per element across a pool of OS threads; the
/// launch is synchronous either way; callers never observe partial
/// completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run on the calling thread, in index order.
    Sequential,
    /// Fan out across `workers` threads. Index order within the range
    /// is unspecified; completion is still all-or-nothing.
    Parallel {
        /// Number of worker threads. Zero is treated as one.
        workers: usize,
    },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sequential() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
    }
}
