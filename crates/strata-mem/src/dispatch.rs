//! Element-wise dispatch over index ranges.
//!
//! The dispatcher is the stand-in for an accelerator kernel launch:
//! given an element count and a per-element function, it executes one
//! logical worker per element, either on the calling thread or fanned
//! out across a pool of scoped OS threads. Launches are synchronous;
//! `for_each` returns only after every index has been processed.

use std::ops::Range;
use std::sync::OnceLock;

use strata_core::ExecutionMode;

/// Synchronous per-element executor.
pub struct Dispatcher {
    mode: ExecutionMode,
}

impl Dispatcher {
    /// Number of chunks handed to each worker on average; keeps the
    /// channel short while still smoothing uneven per-element cost.
    const CHUNKS_PER_WORKER: usize = 4;

    /// Create a dispatcher with the given execution mode.
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    /// Install the process-wide dispatcher mode.
    ///
    /// May be called once, before the first use of
    /// [`Dispatcher::global`]; later calls are ignored.
    pub fn install(mode: ExecutionMode) {
        let _ = global_cell().set(Dispatcher::new(mode));
    }

    /// The process-wide dispatcher. Sequential unless
    /// [`Dispatcher::install`] configured otherwise.
    pub fn global() -> &'static Dispatcher {
        global_cell().get_or_init(|| Dispatcher::new(ExecutionMode::Sequential))
    }

    /// The configured execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run `f(i)` for every `i in 0..n`, blocking until all complete.
    pub fn for_each<F>(&self, n: usize, f: F)
    where
        F: Fn(usize) + Sync,
    {
        if n == 0 {
            return;
        }
        match self.mode {
            ExecutionMode::Sequential => {
                for i in 0..n {
                    f(i);
                }
            }
            ExecutionMode::Parallel { workers } => {
                let workers = workers.max(1).min(n);
                let chunk = n.div_ceil(workers * Self::CHUNKS_PER_WORKER).max(1);
                let (tx, rx) = crossbeam_channel::unbounded::<Range<usize>>();
                let mut start = 0;
                while start < n {
                    let end = (start + chunk).min(n);
                    // Send on an unbounded channel with the receiver
                    // alive cannot fail.
                    let _ = tx.send(start..end);
                    start = end;
                }
                drop(tx);
                let f = &f;
                std::thread::scope(|scope| {
                    for _ in 0..workers {
                        let rx = rx.clone();
                        scope.spawn(move || {
                            for range in rx.iter() {
                                for i in range {
                                    f(i);
                                }
                            }
                        });
                    }
                });
            }
        }
    }
}

fn global_cell() -> &'static OnceLock<Dispatcher> {
    static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sequential_touches_every_index_once() {
        let hits: Vec<AtomicUsize> = (0..100).map(|_| AtomicUsize::new(0)).collect();
        Dispatcher::new(ExecutionMode::Sequential).for_each(100, |i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn parallel_touches_every_index_once() {
        let hits: Vec<AtomicUsize> = (0..10_000).map(|_| AtomicUsize::new(0)).collect();
        Dispatcher::new(ExecutionMode::Parallel { workers: 4 }).for_each(10_000, |i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn zero_workers_is_treated_as_one() {
        let count = AtomicUsize::new(0);
        Dispatcher::new(ExecutionMode::Parallel { workers: 0 }).for_each(37, |_| {
            count.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(count.load(Ordering::Relaxed), 37);
    }

    #[test]
    fn empty_range_is_a_no_op() {
        Dispatcher::new(ExecutionMode::Parallel { workers: 8 }).for_each(0, |_| {
            panic!("must not be called");
        });
    }
}
