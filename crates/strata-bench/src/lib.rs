//! Benchmark profiles for the Strata array containers.
//!
//! Shared sizing constants so the individual benches agree on what a
//! "small" and "large" working set means.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Element count fitting comfortably in L1.
pub const SMALL_LEN: usize = 1 << 10;

/// Element count well past L2 on typical hardware.
pub const LARGE_LEN: usize = 1 << 20;

/// Extents of the square grid used by the indexing benches.
pub const GRID_SIDE: usize = 512;
