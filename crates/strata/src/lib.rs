//! Strata: multi-dimensional, memory-space-aware array containers.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Strata sub-crates. For most users, adding `strata` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! // A 2-D grid of floats, default-initialized.
//! let mut heat = Array2::<f64>::with_extents(&[4, 8]).unwrap();
//! *heat.at_mut(&[2, 5]) = 1.0;
//! assert_eq!(heat.shape().as_slice(), &[4, 8]);
//!
//! // A growable 1-D array in an explicit memory space.
//! let mut samples = Array1::<i32>::with_capacity_in(4, MemorySpace::Host).unwrap();
//! for v in 0..5 {
//!     samples.push(v).unwrap();
//! }
//! assert_eq!(samples.capacity(), 8);
//!
//! // Read-only windows borrow the owner's buffer.
//! let view = samples.view();
//! assert_eq!(view.as_slice(), &[0, 1, 2, 3, 4]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for items not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Memory-space tags, allocator ids, extents, errors |
//! | [`mem`] | `strata-mem` | Allocator registry, backends, parallel dispatcher |
//! | [`array`] | `strata-array` | Owning arrays, views, layouts, element lifecycle |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Memory-space tags, allocator identity, extents, and error types
/// (`strata-core`).
pub use strata_core as types;

/// Allocator registry, pool backends, and the parallel dispatcher
/// (`strata-mem`).
///
/// The process-wide [`mem::MemoryRegistry`] resolves memory spaces to
/// allocators, tracks live allocations for reverse lookup, and moves
/// bytes in and out of non-host-accessible pools.
pub use strata_mem as mem;

/// Owning arrays, non-owning views, layouts, and element lifecycle
/// (`strata-array`).
pub use strata_array as array;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use strata_array::{
        array_eq, Array, Array1, Array2, Array3, ArrayLike, ArrayView, ArrayViewMut, Flat, Grid,
        Layout,
    };
    pub use strata_core::{AllocatorId, ExecutionMode, Extents, MemError, MemorySpace};
    pub use strata_mem::{Dispatcher, MemoryRegistry};
}
