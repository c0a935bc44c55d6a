//! Core types for the Strata array container family.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared by the rest of the workspace:
//! memory-space tags, allocator identity, extent vectors, execution
//! modes, error types, and the fatal-diagnostic primitive.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod diag;
pub mod error;
pub mod exec;
pub mod extent;
pub mod id;
pub mod space;

pub use error::MemError;
pub use exec::ExecutionMode;
pub use extent::{extents_product, Extents};
pub use id::AllocatorId;
pub use space::MemorySpace;
