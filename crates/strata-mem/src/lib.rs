//! Memory-space registry and allocator backends for Strata.
//!
//! This crate owns all byte-level memory management: the mapping from
//! [`strata_core::MemorySpace`] tags to allocator backends, tracked
//! allocate/deallocate/reallocate primitives, best-effort reverse
//! pointer attribution, and the parallel element-wise dispatcher.
//!
//! It is one of two crates in the workspace that may contain `unsafe`
//! code (along with `strata-array`). Every `unsafe` block carries a
//! `// SAFETY:` comment.
//!
//! # Architecture
//!
//! ```text
//! MemoryRegistry (process-wide singleton)
//! ├── AllocatorId → Box<dyn AllocatorBackend>   (one per space)
//! ├── MemorySpace → AllocatorId                 (space binding)
//! ├── live allocation table (addr → id/bytes/align)
//! └── default space (set once at startup, read thereafter)
//! ```
//!
//! Non-host-accessible pools ([`backend::DevicePool`]) may only be
//! touched through the bulk [`backend::AllocatorBackend::copy_in`] /
//! [`backend::AllocatorBackend::copy_out`] primitives; dereferencing
//! their pointers directly is a contract violation even where the
//! in-process stand-in would technically permit it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod dispatch;
pub mod registry;

pub use backend::AllocatorBackend;
pub use dispatch::Dispatcher;
pub use registry::MemoryRegistry;
