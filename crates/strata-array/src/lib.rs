//! Multi-dimensional, memory-space-aware array containers.
//!
//! Two concrete containers share one indexing representation:
//!
//! - [`Array`]: owning, resizable, deep-const: a shared reference
//!   never permits element mutation.
//! - [`ArrayView`] / [`ArrayViewMut`]: non-owning views borrowing
//!   another entity's buffer; validity is bounded by the owner's
//!   lifetime.
//!
//! The indexing representation is chosen at compile time through the
//! [`Layout`] parameter: [`Flat`] stores no shape state (1-D, scalar
//! stride), [`Grid`] stores explicit extent and stride vectors with
//! row-major striding. Element semantics across memory spaces
//! (construction, fill, destruction, relocation, including staging
//! through host buffers for accelerator-resident pools) live in
//! [`lifecycle`].
//!
//! This crate is one of two in the workspace that may contain `unsafe`
//! code (along with `strata-mem`). Every `unsafe` block carries a
//! `// SAFETY:` comment.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod array;
pub mod layout;
pub mod lifecycle;
pub mod like;
pub mod view;

pub use array::{Array, Array1, Array2, Array3, MIN_DEFAULT_CAPACITY};
pub use layout::{Flat, Grid, Layout};
pub use like::{array_eq, ArrayLike};
pub use view::{ArrayView, ArrayViewMut};
