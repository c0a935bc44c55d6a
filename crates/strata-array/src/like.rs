//! Shared read surface over owning arrays and views.

use std::fmt;
use std::mem;

use strata_core::{AllocatorId, Extents};
use strata_mem::MemoryRegistry;

use crate::layout::Layout;

/// Anything that exposes a contiguous, layout-described element buffer.
///
/// Implementors promise that `data_ptr` addresses at least `size`
/// initialized elements owned by the allocator behind `allocator_id`
/// (or untracked host memory when the id is invalid), which is what
/// lets generic consumers stage the contents safely.
pub unsafe trait ArrayLike<T, L: Layout> {
    /// Base pointer of the element buffer.
    fn data_ptr(&self) -> *const T;

    /// Number of initialized elements.
    fn size(&self) -> usize;

    /// The allocator owning the buffer, [`AllocatorId::INVALID`] for
    /// unregistered host memory.
    fn allocator_id(&self) -> AllocatorId;

    /// The layout describing the buffer's shape.
    fn layout(&self) -> &L;

    /// Extent along each dimension.
    fn shape(&self) -> Extents {
        self.layout().shape(self.size())
    }
}

fn host_readable(id: AllocatorId) -> bool {
    !id.is_valid() || MemoryRegistry::global().host_accessible(id)
}

/// Run `f` over the elements as a host slice, staging bit-copies out
/// of non-host-accessible buffers first. Staged copies are released
/// without running destructors; ownership stays with the source.
pub(crate) fn with_host_elements<T, L, A, R>(src: &A, f: impl FnOnce(&[T]) -> R) -> R
where
    L: Layout,
    A: ArrayLike<T, L> + ?Sized,
{
    let n = src.size();
    if host_readable(src.allocator_id()) {
        // SAFETY: the ArrayLike contract guarantees n initialized,
        // host-dereferenceable elements at the base pointer.
        f(unsafe { std::slice::from_raw_parts(src.data_ptr(), n) })
    } else {
        let mut stage: Vec<T> = Vec::with_capacity(n);
        // SAFETY: n initialized elements inside the id allocation;
        // the stage is released below with len 0 so the bit-copies are
        // never dropped and ownership stays with the source buffer.
        unsafe {
            MemoryRegistry::global().copy_out(
                src.allocator_id(),
                src.data_ptr().cast::<u8>(),
                stage.as_mut_ptr().cast::<u8>(),
                n * mem::size_of::<T>(),
            );
        }
        // SAFETY: the copy above initialized n slots.
        let out = f(unsafe { std::slice::from_raw_parts(stage.as_ptr(), n) });
        out
    }
}

/// Structural equality between two buffers: same owning allocator,
/// same shape, equal elements in layout order.
pub fn array_eq<T, L, A, B>(a: &A, b: &B) -> bool
where
    T: PartialEq,
    L: Layout,
    A: ArrayLike<T, L> + ?Sized,
    B: ArrayLike<T, L> + ?Sized,
{
    if a.allocator_id() != b.allocator_id() || a.shape() != b.shape() {
        return false;
    }
    with_host_elements(a, |lhs| with_host_elements(b, |rhs| lhs == rhs))
}

/// Space-separated element dump used by the `Display` impls.
///
/// Aborts when the buffer is not host-accessible; callers must stage
/// the contents to host memory before printing.
pub(crate) fn format_array<T, L, A>(src: &A, f: &mut fmt::Formatter<'_>) -> fmt::Result
where
    T: fmt::Display,
    L: Layout,
    A: ArrayLike<T, L> + ?Sized,
{
    if !host_readable(src.allocator_id()) {
        strata_core::fatal!(
            "cannot print array in {} memory",
            MemoryRegistry::global().space_of_id(src.allocator_id())
        );
    }
    // SAFETY: host-readable buffer with size initialized elements.
    let elems = unsafe { std::slice::from_raw_parts(src.data_ptr(), src.size()) };
    write!(f, "[")?;
    for v in elems {
        write!(f, " {v}")?;
    }
    write!(f, " ]")
}
