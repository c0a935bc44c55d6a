//! Non-owning views over array buffers.
//!
//! The owner is deep-const, so the usual shallow-const trick of
//! copying a container to get a mutable alias has no direct analogue
//! here; instead views come in the familiar borrow pair: [`ArrayView`]
//! is read-only and `Copy`, [`ArrayViewMut`] is unique and mutating.
//! Both carry the shape metadata by value and the buffer by pointer,
//! lifetime-bound to whatever they were built from.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use strata_core::{fatal, AllocatorId, Extents, MemorySpace};
use strata_mem::MemoryRegistry;

use crate::layout::{Flat, Layout};
use crate::like::{array_eq, format_array, ArrayLike};

/// Read-only, non-owning window over an array buffer.
pub struct ArrayView<'a, T, L: Layout = Flat> {
    data: *const T,
    size: usize,
    allocator: AllocatorId,
    layout: L,
    _marker: PhantomData<&'a T>,
}

/// Mutating, non-owning window over an array buffer.
pub struct ArrayViewMut<'a, T, L: Layout = Flat> {
    data: *mut T,
    size: usize,
    allocator: AllocatorId,
    layout: L,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T, L: Layout> ArrayView<'a, T, L> {
    /// View over any array-like source, copying its shape metadata
    /// and allocator id.
    pub fn of<A: ArrayLike<T, L> + ?Sized>(source: &'a A) -> Self {
        Self {
            data: source.data_ptr(),
            size: source.size(),
            allocator: source.allocator_id(),
            layout: *source.layout(),
            _marker: PhantomData,
        }
    }

    /// View over raw memory of the given extents.
    ///
    /// The owning allocator is recovered by reverse lookup on the
    /// pointer; unregistered memory is tagged
    /// [`AllocatorId::INVALID`] and treated as plain host memory.
    ///
    /// # Safety
    ///
    /// `data` must address at least `product(extents)` initialized
    /// elements that outlive `'a` and are not mutated through other
    /// paths while the view is alive.
    pub unsafe fn from_raw(data: *const T, extents: &[usize]) -> Self {
        let layout = L::from_extents(extents);
        let size = layout.element_count(strata_core::extents_product(extents));
        let allocator = MemoryRegistry::global()
            .id_of(data.cast::<u8>())
            .unwrap_or(AllocatorId::INVALID);
        Self {
            data,
            size,
            allocator,
            layout,
            _marker: PhantomData,
        }
    }

    /// Like [`from_raw`](ArrayView::from_raw) with a declared memory
    /// space. A concrete declared space must agree with the tracked
    /// allocation; the check is a debug assertion.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](ArrayView::from_raw).
    pub unsafe fn from_raw_in(data: *const T, extents: &[usize], space: MemorySpace) -> Self {
        // SAFETY: forwarded caller contract.
        let view = unsafe { Self::from_raw(data, extents) };
        if space != MemorySpace::Dynamic {
            debug_assert!(
                MemoryRegistry::global()
                    .space_of(data.cast::<u8>())
                    .map_or(true, |actual| actual == space),
                "declared space {space} disagrees with the tracked allocation"
            );
        }
        view
    }

    /// Number of viewed elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The allocator owning the viewed buffer.
    pub fn allocator_id(&self) -> AllocatorId {
        self.allocator
    }

    /// Extent along each axis.
    pub fn shape(&self) -> Extents {
        self.layout.shape(self.size)
    }

    /// Stride along each axis.
    pub fn strides(&self) -> Extents {
        self.layout.strides()
    }

    /// Base pointer of the viewed buffer.
    pub fn data(&self) -> *const T {
        self.data
    }

    /// Element at an N-coordinate, with the owner's access rules.
    pub fn at(&self, coords: &[usize]) -> &T {
        let flat = self.layout.offset(coords);
        debug_assert!(flat < self.size, "coordinate {coords:?} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: flat indexes an initialized, host-accessible slot.
        unsafe { &*self.data.add(flat) }
    }

    /// The viewed elements as a host slice. Aborts on
    /// non-host-accessible contents.
    pub fn as_slice(&self) -> &[T] {
        require_host(self.allocator);
        // SAFETY: size initialized, host-accessible elements.
        unsafe { std::slice::from_raw_parts(self.data, self.size) }
    }

    /// Iterate over host-accessible elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<'a, T, L: Layout> ArrayViewMut<'a, T, L> {
    /// Mutable view over any array-like source.
    ///
    /// Takes the source by mutable borrow so the usual aliasing rules
    /// carry over to the view.
    pub fn of<A: ArrayLike<T, L> + ?Sized>(source: &'a mut A) -> Self {
        Self {
            data: source.data_ptr() as *mut T,
            size: source.size(),
            allocator: source.allocator_id(),
            layout: *source.layout(),
            _marker: PhantomData,
        }
    }

    /// Mutable view over raw memory of the given extents, with the
    /// same reverse-lookup tagging as [`ArrayView::from_raw`].
    ///
    /// # Safety
    ///
    /// `data` must address at least `product(extents)` initialized
    /// elements that outlive `'a`, accessed exclusively through this
    /// view while it is alive.
    pub unsafe fn from_raw(data: *mut T, extents: &[usize]) -> Self {
        let layout = L::from_extents(extents);
        let size = layout.element_count(strata_core::extents_product(extents));
        let allocator = MemoryRegistry::global()
            .id_of(data.cast::<u8>())
            .unwrap_or(AllocatorId::INVALID);
        Self {
            data,
            size,
            allocator,
            layout,
            _marker: PhantomData,
        }
    }

    /// Like [`from_raw`](ArrayViewMut::from_raw) with a declared
    /// memory space; a concrete declared space must agree with the
    /// tracked allocation (debug assertion).
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](ArrayViewMut::from_raw).
    pub unsafe fn from_raw_in(data: *mut T, extents: &[usize], space: MemorySpace) -> Self {
        // SAFETY: forwarded caller contract.
        let view = unsafe { Self::from_raw(data, extents) };
        if space != MemorySpace::Dynamic {
            debug_assert!(
                MemoryRegistry::global()
                    .space_of(data.cast_const().cast::<u8>())
                    .map_or(true, |actual| actual == space),
                "declared space {space} disagrees with the tracked allocation"
            );
        }
        view
    }

    /// Number of viewed elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The allocator owning the viewed buffer.
    pub fn allocator_id(&self) -> AllocatorId {
        self.allocator
    }

    /// Extent along each axis.
    pub fn shape(&self) -> Extents {
        self.layout.shape(self.size)
    }

    /// Stride along each axis.
    pub fn strides(&self) -> Extents {
        self.layout.strides()
    }

    /// Mutable base pointer of the viewed buffer.
    pub fn data_mut(&mut self) -> *mut T {
        self.data
    }

    /// Read-only downgrade of this view.
    pub fn as_view(&self) -> ArrayView<'_, T, L> {
        ArrayView::of(self)
    }

    /// Element at an N-coordinate.
    pub fn at(&self, coords: &[usize]) -> &T {
        let flat = self.layout.offset(coords);
        debug_assert!(flat < self.size, "coordinate {coords:?} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: flat indexes an initialized, host-accessible slot.
        unsafe { &*self.data.add(flat) }
    }

    /// Mutable element at an N-coordinate.
    pub fn at_mut(&mut self, coords: &[usize]) -> &mut T {
        let flat = self.layout.offset(coords);
        debug_assert!(flat < self.size, "coordinate {coords:?} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: flat indexes an initialized, host-accessible slot.
        unsafe { &mut *self.data.add(flat) }
    }

    /// The viewed elements as a host slice. Aborts on
    /// non-host-accessible contents.
    pub fn as_slice(&self) -> &[T] {
        require_host(self.allocator);
        // SAFETY: size initialized, host-accessible elements.
        unsafe { std::slice::from_raw_parts(self.data, self.size) }
    }

    /// The viewed elements as a mutable host slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        require_host(self.allocator);
        // SAFETY: size initialized, host-accessible elements, unique
        // through this view.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.size) }
    }

    /// Overwrite every viewed element with a clone of `value`.
    pub fn fill(&mut self, value: &T)
    where
        T: Clone,
    {
        // SAFETY: [0, size) holds live elements replaced wholesale.
        unsafe {
            crate::lifecycle::destroy(self.data, 0, self.size, self.allocator);
            crate::lifecycle::fill(self.data, 0, self.size, self.allocator, value);
        }
    }
}

fn host_readable(id: AllocatorId) -> bool {
    !id.is_valid() || MemoryRegistry::global().host_accessible(id)
}

fn require_host(id: AllocatorId) {
    if !host_readable(id) {
        fatal!(
            "cannot view {} memory as a host slice",
            MemoryRegistry::global().space_of_id(id)
        );
    }
}

impl<T, L: Layout> Clone for ArrayView<'_, T, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, L: Layout> Copy for ArrayView<'_, T, L> {}

// SAFETY: read-only window; transferable/shareable whenever &T is.
unsafe impl<T: Sync, L: Layout> Send for ArrayView<'_, T, L> {}
// SAFETY: as above.
unsafe impl<T: Sync, L: Layout> Sync for ArrayView<'_, T, L> {}
// SAFETY: unique window; transferable whenever &mut T is.
unsafe impl<T: Send, L: Layout> Send for ArrayViewMut<'_, T, L> {}
// SAFETY: shared access to the mut view only hands out &T.
unsafe impl<T: Sync, L: Layout> Sync for ArrayViewMut<'_, T, L> {}

// SAFETY: fields are copied verbatim from a source upholding the same
// contract, or validated in from_raw.
unsafe impl<T, L: Layout> ArrayLike<T, L> for ArrayView<'_, T, L> {
    fn data_ptr(&self) -> *const T {
        self.data
    }

    fn size(&self) -> usize {
        self.size
    }

    fn allocator_id(&self) -> AllocatorId {
        self.allocator
    }

    fn layout(&self) -> &L {
        &self.layout
    }
}

// SAFETY: as for ArrayView.
unsafe impl<T, L: Layout> ArrayLike<T, L> for ArrayViewMut<'_, T, L> {
    fn data_ptr(&self) -> *const T {
        self.data
    }

    fn size(&self) -> usize {
        self.size
    }

    fn allocator_id(&self) -> AllocatorId {
        self.allocator
    }

    fn layout(&self) -> &L {
        &self.layout
    }
}

impl<T, L: Layout> Index<usize> for ArrayView<'_, T, L> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        debug_assert!(index < self.size, "index {index} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: index addresses an initialized, host-accessible slot.
        unsafe { &*self.data.add(index) }
    }
}

impl<T, L: Layout> Index<usize> for ArrayViewMut<'_, T, L> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        debug_assert!(index < self.size, "index {index} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: index addresses an initialized, host-accessible slot.
        unsafe { &*self.data.add(index) }
    }
}

impl<T, L: Layout> IndexMut<usize> for ArrayViewMut<'_, T, L> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.size, "index {index} out of range");
        debug_assert!(host_readable(self.allocator), "direct access to device-resident element");
        // SAFETY: index addresses an initialized, host-accessible slot.
        unsafe { &mut *self.data.add(index) }
    }
}

impl<T: PartialEq, L: Layout> PartialEq for ArrayView<'_, T, L> {
    fn eq(&self, other: &Self) -> bool {
        array_eq(self, other)
    }
}

impl<T: PartialEq, L: Layout> PartialEq for ArrayViewMut<'_, T, L> {
    fn eq(&self, other: &Self) -> bool {
        array_eq(self, other)
    }
}

impl<T: fmt::Display, L: Layout> fmt::Display for ArrayView<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_array(self, f)
    }
}

impl<T: fmt::Display, L: Layout> fmt::Display for ArrayViewMut<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_array(self, f)
    }
}

// Like the owning container, debug output sticks to metadata; the
// elements may live in memory the host cannot read.
impl<T, L: Layout> fmt::Debug for ArrayView<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("shape", &self.shape())
            .field("allocator", &self.allocator)
            .finish()
    }
}

impl<T, L: Layout> fmt::Debug for ArrayViewMut<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayViewMut")
            .field("shape", &self.shape())
            .field("allocator", &self.allocator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array1, Array2};

    #[test]
    fn view_shares_shape_and_allocator() {
        let a = Array2::<i32>::with_extents(&[2, 3]).unwrap();
        let v = a.view();
        assert_eq!(v.shape(), a.shape());
        assert_eq!(v.allocator_id(), a.allocator_id());
        assert_eq!(v.size(), 6);
    }

    #[test]
    fn view_mut_writes_through_to_the_owner() {
        let mut a = Array1::<i32>::from_slice(&[1, 2, 3]).unwrap();
        {
            let mut v = a.view_mut();
            v[1] = 20;
            *v.at_mut(&[2]) = 30;
        }
        assert_eq!(a.as_slice(), &[1, 20, 30]);
    }

    #[test]
    fn raw_views_over_plain_host_memory_are_untracked() {
        let backing = [7i32, 8, 9];
        // SAFETY: backing outlives the view and is not mutated.
        let v = unsafe { ArrayView::<i32, Flat>::from_raw(backing.as_ptr(), &[3]) };
        assert_eq!(v.allocator_id(), AllocatorId::INVALID);
        assert_eq!(v.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn raw_views_over_registry_memory_recover_the_allocator() {
        let a = Array1::<i32>::from_slice(&[1, 2]).unwrap();
        // SAFETY: a outlives the view and is not mutated.
        let v = unsafe { ArrayView::<i32, Flat>::from_raw(a.data(), &[2]) };
        assert_eq!(v.allocator_id(), a.allocator_id());
    }

    #[test]
    fn views_of_the_same_owner_compare_equal() {
        let a = Array1::<i32>::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(a.view(), a.view());
    }

    #[test]
    fn view_fill_mutates_device_contents() {
        use strata_core::MemorySpace;
        let mut a = Array1::<u32>::with_extents_in(&[8], MemorySpace::Device).unwrap();
        a.view_mut().fill(&5);
        crate::like::with_host_elements(&a, |elems| {
            assert!(elems.iter().all(|&v| v == 5));
        });
    }
}
