//! The owning, dynamically-sized array container.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use strata_core::{fatal, AllocatorId, Extents, MemError, MemorySpace};
use strata_mem::MemoryRegistry;

use crate::layout::{Flat, Grid, Layout};
use crate::lifecycle;
use crate::like::{format_array, with_host_elements, ArrayLike};
use crate::view::{ArrayView, ArrayViewMut};

/// Capacity floor applied when an empty array first allocates.
pub const MIN_DEFAULT_CAPACITY: usize = 32;

/// An owning, resizable array of `T` in a chosen memory space, with a
/// compile-time-selected indexing representation `L`.
///
/// The buffer lives wherever the owning allocator puts it; element
/// lifecycle (construction, destruction, relocation) is routed through
/// [`crate::lifecycle`] so it works whether or not the controlling
/// thread can dereference the buffer. Accessors that hand out direct
/// references ([`as_slice`](Array::as_slice), indexing, iteration)
/// only work on host-accessible contents.
///
/// Capacity grows by the per-array `ratio` (default 2.0) and is always
/// a multiple of the layout's `block_size`, so multi-dimensional
/// arrays reallocate in whole rows. Capacity is never shrunk.
pub struct Array<T, L: Layout = Flat> {
    data: *mut T,
    size: usize,
    capacity: usize,
    ratio: f64,
    allocator: AllocatorId,
    layout: L,
    _marker: PhantomData<T>,
}

/// 1-D array.
pub type Array1<T> = Array<T, Flat>;
/// 2-D array (also fits the rows-of-components pattern).
pub type Array2<T> = Array<T, Grid<2>>;
/// 3-D array.
pub type Array3<T> = Array<T, Grid<3>>;

impl<T, L: Layout> Array<T, L> {
    /// Empty array in the registry's default space.
    pub fn new() -> Self {
        Self::new_in(MemorySpace::Dynamic)
    }

    /// Empty array in `space`. Does not allocate.
    pub fn new_in(space: MemorySpace) -> Self {
        Self {
            data: NonNull::dangling().as_ptr(),
            size: 0,
            capacity: 0,
            ratio: 2.0,
            allocator: MemoryRegistry::global().id_for_space(space),
            layout: L::default(),
            _marker: PhantomData,
        }
    }

    /// Empty array with room for `capacity` elements in the default
    /// space.
    pub fn with_capacity(capacity: usize) -> Result<Self, MemError> {
        Self::with_capacity_in(capacity, MemorySpace::Dynamic)
    }

    /// Empty array with room for `capacity` elements in `space`.
    pub fn with_capacity_in(capacity: usize, space: MemorySpace) -> Result<Self, MemError> {
        let mut arr = Self::new_in(space);
        if capacity > 0 {
            arr.set_capacity(arr.round_to_block(capacity))?;
        }
        Ok(arr)
    }

    /// Default-initialized array of the given extents in the default
    /// space.
    pub fn with_extents(extents: &[usize]) -> Result<Self, MemError>
    where
        T: Default,
    {
        Self::with_extents_in(extents, MemorySpace::Dynamic)
    }

    /// Default-initialized array of the given extents in `space`.
    ///
    /// Allocates at least [`MIN_DEFAULT_CAPACITY`] elements so small
    /// arrays have growth headroom.
    pub fn with_extents_in(extents: &[usize], space: MemorySpace) -> Result<Self, MemError>
    where
        T: Default,
    {
        let mut arr = Self::new_in(space);
        arr.layout = L::from_extents(extents);
        let count = strata_core::extents_product(extents);
        let declared = count.max(MIN_DEFAULT_CAPACITY);
        arr.set_capacity(arr.round_to_block(declared))?;
        // SAFETY: capacity covers count fresh slots owned here.
        unsafe { lifecycle::default_init(arr.data, 0, count, arr.allocator) };
        arr.size = count;
        Ok(arr)
    }

    /// Number of stored elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of elements the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The growth factor applied on reallocation.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Change the growth factor. Values at or below 1.0 make every
    /// growth an exact-fit reallocation.
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
    }

    /// The allocator owning the buffer.
    pub fn allocator_id(&self) -> AllocatorId {
        self.allocator
    }

    /// The memory space the buffer lives in.
    pub fn space(&self) -> MemorySpace {
        MemoryRegistry::global().space_of_id(self.allocator)
    }

    /// Extent along each axis.
    pub fn shape(&self) -> Extents {
        self.layout.shape(self.size)
    }

    /// Stride along each axis.
    pub fn strides(&self) -> Extents {
        self.layout.strides()
    }

    /// Base pointer of the buffer. May not be host-dereferenceable.
    pub fn data(&self) -> *const T {
        self.data
    }

    /// Mutable base pointer of the buffer.
    pub fn data_mut(&mut self) -> *mut T {
        self.data
    }

    /// Element at an N-coordinate. Arity violations are fatal; range
    /// violations are debug assertions.
    pub fn at(&self, coords: &[usize]) -> &T {
        let flat = self.layout.offset(coords);
        debug_assert!(flat < self.size, "coordinate {coords:?} out of range");
        debug_assert!(self.host_readable(), "direct access to device-resident element");
        // SAFETY: flat indexes an initialized, host-accessible slot.
        unsafe { &*self.data.add(flat) }
    }

    /// Mutable element at an N-coordinate.
    pub fn at_mut(&mut self, coords: &[usize]) -> &mut T {
        let flat = self.layout.offset(coords);
        debug_assert!(flat < self.size, "coordinate {coords:?} out of range");
        debug_assert!(self.host_readable(), "direct access to device-resident element");
        // SAFETY: flat indexes an initialized, host-accessible slot.
        unsafe { &mut *self.data.add(flat) }
    }

    /// The elements as a host slice.
    ///
    /// Aborts with a diagnostic when the contents are not
    /// host-accessible; stage them out instead.
    pub fn as_slice(&self) -> &[T] {
        if !self.host_readable() {
            fatal!("cannot view {} memory as a host slice", self.space());
        }
        // SAFETY: size initialized, host-accessible elements.
        unsafe { std::slice::from_raw_parts(self.data, self.size) }
    }

    /// The elements as a mutable host slice. Same accessibility rule
    /// as [`as_slice`](Array::as_slice).
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if !self.host_readable() {
            fatal!("cannot view {} memory as a host slice", self.space());
        }
        // SAFETY: size initialized, host-accessible elements.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.size) }
    }

    /// Iterate over host-accessible elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Read-only view borrowing this array's buffer and shape.
    pub fn view(&self) -> ArrayView<'_, T, L> {
        ArrayView::of(self)
    }

    /// Mutable view borrowing this array's buffer and shape.
    pub fn view_mut(&mut self) -> ArrayViewMut<'_, T, L> {
        ArrayViewMut::of(self)
    }

    /// Ensure capacity for at least `capacity` elements. Never
    /// shrinks.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), MemError> {
        if capacity > self.capacity {
            self.set_capacity(self.round_to_block(capacity))?;
        }
        Ok(())
    }

    /// Resize to new extents.
    ///
    /// Shrinking destroys the excess elements and keeps the capacity;
    /// growing default-initializes the new tail, reallocating first if
    /// needed.
    pub fn resize(&mut self, extents: &[usize]) -> Result<(), MemError>
    where
        T: Default,
    {
        let new_size = strata_core::extents_product(extents);
        if new_size < self.size {
            // SAFETY: the excess elements are live and relinquished.
            unsafe { lifecycle::destroy(self.data, new_size, self.size, self.allocator) };
        } else if new_size > self.size {
            self.grow_for(new_size)?;
            // SAFETY: capacity now covers the fresh tail slots.
            unsafe { lifecycle::default_init(self.data, self.size, new_size, self.allocator) };
        }
        // Shape changes last so a failed grow leaves the metadata in
        // step with the untouched buffer.
        self.layout.assign(extents);
        self.size = new_size;
        Ok(())
    }

    /// Overwrite every element with a clone of `value`.
    pub fn fill(&mut self, value: &T)
    where
        T: Clone,
    {
        // SAFETY: [0, size) holds live elements replaced wholesale.
        unsafe {
            lifecycle::destroy(self.data, 0, self.size, self.allocator);
            lifecycle::fill(self.data, 0, self.size, self.allocator, value);
        }
    }

    /// Insert the contents of `source` starting at flat position
    /// `pos`, growing the leading extent.
    ///
    /// `pos` must be row-aligned (a multiple of the layout's
    /// `block_size`) and at most the current size, and `source` must
    /// match on every trailing extent; violations are fatal.
    pub fn insert<A>(&mut self, pos: usize, source: &A) -> Result<(), MemError>
    where
        T: Clone,
        A: ArrayLike<T, L> + ?Sized,
    {
        let block = self.layout.block_size().max(1);
        if pos % block != 0 || pos > self.size {
            fatal!("insert position {pos} is not row-aligned within {} elements", self.size);
        }
        let src_shape = source.shape();
        if !self.layout.trailing_matches(self.size, &src_shape) {
            fatal!(
                "insert source shape {:?} incompatible with {:?}",
                src_shape.as_slice(),
                self.shape().as_slice()
            );
        }
        let n = source.size();
        if n == 0 {
            return Ok(());
        }
        self.grow_for(self.size + n)?;
        let (data, id) = (self.data, self.allocator);
        // SAFETY: capacity covers size + n; the tail shift targets
        // fresh slots and the gap is then clone-filled.
        unsafe {
            lifecycle::relocate(data, pos, self.size, pos + n, id);
            with_host_elements(source, |elems| {
                lifecycle::clone_from_slice(data, pos, id, elems)
            });
        }
        self.size += n;
        self.layout.grow_leading(n / block);
        Ok(())
    }

    /// Append the contents of `source` after the last element.
    pub fn append<A>(&mut self, source: &A) -> Result<(), MemError>
    where
        T: Clone,
        A: ArrayLike<T, L> + ?Sized,
    {
        self.insert(self.size, source)
    }

    /// Drop every element past `new_size`, which must be row-aligned.
    /// Capacity is retained.
    pub fn truncate(&mut self, new_size: usize) {
        let block = self.layout.block_size().max(1);
        if new_size % block != 0 {
            fatal!("truncation size {new_size} is not a whole number of rows");
        }
        if new_size >= self.size {
            return;
        }
        // SAFETY: the tail elements are live and relinquished.
        unsafe { lifecycle::destroy(self.data, new_size, self.size, self.allocator) };
        self.size = new_size;
        self.layout.set_leading(new_size / block);
    }

    /// Drop every element. Capacity is retained.
    pub fn clear(&mut self) {
        // SAFETY: [0, size) holds live elements relinquished here.
        unsafe { lifecycle::destroy(self.data, 0, self.size, self.allocator) };
        self.size = 0;
        self.layout.set_leading(0);
    }

    /// Exchange contents, capacity, and allocator with `other`.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    fn host_readable(&self) -> bool {
        MemoryRegistry::global().host_accessible(self.allocator)
    }

    fn round_to_block(&self, elems: usize) -> usize {
        let block = self.layout.block_size().max(1);
        elems.div_ceil(block) * block
    }

    /// Grow capacity for `required` elements by the ratio policy.
    fn grow_for(&mut self, required: usize) -> Result<(), MemError> {
        if required <= self.capacity {
            return Ok(());
        }
        let scaled = (self.capacity as f64 * self.ratio + 0.5) as usize;
        let mut target = required.max(scaled);
        if self.capacity == 0 {
            target = target.max(MIN_DEFAULT_CAPACITY);
        }
        self.set_capacity(self.round_to_block(target))
    }

    /// Reallocate the buffer to exactly `new_capacity` elements,
    /// preserving the byte prefix. The old buffer stays intact when
    /// the allocation fails.
    fn set_capacity(&mut self, new_capacity: usize) -> Result<(), MemError> {
        if new_capacity == self.capacity {
            return Ok(());
        }
        if mem::size_of::<T>() == 0 {
            self.capacity = new_capacity;
            return Ok(());
        }
        let reg = MemoryRegistry::global();
        let bytes = new_capacity * mem::size_of::<T>();
        if self.capacity == 0 {
            let ptr = reg.allocate(bytes, mem::align_of::<T>(), self.space())?;
            self.data = ptr.as_ptr().cast::<T>();
        } else {
            // SAFETY: data is the live tracked allocation for this
            // array; new_capacity covers the current size.
            let moved = unsafe {
                reg.reallocate(NonNull::new_unchecked(self.data.cast::<u8>()), bytes)?
            };
            match moved {
                Some(ptr) => self.data = ptr.as_ptr().cast::<T>(),
                None => self.data = NonNull::dangling().as_ptr(),
            }
        }
        self.capacity = new_capacity;
        Ok(())
    }
}

impl<T> Array<T, Flat> {
    /// 1-D array cloned from a host slice, in the default space.
    pub fn from_slice(values: &[T]) -> Result<Self, MemError>
    where
        T: Clone,
    {
        Self::from_slice_in(values, MemorySpace::Dynamic)
    }

    /// 1-D array cloned from a host slice, in `space`.
    pub fn from_slice_in(values: &[T], space: MemorySpace) -> Result<Self, MemError>
    where
        T: Clone,
    {
        let mut arr = Self::with_capacity_in(values.len(), space)?;
        // SAFETY: capacity covers values.len() fresh slots.
        unsafe { lifecycle::clone_from_slice(arr.data, 0, arr.allocator, values) };
        arr.size = values.len();
        Ok(arr)
    }

    /// Append one element, growing by the ratio policy when full.
    pub fn push(&mut self, value: T) -> Result<(), MemError> {
        self.grow_for(self.size + 1)?;
        // SAFETY: capacity covers the slot past the last element.
        unsafe { lifecycle::emplace(self.data, self.size, self.allocator, value) };
        self.size += 1;
        Ok(())
    }

    /// Insert one element at flat position `pos`, shifting the tail.
    pub fn insert_value(&mut self, pos: usize, value: T) -> Result<(), MemError> {
        if pos > self.size {
            fatal!("insert position {pos} past {} elements", self.size);
        }
        self.grow_for(self.size + 1)?;
        // SAFETY: capacity covers size + 1; the shifted tail lands in
        // fresh slots and the gap is overwritten.
        unsafe {
            lifecycle::relocate(self.data, pos, self.size, pos + 1, self.allocator);
            lifecycle::emplace(self.data, pos, self.allocator, value);
        }
        self.size += 1;
        Ok(())
    }

    /// Insert a host slice at flat position `pos`, shifting the tail.
    pub fn insert_slice(&mut self, pos: usize, values: &[T]) -> Result<(), MemError>
    where
        T: Clone,
    {
        if pos > self.size {
            fatal!("insert position {pos} past {} elements", self.size);
        }
        if values.is_empty() {
            return Ok(());
        }
        self.grow_for(self.size + values.len())?;
        // SAFETY: capacity covers the widened range; the gap left by
        // the shift is clone-filled.
        unsafe {
            lifecycle::relocate(self.data, pos, self.size, pos + values.len(), self.allocator);
            lifecycle::clone_from_slice(self.data, pos, self.allocator, values);
        }
        self.size += values.len();
        Ok(())
    }
}

impl<T, L: Layout> Drop for Array<T, L> {
    fn drop(&mut self) {
        // SAFETY: [0, size) holds live elements owned by this array.
        unsafe { lifecycle::destroy(self.data, 0, self.size, self.allocator) };
        if self.capacity > 0 && mem::size_of::<T>() > 0 {
            // SAFETY: data is the live tracked allocation; nothing
            // touches it after this.
            unsafe {
                if let Some(ptr) = NonNull::new(self.data.cast::<u8>()) {
                    MemoryRegistry::global().deallocate(ptr);
                }
            }
        }
    }
}

impl<T, L: Layout> Default for Array<T, L> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the buffer is uniquely owned and element access follows the
// usual &/&mut rules, so thread transfer is safe whenever T's is.
unsafe impl<T: Send, L: Layout> Send for Array<T, L> {}
// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync, L: Layout> Sync for Array<T, L> {}

// SAFETY: data/size/allocator describe exactly the initialized,
// owner-tracked element range.
unsafe impl<T, L: Layout> ArrayLike<T, L> for Array<T, L> {
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

impl<T, L: Layout> Index<usize> for Array<T, L> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        debug_assert!(index < self.size, "index {index} out of range");
        debug_assert!(self.host_readable(), "direct access to device-resident element");
        // SAFETY: index addresses an initialized, host-accessible slot.
        unsafe { &*self.data.add(index) }
    }
}

impl<T, L: Layout> IndexMut<usize> for Array<T, L> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.size, "index {index} out of range");
        debug_assert!(self.host_readable(), "direct access to device-resident element");
        // SAFETY: index addresses an initialized, host-accessible slot.
        unsafe { &mut *self.data.add(index) }
    }
}

impl<T: PartialEq, L: Layout> PartialEq for Array<T, L> {
    fn eq(&self, other: &Self) -> bool {
        crate::like::array_eq(self, other)
    }
}

impl<T: fmt::Display, L: Layout> fmt::Display for Array<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_array(self, f)
    }
}

impl<T: fmt::Debug, L: Layout> fmt::Debug for Array<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("shape", &self.shape())
            .field("capacity", &self.capacity)
            .field("allocator", &self.allocator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_grows_by_ratio_from_declared_capacity() {
        let mut a = Array1::<i32>::with_capacity(4).unwrap();
        for v in 0..4 {
            a.push(v).unwrap();
        }
        assert_eq!(a.capacity(), 4);
        a.push(4).unwrap();
        assert_eq!(a.capacity(), 8);
        assert_eq!(a.as_slice(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn first_allocation_applies_the_capacity_floor() {
        let mut a = Array1::<u8>::new();
        a.push(1).unwrap();
        assert_eq!(a.capacity(), MIN_DEFAULT_CAPACITY);
    }

    #[test]
    fn with_extents_default_initializes() {
        let a = Array2::<i64>::with_extents(&[2, 3]).unwrap();
        assert_eq!(a.shape().as_slice(), &[2, 3]);
        assert_eq!(a.size(), 6);
        assert!(a.iter().all(|&v| v == 0));
    }

    #[test]
    fn at_uses_row_major_offsets() {
        let mut a = Array2::<i32>::with_extents(&[2, 3]).unwrap();
        *a.at_mut(&[1, 2]) = 42;
        assert_eq!(a[5], 42);
        assert_eq!(*a.at(&[1, 2]), 42);
    }

    #[test]
    fn resize_preserves_prefix_and_capacity_on_shrink() {
        let mut a = Array1::<i32>::from_slice(&[1, 2, 3, 4, 5]).unwrap();
        let cap = a.capacity();
        a.resize(&[2]).unwrap();
        assert_eq!(a.as_slice(), &[1, 2]);
        assert_eq!(a.capacity(), cap);
        a.resize(&[4]).unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 0, 0]);
    }

    #[test]
    fn failed_resize_leaves_shape_and_contents_untouched() {
        let mut a = Array2::<u64>::with_extents(&[2, 2]).unwrap();
        a.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        // Far beyond any addressable host allocation.
        assert!(a.resize(&[1usize << 44, 2]).is_err());
        assert_eq!(a.shape().as_slice(), &[2, 2]);
        assert_eq!(a.size(), 4);
        assert_eq!(a.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn insert_slice_shifts_the_tail() {
        let mut a = Array1::<i32>::from_slice(&[1, 5, 6]).unwrap();
        a.insert_slice(1, &[2, 3, 4]).unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn grid_insert_appends_whole_rows() {
        let mut a = Array2::<i32>::with_extents(&[1, 3]).unwrap();
        a.as_mut_slice().copy_from_slice(&[1, 2, 3]);
        let b = Array2::<i32>::from_rows_for_tests(&[4, 5, 6], 3);
        a.append(&b).unwrap();
        assert_eq!(a.shape().as_slice(), &[2, 3]);
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn truncate_and_clear_keep_capacity() {
        let mut a = Array1::<String>::new();
        for s in ["a", "b", "c"] {
            a.push(s.to_string()).unwrap();
        }
        let cap = a.capacity();
        a.truncate(1);
        assert_eq!(a.as_slice(), &["a"]);
        a.clear();
        assert!(a.is_empty());
        assert_eq!(a.capacity(), cap);
    }

    #[test]
    fn equality_requires_matching_allocator() {
        let host = Array1::<i32>::from_slice(&[1, 2, 3]).unwrap();
        let host2 = Array1::<i32>::from_slice(&[1, 2, 3]).unwrap();
        let dev = Array1::<i32>::from_slice_in(&[1, 2, 3], MemorySpace::Device).unwrap();
        assert_eq!(host, host2);
        assert_ne!(host.allocator_id(), dev.allocator_id());
        assert!(!crate::array_eq(&host, &dev));
    }

    #[test]
    fn display_prints_space_separated_elements() {
        let a = Array1::<i32>::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(a.to_string(), "[ 1 2 3 ]");
    }

    #[test]
    fn device_array_round_trips_through_fill() {
        let mut a = Array1::<u32>::with_extents_in(&[16], MemorySpace::Device).unwrap();
        a.fill(&9);
        let host = Array1::<u32>::from_slice(&[9; 16]).unwrap();
        // Different allocators, so compare element-by-element through
        // a staged read.
        crate::like::with_host_elements(&a, |elems| {
            assert_eq!(elems, host.as_slice());
        });
    }

    #[test]
    fn swap_exchanges_whole_arrays() {
        let mut a = Array1::<i32>::from_slice(&[1]).unwrap();
        let mut b = Array1::<i32>::from_slice(&[2, 3]).unwrap();
        a.swap(&mut b);
        assert_eq!(a.as_slice(), &[2, 3]);
        assert_eq!(b.as_slice(), &[1]);
    }

    impl Array2<i32> {
        /// Test helper: a rows x width grid cloned from a flat slice.
        fn from_rows_for_tests(values: &[i32], width: usize) -> Self {
            let mut a = Array2::<i32>::with_extents(&[values.len() / width, width]).unwrap();
            a.as_mut_slice().copy_from_slice(values);
            a
        }
    }
}
