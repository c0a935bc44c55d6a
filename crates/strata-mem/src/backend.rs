//! Allocator backends, one per memory space.
//!
//! A backend hands out raw byte allocations for a single memory-space
//! instance and provides the synchronous bulk-copy primitives that are
//! the only sanctioned way to move data in and out of pools the
//! controlling thread cannot dereference.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use strata_core::MemorySpace;

/// Allocation backend bound to one memory-space instance.
///
/// Implementations never panic on exhaustion: a failed allocation is
/// reported as `None` and the caller decides what to do. All copies
/// are synchronous and complete before the call returns.
pub trait AllocatorBackend: Send + Sync {
    /// The space this backend allocates from.
    fn space(&self) -> MemorySpace;

    /// Whether pointers from this backend may be dereferenced directly
    /// by the controlling thread.
    fn host_accessible(&self) -> bool;

    /// Allocate `bytes` with the given alignment.
    ///
    /// Returns `None` on exhaustion or for zero-byte requests.
    fn allocate(&self, bytes: usize, align: usize) -> Option<NonNull<u8>>;

    /// Return an allocation to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this backend
    /// with the same `bytes` and `align`, and must not be used again.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize);

    /// Copy `bytes` from host memory at `src` into this backend's pool
    /// at `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must point into a live allocation from this backend with
    /// at least `bytes` writable; `src` must be readable host memory
    /// of at least `bytes`. The ranges must not overlap.
    unsafe fn copy_in(&self, dst: *mut u8, src: *const u8, bytes: usize);

    /// Copy `bytes` out of this backend's pool at `src` into host
    /// memory at `dst`.
    ///
    /// # Safety
    ///
    /// Mirror of [`AllocatorBackend::copy_in`]: `src` must point into
    /// a live allocation from this backend, `dst` must be writable
    /// host memory, and the ranges must not overlap.
    unsafe fn copy_out(&self, src: *const u8, dst: *mut u8, bytes: usize);
}

fn checked_layout(bytes: usize, align: usize) -> Option<Layout> {
    if bytes == 0 {
        return None;
    }
    Layout::from_size_align(bytes, align).ok()
}

/// Host-accessible pool backed by the global allocator.
///
/// Also used for the pinned and unified spaces: they differ in tag and
/// allocator identity, not in how this in-process build reaches them.
pub struct HostPool {
    space: MemorySpace,
}

impl HostPool {
    /// Create a pool for a host-accessible space.
    pub fn new(space: MemorySpace) -> Self {
        debug_assert_eq!(space.host_accessible(), Some(true));
        Self { space }
    }
}

impl AllocatorBackend for HostPool {
    fn space(&self) -> MemorySpace {
        self.space
    }

    fn host_accessible(&self) -> bool {
        true
    }

    fn allocate(&self, bytes: usize, align: usize) -> Option<NonNull<u8>> {
        let layout = checked_layout(bytes, align)?;
        // SAFETY: layout has non-zero size (checked_layout rejects 0).
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize) {
        let layout = Layout::from_size_align(bytes, align)
            .unwrap_or_else(|_| unreachable!("layout was valid at allocation time"));
        // SAFETY: caller guarantees ptr came from allocate with this layout.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn copy_in(&self, dst: *mut u8, src: *const u8, bytes: usize) {
        // SAFETY: caller guarantees validity and non-overlap of both ranges.
        unsafe { std::ptr::copy_nonoverlapping(src, dst, bytes) };
    }

    unsafe fn copy_out(&self, src: *const u8, dst: *mut u8, bytes: usize) {
        // SAFETY: caller guarantees validity and non-overlap of both ranges.
        unsafe { std::ptr::copy_nonoverlapping(src, dst, bytes) };
    }
}

/// In-process stand-in for an accelerator-resident pool.
///
/// Allocations come from the host heap but are treated as reachable
/// only through [`AllocatorBackend::copy_in`] and
/// [`AllocatorBackend::copy_out`]. Fresh allocations are filled with a
/// poison byte so that code which wrongly dereferences them directly
/// reads recognisable garbage rather than zeros.
pub struct DevicePool {
    space: MemorySpace,
}

impl DevicePool {
    /// Poison byte written over fresh device allocations.
    const POISON: u8 = 0xAB;

    /// Create a pool for a non-host-accessible space.
    pub fn new(space: MemorySpace) -> Self {
        debug_assert_eq!(space.host_accessible(), Some(false));
        Self { space }
    }
}

impl AllocatorBackend for DevicePool {
    fn space(&self) -> MemorySpace {
        self.space
    }

    fn host_accessible(&self) -> bool {
        false
    }

    fn allocate(&self, bytes: usize, align: usize) -> Option<NonNull<u8>> {
        let layout = checked_layout(bytes, align)?;
        // SAFETY: layout has non-zero size (checked_layout rejects 0).
        let ptr = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(ptr)?;
        // SAFETY: the allocation is live and `bytes` long.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), Self::POISON, bytes) };
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize) {
        let layout = Layout::from_size_align(bytes, align)
            .unwrap_or_else(|_| unreachable!("layout was valid at allocation time"));
        // SAFETY: caller guarantees ptr came from allocate with this layout.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn copy_in(&self, dst: *mut u8, src: *const u8, bytes: usize) {
        // SAFETY: caller guarantees validity and non-overlap of both ranges.
        unsafe { std::ptr::copy_nonoverlapping(src, dst, bytes) };
    }

    unsafe fn copy_out(&self, src: *const u8, dst: *mut u8, bytes: usize) {
        // SAFETY: caller guarantees validity and non-overlap of both ranges.
        unsafe { std::ptr::copy_nonoverlapping(src, dst, bytes) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_pool_allocates_and_frees() {
        let pool = HostPool::new(MemorySpace::Host);
        let ptr = pool.allocate(64, 8).unwrap();
        // SAFETY: 64 writable bytes, 8-aligned.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0x5A, 64);
            pool.deallocate(ptr, 64, 8);
        }
    }

    #[test]
    fn zero_byte_allocation_is_refused() {
        let pool = HostPool::new(MemorySpace::Host);
        assert!(pool.allocate(0, 8).is_none());
    }

    #[test]
    fn device_pool_round_trips_through_copies() {
        let pool = DevicePool::new(MemorySpace::Device);
        let ptr = pool.allocate(16, 1).unwrap();
        let src = [7u8; 16];
        let mut dst = [0u8; 16];
        // SAFETY: src/dst are 16-byte host buffers, ptr is a live
        // 16-byte device allocation; no ranges overlap.
        unsafe {
            pool.copy_in(ptr.as_ptr(), src.as_ptr(), 16);
            pool.copy_out(ptr.as_ptr(), dst.as_mut_ptr(), 16);
            pool.deallocate(ptr, 16, 1);
        }
        assert_eq!(dst, src);
    }

    #[test]
    fn device_allocations_are_poisoned() {
        let pool = DevicePool::new(MemorySpace::Device);
        let ptr = pool.allocate(8, 1).unwrap();
        let mut out = [0u8; 8];
        // SAFETY: live 8-byte allocation copied to an 8-byte host buffer.
        unsafe {
            pool.copy_out(ptr.as_ptr(), out.as_mut_ptr(), 8);
            pool.deallocate(ptr, 8, 1);
        }
        assert!(out.iter().all(|&b| b == DevicePool::POISON));
    }
}
