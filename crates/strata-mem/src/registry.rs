//! The memory-space registry.
//!
//! Maps [`MemorySpace`] tags to allocator backends, tracks every live
//! allocation for reverse pointer attribution, and holds the
//! process-wide default space.

use std::ptr::NonNull;
use std::sync::{Mutex, OnceLock};

use indexmap::IndexMap;

use strata_core::{fatal, AllocatorId, MemError, MemorySpace};

use crate::backend::{AllocatorBackend, DevicePool, HostPool};

/// Bookkeeping for one live allocation.
#[derive(Clone, Copy, Debug)]
struct AllocRecord {
    id: AllocatorId,
    bytes: usize,
    align: usize,
}

/// Registry of allocator backends, one per configured memory space.
///
/// Single controlling thread per *container* is the concurrency model
/// upstream; the registry itself is internally synchronized so that
/// containers owned by different threads may allocate concurrently.
///
/// Most callers use the process-wide [`MemoryRegistry::global`]
/// instance rather than constructing their own.
pub struct MemoryRegistry {
    backends: Vec<Box<dyn AllocatorBackend>>,
    by_space: IndexMap<MemorySpace, AllocatorId>,
    default_space: Mutex<MemorySpace>,
    live: Mutex<IndexMap<usize, AllocRecord>>,
}

fn lock<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    // A poisoned table is still structurally sound; recover the guard.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryRegistry {
    /// Create a registry with backends for every concrete space.
    pub fn new() -> Self {
        Self::with_spaces(&MemorySpace::CONCRETE)
    }

    /// Create a registry exposing only the given spaces.
    ///
    /// Which spaces exist is configuration-dependent; allocating from
    /// a space that was not configured here is a fatal precondition
    /// violation, not an error value.
    pub fn with_spaces(spaces: &[MemorySpace]) -> Self {
        let mut backends: Vec<Box<dyn AllocatorBackend>> = Vec::with_capacity(spaces.len());
        let mut by_space = IndexMap::new();
        for &space in spaces {
            let backend: Box<dyn AllocatorBackend> = match space.host_accessible() {
                Some(true) => Box::new(HostPool::new(space)),
                Some(false) => Box::new(DevicePool::new(space)),
                None => fatal!("cannot register a backend for the dynamic space"),
            };
            let id = AllocatorId(backends.len() as u32);
            backends.push(backend);
            by_space.insert(space, id);
        }
        Self {
            backends,
            by_space,
            default_space: Mutex::new(MemorySpace::Host),
            live: Mutex::new(IndexMap::new()),
        }
    }

    /// The process-wide registry, created on first use with every
    /// concrete space configured.
    pub fn global() -> &'static MemoryRegistry {
        static GLOBAL: OnceLock<MemoryRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MemoryRegistry::new)
    }

    /// Set the default space used to resolve [`MemorySpace::Dynamic`]
    /// requests. Intended to be called once at startup.
    pub fn set_default_space(&self, space: MemorySpace) {
        if space == MemorySpace::Dynamic {
            fatal!("the default memory space must be concrete, not dynamic");
        }
        if !self.by_space.contains_key(&space) {
            fatal!("cannot default to unconfigured memory space {space}");
        }
        *lock(&self.default_space) = space;
    }

    /// The current default space.
    pub fn default_space(&self) -> MemorySpace {
        *lock(&self.default_space)
    }

    /// Resolve `Dynamic` to the current default; identity otherwise.
    pub fn resolve_space(&self, space: MemorySpace) -> MemorySpace {
        if space == MemorySpace::Dynamic {
            self.default_space()
        } else {
            space
        }
    }

    /// The allocator id bound to `space` (after `Dynamic` resolution).
    ///
    /// Requesting an unconfigured space aborts with a diagnostic.
    pub fn id_for_space(&self, space: MemorySpace) -> AllocatorId {
        let space = self.resolve_space(space);
        match self.by_space.get(&space) {
            Some(&id) => id,
            None => fatal!("memory space {space} is not configured in this registry"),
        }
    }

    fn backend_or_abort(&self, id: AllocatorId) -> &dyn AllocatorBackend {
        match self.backends.get(id.0 as usize) {
            Some(b) => b.as_ref(),
            None => fatal!("unknown allocator id {id}"),
        }
    }

    /// The backend registered under `id`, if any.
    pub fn backend(&self, id: AllocatorId) -> Option<&dyn AllocatorBackend> {
        self.backends.get(id.0 as usize).map(|b| b.as_ref())
    }

    /// Whether allocations from `id` may be dereferenced directly.
    ///
    /// Unknown ids abort: an array carrying an id the registry never
    /// issued means its bookkeeping is corrupt.
    pub fn host_accessible(&self, id: AllocatorId) -> bool {
        self.backend_or_abort(id).host_accessible()
    }

    /// The space an allocator id belongs to.
    pub fn space_of_id(&self, id: AllocatorId) -> MemorySpace {
        self.backend_or_abort(id).space()
    }

    /// Allocate `bytes` with `align` from `space`, recording the
    /// allocation for later reverse lookup.
    ///
    /// Exhaustion is an error the caller must check; an unconfigured
    /// space is a fatal precondition violation.
    pub fn allocate(
        &self,
        bytes: usize,
        align: usize,
        space: MemorySpace,
    ) -> Result<NonNull<u8>, MemError> {
        let space = self.resolve_space(space);
        let id = self.id_for_space(space);
        let backend = self.backend_or_abort(id);
        let ptr = backend
            .allocate(bytes, align)
            .ok_or(MemError::AllocationFailed {
                requested: bytes,
                space,
            })?;
        lock(&self.live).insert(ptr.as_ptr() as usize, AllocRecord { id, bytes, align });
        Ok(ptr)
    }

    /// Return `ptr` to the allocator that issued it, resolved by
    /// identity lookup on the pointer itself.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation obtained from this registry and
    /// must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        let record = match lock(&self.live).swap_remove(&(ptr.as_ptr() as usize)) {
            Some(r) => r,
            None => fatal!(
                "deallocate of untracked pointer {:#x}",
                ptr.as_ptr() as usize
            ),
        };
        let backend = self.backend_or_abort(record.id);
        // SAFETY: the record proves ptr came from this backend with
        // exactly these bytes/align, and the table entry is gone so it
        // cannot be freed twice through the registry.
        unsafe { backend.deallocate(ptr, record.bytes, record.align) };
    }

    /// Grow or shrink a tracked allocation to `new_bytes`, preserving
    /// contents up to `min(old, new)` bytes.
    ///
    /// A `new_bytes` of zero frees the allocation and returns
    /// `Ok(None)`. On exhaustion the original allocation is left
    /// intact and still tracked.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation obtained from this registry.
    /// On success the old pointer must not be used again.
    pub unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        new_bytes: usize,
    ) -> Result<Option<NonNull<u8>>, MemError> {
        if new_bytes == 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.deallocate(ptr) };
            return Ok(None);
        }
        let record = match lock(&self.live).get(&(ptr.as_ptr() as usize)).copied() {
            Some(r) => r,
            None => fatal!(
                "reallocate of untracked pointer {:#x}",
                ptr.as_ptr() as usize
            ),
        };
        let backend = self.backend_or_abort(record.id);
        let new_ptr =
            backend
                .allocate(new_bytes, record.align)
                .ok_or(MemError::AllocationFailed {
                    requested: new_bytes,
                    space: backend.space(),
                })?;
        let preserved = record.bytes.min(new_bytes);
        if preserved > 0 {
            // Stage through host memory so the same path works for
            // pools the controlling thread cannot dereference.
            let mut stage = vec![0u8; preserved];
            // SAFETY: ptr is live with record.bytes >= preserved;
            // new_ptr is live with new_bytes >= preserved; the staging
            // buffer does not overlap either pool allocation.
            unsafe {
                backend.copy_out(ptr.as_ptr(), stage.as_mut_ptr(), preserved);
                backend.copy_in(new_ptr.as_ptr(), stage.as_ptr(), preserved);
            }
        }
        {
            let mut live = lock(&self.live);
            live.swap_remove(&(ptr.as_ptr() as usize));
            live.insert(
                new_ptr.as_ptr() as usize,
                AllocRecord {
                    id: record.id,
                    bytes: new_bytes,
                    align: record.align,
                },
            );
        }
        // SAFETY: old allocation is untracked above and unreachable to
        // other registry users; bytes/align match its creation.
        unsafe { backend.deallocate(ptr, record.bytes, record.align) };
        Ok(Some(new_ptr))
    }

    /// Best-effort reverse lookup: the allocator id owning `ptr`.
    ///
    /// Returns `None` for addresses that do not start a tracked
    /// allocation (interior pointers are not resolved).
    pub fn id_of(&self, ptr: *const u8) -> Option<AllocatorId> {
        lock(&self.live).get(&(ptr as usize)).map(|r| r.id)
    }

    /// Best-effort reverse lookup: the space owning `ptr`.
    pub fn space_of(&self, ptr: *const u8) -> Option<MemorySpace> {
        self.id_of(ptr).map(|id| self.space_of_id(id))
    }

    /// Number of live tracked allocations (diagnostics and tests).
    pub fn live_allocations(&self) -> usize {
        lock(&self.live).len()
    }

    /// Bulk-copy `bytes` of host memory into the pool behind `id`.
    ///
    /// # Safety
    ///
    /// Same contract as [`AllocatorBackend::copy_in`].
    pub unsafe fn copy_in(&self, id: AllocatorId, dst: *mut u8, src: *const u8, bytes: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { self.backend_or_abort(id).copy_in(dst, src, bytes) };
    }

    /// Bulk-copy `bytes` out of the pool behind `id` into host memory.
    ///
    /// # Safety
    ///
    /// Same contract as [`AllocatorBackend::copy_out`].
    pub unsafe fn copy_out(&self, id: AllocatorId, src: *const u8, dst: *mut u8, bytes: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { self.backend_or_abort(id).copy_out(src, dst, bytes) };
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
