//! Per-element lifecycle across memory spaces.
//!
//! These routines are the single place that bridges arbitrary element
//! semantics (constructors, destructors, clones) with buffers the
//! controlling thread may not be able to dereference. For
//! host-accessible targets they run element logic in place; for
//! accelerator-resident targets they stage through a temporary host
//! buffer and move bytes with the registry's synchronous bulk-copy
//! primitives.
//!
//! Host-accessibility is resolved once per call from the allocator id,
//! so the containers never branch on memory space themselves.
//!
//! One deliberate departure from classic placement-new containers:
//! growth paths that must conjure elements require `T: Default`
//! instead of leaving raw storage when no default exists. Types
//! without `Default` grow only through `fill`, `emplace`, or slice
//! copies.

use std::mem;
use std::ptr;

use strata_core::AllocatorId;
use strata_mem::{Dispatcher, MemoryRegistry};

/// Raw pointer wrapper so per-element closures can cross the
/// dispatcher's thread boundary. The lifecycle routines guarantee the
/// target slots are disjoint per index.
#[derive(Clone, Copy)]
struct SendPtr(*mut u8);

// SAFETY: SendPtr is only used by dispatcher closures that write
// disjoint, caller-owned slots; the pointer itself carries no state.
unsafe impl Send for SendPtr {}
// SAFETY: as above; shared access never reads through the pointer.
unsafe impl Sync for SendPtr {}

fn registry() -> &'static MemoryRegistry {
    MemoryRegistry::global()
}

/// Default-construct elements over `[begin, end)`.
///
/// # Safety
///
/// `data` must point at the base of a live allocation from `id` with
/// capacity for at least `end` elements, and `[begin, end)` must be
/// uninitialized (or trivially overwritable) slots owned by the caller.
pub unsafe fn default_init<T: Default>(
    data: *mut T,
    begin: usize,
    end: usize,
    id: AllocatorId,
) {
    if end <= begin {
        return;
    }
    if registry().host_accessible(id) {
        for i in begin..end {
            // SAFETY: slot i is in-capacity and owned by the caller.
            unsafe { ptr::write(data.add(i), T::default()) };
        }
    } else {
        let n = end - begin;
        let mut stage: Vec<T> = Vec::with_capacity(n);
        stage.extend((0..n).map(|_| T::default()));
        // SAFETY: stage holds n live elements; the target range is
        // n elements inside the id allocation; ranges cannot overlap
        // (host heap vs pool allocation).
        unsafe {
            registry().copy_in(
                id,
                data.add(begin).cast::<u8>(),
                stage.as_ptr().cast::<u8>(),
                n * mem::size_of::<T>(),
            );
            // Ownership of the staged elements moved to the target
            // buffer byte-for-byte; skip their destructors but let the
            // Vec free its storage.
            stage.set_len(0);
        }
    }
}

/// Copy-construct `value` into every slot of `[begin, end)`.
///
/// For non-host-accessible targets, types with drop glue are staged
/// through a host buffer of clones and bulk-copied across; trivially
/// destructible types skip the staging entirely and dispatch one
/// logical worker per element writing the prototype bytes directly,
/// the analogue of launching a fill kernel on the target.
///
/// # Safety
///
/// Same contract as [`default_init`].
pub unsafe fn fill<T: Clone>(
    data: *mut T,
    begin: usize,
    end: usize,
    id: AllocatorId,
    value: &T,
) {
    if end <= begin {
        return;
    }
    let n = end - begin;
    if registry().host_accessible(id) {
        for i in begin..end {
            // SAFETY: slot i is in-capacity and owned by the caller.
            unsafe { ptr::write(data.add(i), value.clone()) };
        }
    } else if mem::needs_drop::<T>() {
        let mut stage: Vec<T> = Vec::with_capacity(n);
        stage.extend((0..n).map(|_| value.clone()));
        // SAFETY: as in default_init: n live staged elements moved
        // byte-for-byte into the target range.
        unsafe {
            registry().copy_in(
                id,
                data.add(begin).cast::<u8>(),
                stage.as_ptr().cast::<u8>(),
                n * mem::size_of::<T>(),
            );
            stage.set_len(0);
        }
    } else {
        let elem = mem::size_of::<T>();
        let proto = value.clone();
        let mut proto_bytes = vec![0u8; elem];
        // SAFETY: proto is a live T; proto_bytes is elem bytes.
        unsafe {
            ptr::copy_nonoverlapping(
                (&proto as *const T).cast::<u8>(),
                proto_bytes.as_mut_ptr(),
                elem,
            );
        }
        let dst = SendPtr(unsafe { data.add(begin).cast::<u8>() });
        Dispatcher::global().for_each(n, move |i| {
            // Capture the whole wrapper, not the raw field: disjoint
            // closure capture would otherwise grab the bare pointer
            // and lose the Send + Sync guarantees.
            let dst = dst;
            // SAFETY: each index writes a distinct elem-sized slot
            // inside the caller-owned target range.
            unsafe {
                ptr::copy_nonoverlapping(proto_bytes.as_ptr(), dst.0.add(i * elem), elem)
            };
        });
    }
}

/// Clone a slice of values into slots starting at `at`.
///
/// # Safety
///
/// `data` must point at the base of a live allocation from `id` with
/// capacity for at least `at + values.len()` elements; the destination
/// slots are owned by the caller and treated as uninitialized.
pub unsafe fn clone_from_slice<T: Clone>(
    data: *mut T,
    at: usize,
    id: AllocatorId,
    values: &[T],
) {
    if values.is_empty() {
        return;
    }
    if registry().host_accessible(id) {
        for (i, v) in values.iter().enumerate() {
            // SAFETY: slot at + i is in-capacity and owned by the caller.
            unsafe { ptr::write(data.add(at + i), v.clone()) };
        }
    } else {
        let mut stage: Vec<T> = Vec::with_capacity(values.len());
        stage.extend(values.iter().cloned());
        // SAFETY: staged clones moved byte-for-byte into the target.
        unsafe {
            registry().copy_in(
                id,
                data.add(at).cast::<u8>(),
                stage.as_ptr().cast::<u8>(),
                values.len() * mem::size_of::<T>(),
            );
            stage.set_len(0);
        }
    }
}

/// Construct exactly one element at `at` from `value`.
///
/// # Safety
///
/// Same contract as [`clone_from_slice`] with a single slot.
pub unsafe fn emplace<T>(data: *mut T, at: usize, id: AllocatorId, value: T) {
    if registry().host_accessible(id) {
        // SAFETY: slot is in-capacity and owned by the caller.
        unsafe { ptr::write(data.add(at), value) };
    } else {
        // SAFETY: value is a live host-side T; one slot inside the
        // target allocation.
        unsafe {
            registry().copy_in(
                id,
                data.add(at).cast::<u8>(),
                (&value as *const T).cast::<u8>(),
                mem::size_of::<T>(),
            );
        }
        // Ownership moved into the target buffer.
        mem::forget(value);
    }
}

/// Run destructors over `[begin, end)`.
///
/// No-op for trivially destructible types. For non-host-accessible
/// targets the range is staged out to a host buffer, dropped there for
/// the destructor side effects, and the dead bytes are copied back so
/// the region stays byte-stable until it is released.
///
/// # Safety
///
/// `data` must point at the base of a live allocation from `id`, and
/// `[begin, end)` must hold initialized elements that are not used
/// again after this call.
pub unsafe fn destroy<T>(data: *mut T, begin: usize, end: usize, id: AllocatorId) {
    if end <= begin || !mem::needs_drop::<T>() {
        return;
    }
    if registry().host_accessible(id) {
        for i in begin..end {
            // SAFETY: slot i holds an initialized element the caller
            // relinquishes here.
            unsafe { ptr::drop_in_place(data.add(i)) };
        }
    } else {
        let n = end - begin;
        let bytes = n * mem::size_of::<T>();
        let mut stage: Vec<T> = Vec::with_capacity(n);
        let stage_ptr = stage.as_mut_ptr();
        // SAFETY: the staging buffer has room for n elements; the
        // source range is live inside the id allocation.
        unsafe {
            registry().copy_out(id, data.add(begin).cast::<u8>(), stage_ptr.cast::<u8>(), bytes);
        }
        for i in 0..n {
            // SAFETY: slot i of the stage was initialized by the copy
            // and is dropped exactly once.
            unsafe { ptr::drop_in_place(stage_ptr.add(i)) };
        }
        // SAFETY: dead bytes copied back over slots the caller has
        // already relinquished; stage keeps len 0 so only its storage
        // is freed.
        unsafe {
            registry().copy_in(id, data.add(begin).cast::<u8>(), stage_ptr.cast::<u8>(), bytes);
        }
    }
}

/// Relocate `[src_begin, src_end)` to start at `dst` within the same
/// buffer. Overlap-safe.
///
/// # Safety
///
/// Both the source range and the destination range must lie within the
/// capacity of the `id` allocation based at `data`. Elements in the
/// destination range are overwritten without being dropped.
pub unsafe fn relocate<T>(
    data: *mut T,
    src_begin: usize,
    src_end: usize,
    dst: usize,
    id: AllocatorId,
) {
    if src_end <= src_begin || src_begin == dst {
        return;
    }
    let n = src_end - src_begin;
    if registry().host_accessible(id) {
        // SAFETY: both ranges are in-capacity; ptr::copy handles the
        // overlap.
        unsafe { ptr::copy(data.add(src_begin), data.add(dst), n) };
    } else {
        // The host staging buffer doubles as the temporary the
        // overlapping device-side ranges are staged through.
        let bytes = n * mem::size_of::<T>();
        let mut stage = vec![0u8; bytes];
        // SAFETY: source range is live; destination range is
        // in-capacity; each primitive sees non-overlapping host/pool
        // ranges.
        unsafe {
            registry().copy_out(id, data.add(src_begin).cast::<u8>(), stage.as_mut_ptr(), bytes);
            registry().copy_in(id, data.add(dst).cast::<u8>(), stage.as_ptr(), bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MemorySpace;
    use strata_test_utils::DropCounter;

    fn alloc_elems<T>(count: usize, space: MemorySpace) -> (*mut T, AllocatorId) {
        let reg = registry();
        let ptr = reg
            .allocate(count * mem::size_of::<T>(), mem::align_of::<T>(), space)
            .expect("test allocation");
        (ptr.as_ptr().cast::<T>(), reg.id_for_space(space))
    }

    fn free<T>(ptr: *mut T) {
        // SAFETY: ptr came from alloc_elems and is not reused.
        unsafe {
            registry().deallocate(std::ptr::NonNull::new(ptr.cast::<u8>()).unwrap());
        }
    }

    fn read_back<T>(ptr: *const T, count: usize, id: AllocatorId) -> Vec<T> {
        let mut out: Vec<T> = Vec::with_capacity(count);
        // SAFETY: count live elements at ptr inside the id allocation;
        // the bit-copies are owned by the test and never dropped twice
        // because the originals are released without drops.
        unsafe {
            registry().copy_out(
                id,
                ptr.cast::<u8>(),
                out.as_mut_ptr().cast::<u8>(),
                count * mem::size_of::<T>(),
            );
            out.set_len(count);
        }
        out
    }

    #[test]
    fn default_init_on_device_writes_defaults() {
        let (ptr, id) = alloc_elems::<u64>(4, MemorySpace::Device);
        // SAFETY: 4 uninitialized slots owned by the test.
        unsafe { default_init(ptr, 0, 4, id) };
        assert_eq!(read_back(ptr, 4, id), vec![0u64; 4]);
        free(ptr);
    }

    #[test]
    fn fill_on_device_trivial_type_uses_kernel_path() {
        let (ptr, id) = alloc_elems::<u32>(100, MemorySpace::Device);
        // SAFETY: 100 uninitialized slots owned by the test.
        unsafe { fill(ptr, 0, 100, id, &0xDEAD_BEEFu32) };
        assert!(read_back(ptr, 100, id).iter().all(|&v| v == 0xDEAD_BEEF));
        free(ptr);
    }

    #[test]
    fn fill_on_device_cloneable_type_stages_clones() {
        let (ptr, id) = alloc_elems::<String>(3, MemorySpace::Device);
        // SAFETY: 3 uninitialized slots owned by the test.
        unsafe { fill(ptr, 0, 3, id, &"x".to_string()) };
        let copies = read_back(ptr, 3, id);
        assert_eq!(copies, vec!["x", "x", "x"]);
        // The bit-copies now own the strings; drop them once and
        // release the device slots without running destructors there.
        drop(copies);
        free(ptr);
    }

    #[test]
    fn destroy_on_device_runs_each_destructor_once() {
        let counter = DropCounter::new_shared();
        let (ptr, id) = alloc_elems::<DropCounter>(3, MemorySpace::Device);
        // SAFETY: 3 uninitialized slots owned by the test.
        unsafe { fill(ptr, 0, 3, id, &DropCounter::new(&counter)) };
        let before = DropCounter::drops(&counter);
        // SAFETY: the 3 elements are live and relinquished here.
        unsafe { destroy(ptr, 0, 3, id) };
        assert_eq!(DropCounter::drops(&counter) - before, 3);
        free(ptr);
    }

    #[test]
    fn relocate_on_device_handles_overlap() {
        let (ptr, id) = alloc_elems::<u32>(8, MemorySpace::Device);
        // SAFETY: 8 uninitialized slots owned by the test.
        unsafe { clone_from_slice(ptr, 0, id, &[1u32, 2, 3, 4, 5, 0, 0, 0]) };
        // Shift [1, 5) right by two, overlapping the source.
        // SAFETY: both ranges are within the 8-slot capacity.
        unsafe { relocate(ptr, 1, 5, 3, id) };
        let out = read_back(ptr, 8, id);
        assert_eq!(&out[3..7], &[2, 3, 4, 5]);
        assert_eq!(out[0], 1);
        free(ptr);
    }

    #[test]
    fn relocate_on_host_handles_overlap() {
        let (ptr, id) = alloc_elems::<u32>(8, MemorySpace::Host);
        // SAFETY: 8 uninitialized slots owned by the test.
        unsafe { clone_from_slice(ptr, 0, id, &[1u32, 2, 3, 4, 5, 0, 0, 0]) };
        // SAFETY: both ranges are within the 8-slot capacity.
        unsafe { relocate(ptr, 0, 4, 2, id) };
        // SAFETY: 8 live u32 at ptr, host-accessible.
        let out = unsafe { std::slice::from_raw_parts(ptr, 8) }.to_vec();
        assert_eq!(&out[2..6], &[1, 2, 3, 4]);
        free(ptr);
    }

    #[test]
    fn emplace_on_device_moves_the_value_across() {
        let (ptr, id) = alloc_elems::<String>(1, MemorySpace::Device);
        // SAFETY: one uninitialized slot owned by the test.
        unsafe { emplace(ptr, 0, id, "hello".to_string()) };
        let out = read_back(ptr, 1, id);
        assert_eq!(out[0], "hello");
        drop(out);
        free(ptr);
    }
}
