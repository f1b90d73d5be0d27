//! The only place this crate actually gets memory from. Everything above
//! this module is bookkeeping.

use std::{
    alloc::{AllocError, Layout},
    ptr::{self, NonNull},
};

use crate::util::hint::cold;

/// `malloc()` guarantees at least this much alignment (glibc: `max_align_t`).
/// Anything stricter takes the `memalign()` path.
pub const MALLOC_MIN_ALIGN: usize = 16;

/// Request `layout.size()` bytes from the system allocator. The returned
/// memory is uninitialized. Out-of-memory is the only failure, reported as
/// [`AllocError`].
///
/// Zero-size requests are forwarded to `malloc(0)` as-is; whether that
/// returns a unique pointer is up to the platform (glibc: it does).
pub fn malloc(layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    let data = if layout.align() <= MALLOC_MIN_ALIGN {
        // SAFETY: `malloc()` has no preconditions
        unsafe { libc::malloc(layout.size()) }
    } else {
        // SAFETY: `memalign()` requires a power-of-two alignment, which
        //         `Layout` guarantees
        cold(|| unsafe { libc::memalign(layout.align(), layout.size()) })
    };

    if data.is_null() {
        return cold(|| Err(AllocError));
    }
    let data = ptr::slice_from_raw_parts_mut(data as *mut u8, layout.size());
    Ok(NonNull::new(data).expect("just asserted that the pointer is non-null"))
}

/// Hand a block back to the system allocator.
///
/// # Safety
///
/// - `data` must have come from [`malloc`] in this module
/// - `data` must not have been freed already
pub unsafe fn free(data: NonNull<u8>) {
    // SAFETY: identical contract to caller
    unsafe { libc::free(data.as_ptr() as *mut libc::c_void) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_respects_overalignment() {
        let layout = Layout::from_size_align(256, 64).unwrap();
        let data = malloc(layout).unwrap();
        assert_eq!(data.as_ptr() as *mut u8 as usize % 64, 0);
        // SAFETY: just allocated, never freed
        unsafe { free(data.cast()) };
    }

    #[test]
    fn malloc_returns_requested_size() {
        let layout = Layout::array::<u64>(10).unwrap();
        let data = malloc(layout).unwrap();
        assert_eq!(data.len(), 80);
        // SAFETY: just allocated, never freed
        unsafe { free(data.cast()) };
    }
}
