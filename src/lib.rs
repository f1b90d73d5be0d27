//! An allocator that keeps the books. Every allocation made through a
//! [`alloc::checked::CheckedAlloc`] is recorded in a shared ledger, and every
//! deallocation is checked against it -- double frees, frees with the wrong
//! size, frees through an unrelated allocator and allocations that never get
//! freed at all trip a violation hook instead of silently corrupting the
//! heap. Useful for testing container code that is generic over its
//! allocator.

#![feature(allocator_api)]

pub mod alloc;
pub mod util;
