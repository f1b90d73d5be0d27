//! Compile-time propagation policy for [`CheckedAlloc`].
//!
//! Container code that is generic over its allocator consults these flags
//! when the *container* is copied, assigned, or swapped, to decide whether
//! the allocator (and with it, its ledger identity) travels along. They are
//! per-type policy, not per-instance state: picking a policy costs nothing
//! at runtime, the flags monomorphize away.
//!
//! [`CheckedAlloc`]: crate::alloc::checked::CheckedAlloc

pub trait PropagationPolicy {
    /// Should `select_on_container_copy_construction` hand out a handle that
    /// shares the source's ledger (`true`), or a fresh one (`false`)?
    const ON_COPY_CONSTRUCT: bool;
    const ON_COPY_ASSIGN: bool;
    const ON_MOVE_ASSIGN: bool;
    const ON_SWAP: bool;
}

/// Copies start from a fresh allocator; moves and swaps carry it along.
pub enum DefaultPolicy {}

impl PropagationPolicy for DefaultPolicy {
    const ON_COPY_CONSTRUCT: bool = false;
    const ON_COPY_ASSIGN: bool = false;
    const ON_MOVE_ASSIGN: bool = true;
    const ON_SWAP: bool = true;
}

/// Propagate on every container operation.
pub enum AlwaysPropagate {}

impl PropagationPolicy for AlwaysPropagate {
    const ON_COPY_CONSTRUCT: bool = true;
    const ON_COPY_ASSIGN: bool = true;
    const ON_MOVE_ASSIGN: bool = true;
    const ON_SWAP: bool = true;
}

/// Never propagate.
pub enum NeverPropagate {}

impl PropagationPolicy for NeverPropagate {
    const ON_COPY_CONSTRUCT: bool = false;
    const ON_COPY_ASSIGN: bool = false;
    const ON_MOVE_ASSIGN: bool = false;
    const ON_SWAP: bool = false;
}
