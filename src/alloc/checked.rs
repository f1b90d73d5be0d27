//! The allocator handle. A [`CheckedAlloc`] is a cheap, clonable value bound
//! to exactly one [`Ledger`]; the ledger is the identity. Clones alias the
//! ledger rather than duplicating it, which is what lets container code
//! allocate through one handle and free through any *equal* handle, with the
//! books staying consistent the whole way.

use std::{
    alloc::{AllocError, Allocator, Layout},
    cell::RefCell,
    fmt,
    marker::PhantomData,
    ptr::NonNull,
    rc::Rc,
};

use crate::alloc::{
    backing,
    ledger::{AbortOnViolation, Ledger, Snapshot, ViolationHook},
    policy::{DefaultPolicy, PropagationPolicy},
};

/// An instrumented allocator for storage of `T`s.
///
/// `P` fixes the container-propagation flags and `H` the violation hook --
/// both are per-*type* policy with no per-instance state, so two handles of
/// the same type differ only in which ledger they are bound to. The handle
/// is `!Send + !Sync` by construction (`Rc<RefCell<..>>`): the books are not
/// internally synchronized and the allocator is meant for single-threaded
/// container tests.
pub struct CheckedAlloc<T, P = DefaultPolicy, H = AbortOnViolation>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    ledger: Rc<RefCell<Ledger<H>>>,
    _marker: PhantomData<(fn() -> T, P)>,
}

impl<T, P, H> CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    /// The four propagation flags, surfaced off the handle type so container
    /// code can consult them without naming `P`.
    pub const PROPAGATE_ON_COPY_CONSTRUCT: bool = P::ON_COPY_CONSTRUCT;
    pub const PROPAGATE_ON_COPY_ASSIGN: bool = P::ON_COPY_ASSIGN;
    pub const PROPAGATE_ON_MOVE_ASSIGN: bool = P::ON_MOVE_ASSIGN;
    pub const PROPAGATE_ON_SWAP: bool = P::ON_SWAP;

    /// A handle bound to a brand-new, empty ledger.
    pub fn new() -> Self {
        Self::with_id("default")
    }

    /// A handle bound to a brand-new ledger labelled `id`. The label is
    /// purely diagnostic -- it shows up in [`Debug`] output and snapshots,
    /// and in nothing else.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            ledger: Rc::new(RefCell::new(Ledger::new(id))),
            _marker: PhantomData,
        }
    }

    /// Diagnostic label of the ledger this handle is bound to.
    pub fn id(&self) -> String {
        self.ledger.borrow().id().to_owned()
    }

    /// How many allocations this handle's ledger currently has on the books.
    pub fn live_allocations(&self) -> usize {
        self.ledger.borrow().outstanding()
    }

    /// Point-in-time copy of the books, for dumping next to a test failure.
    pub fn snapshot(&self) -> Snapshot {
        self.ledger.borrow().snapshot()
    }

    /// Allocate uninitialized storage for `n` elements of `T` and book it.
    ///
    /// The only failure is the backing allocator running out of memory (or
    /// `n * size_of::<T>()` overflowing a `Layout`), reported as
    /// [`AllocError`]. Booking itself cannot fail.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = Layout::array::<T>(n).map_err(|_| AllocError)?;
        let data = backing::malloc(layout)?.cast::<T>();
        self.ledger.borrow_mut().record(data.cast(), n);
        Ok(data)
    }

    /// Check `(ptr, n)` against the books and free the block if it matches.
    ///
    /// A request that does not check out -- freed twice, wrong `n`, or a
    /// pointer allocated through a handle that is not equal to this one --
    /// trips `H` and leaves both the block and the books untouched. The
    /// function itself always returns normally; misuse is never reported
    /// through a return value.
    ///
    /// # Safety
    ///
    /// - On a *matching* request the block is actually freed, so `ptr` must
    ///   not be used afterwards. (Mismatched requests are the allocator's
    ///   job to catch; dangling uses after a successful free are still on
    ///   you.)
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        self.ledger.borrow_mut().release(ptr.cast(), n);
    }

    /// The handle a container should bind when the *container* is
    /// copy-constructed: this handle's clone if the policy propagates on
    /// copy construction, otherwise a fresh default handle with its own
    /// empty ledger.
    pub fn select_on_container_copy_construction(&self) -> Self {
        if P::ON_COPY_CONSTRUCT {
            self.clone()
        } else {
            Self::new()
        }
    }

    /// Rebind this handle to element type `U`. The ledger -- and therefore
    /// the identity -- stays the same; only the element type changes. Since
    /// Rust moves cannot invalidate their source, this one operation covers
    /// both "converting copy" and "converting move" construction.
    pub fn rebind<U>(&self) -> CheckedAlloc<U, P, H> {
        CheckedAlloc {
            ledger: Rc::clone(&self.ledger),
            _marker: PhantomData,
        }
    }
}

impl<T, P, H> Default for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P, H> Clone for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    /// Clones alias the ledger, they never duplicate it. There is also no
    /// "steal the ledger and leave the source dangling" operation anywhere
    /// on this type: a moved handle carries the same `Rc` and the source
    /// simply ceases to exist, so every handle that can be observed is bound
    /// to a live ledger.
    fn clone(&self) -> Self {
        Self {
            ledger: Rc::clone(&self.ledger),
            _marker: PhantomData,
        }
    }
}

/// Handles compare equal iff they are bound to the same ledger *instance*,
/// across element types. Equal handles are interchangeable for deallocation.
impl<T, U, P, H> PartialEq<CheckedAlloc<U, P, H>> for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    fn eq(&self, other: &CheckedAlloc<U, P, H>) -> bool {
        Rc::ptr_eq(&self.ledger, &other.ledger)
    }
}

impl<T, P, H> Eq for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
}

impl<T, P, H> fmt::Debug for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CheckedAlloc({:?}, {} live)",
            self.id(),
            self.live_allocations()
        )
    }
}

// SAFETY: memory is obtained from `backing::malloc` with the requested
// layout, and clones share one ledger, so a block allocated through any
// clone may be freed through any other -- which is exactly the
// interchangeability `Allocator` demands of clones.
unsafe impl<T, P, H> Allocator for CheckedAlloc<T, P, H>
where
    P: PropagationPolicy,
    H: ViolationHook,
{
    /// Raw, `Layout`-keyed allocations are booked with `layout.size()` as
    /// the count. Don't mix the raw and the typed interface on the same
    /// block: the typed one books element counts, and the ledger cannot tell
    /// the two apart.
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let data = backing::malloc(layout)?;
        self.ledger.borrow_mut().record(data.cast(), layout.size());
        Ok(data)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.ledger.borrow_mut().release(ptr, layout.size());
    }
}
