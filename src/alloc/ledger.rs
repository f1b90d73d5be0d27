//! The shared books behind every [`CheckedAlloc`] handle. One ledger per
//! allocator identity; every handle cloned from a common origin aliases the
//! same ledger, so an allocation made through one handle can be checked (and
//! freed) through any equal handle.
//!
//! [`CheckedAlloc`]: crate::alloc::checked::CheckedAlloc

use std::{fs::File, io, marker::PhantomData, path::Path, ptr::NonNull};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{alloc::backing, util::hint::cold, util::print::eputstr};

/// Invoked synchronously whenever the books catch a misuse: a leak, a double
/// free, a size-mismatched free, or a free through an unrelated allocator.
///
/// The hook is a *type* parameter of the allocator, never per-instance state,
/// so the choice of hook is fixed for the life of a handle type. It receives
/// no context and its return is not consulted -- it is a trip wire, not a
/// recovery mechanism. Callers that want to know *which* operation tripped
/// must check out of band (that is what lets `deallocate` keep its no-fail
/// signature).
pub trait ViolationHook {
    fn on_violation();
}

/// The default hook: write one line to stderr and abort. The write goes
/// through [`eputstr`] because aborting from inside allocator bookkeeping
/// with a formatted panic would itself allocate.
pub enum AbortOnViolation {}

impl ViolationHook for AbortOnViolation {
    fn on_violation() {
        eputstr(c"allocheck: allocation contract violated");
        std::process::abort();
    }
}

/// The live-allocation books for one allocator identity: which addresses are
/// currently outstanding, and how many elements were requested for each.
///
/// Dropping the ledger (i.e. dropping the last handle that aliases it) runs
/// the leak check.
pub struct Ledger<H>
where
    H: ViolationHook,
{
    /// Diagnostic label, participates in no logic
    id: String,
    /// address -> element count requested at allocation time
    outstanding: HashMap<usize, usize>,
    _hook: PhantomData<H>,
}

impl<H> Ledger<H>
where
    H: ViolationHook,
{
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outstanding: HashMap::new(),
            _hook: PhantomData,
        }
    }

    /// Diagnostic label of this ledger.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// How many allocations are currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Book a fresh allocation. `addr` comes straight out of
    /// [`backing::malloc`], so it cannot collide with a live entry -- this
    /// never fails.
    pub(crate) fn record(&mut self, addr: NonNull<u8>, count: usize) {
        self.outstanding.insert(addr.as_ptr() as usize, count);
    }

    /// Check a deallocation request against the books, and only free the
    /// block if it checks out. A rejected request trips the hook and leaves
    /// the books untouched, so later operations stay checkable.
    pub(crate) fn release(&mut self, addr: NonNull<u8>, count: usize) {
        let key = addr.as_ptr() as usize;
        match self.outstanding.get(&key) {
            // double free, or a pointer these books never issued
            None => return cold(H::on_violation),
            // right address, wrong size
            Some(&recorded) if recorded != count => return cold(H::on_violation),
            Some(_) => {}
        }
        self.outstanding.remove(&key);
        // SAFETY: the entry was live, so `addr` came from `backing::malloc`
        //         and has not been freed yet
        unsafe { backing::free(addr) };
    }

    /// Report of the current live set, sorted by address.
    pub fn snapshot(&self) -> Snapshot {
        let mut live: Vec<LiveAlloc> = self
            .outstanding
            .iter()
            .map(|(&addr, &count)| LiveAlloc { addr, count })
            .collect();
        live.sort_by_key(|alloc| alloc.addr);
        Snapshot {
            id: self.id.clone(),
            live,
        }
    }
}

impl<H> Drop for Ledger<H>
where
    H: ViolationHook,
{
    fn drop(&mut self) {
        // The last handle is gone -- anything still on the books leaked.
        // Deliberately *not* freed here: the caller may still hold (and use)
        // these blocks, and freeing them would turn a detected leak into a
        // use-after-free.
        if !self.outstanding.is_empty() {
            cold(H::on_violation);
        }
    }
}

/// One live allocation, as reported by [`Ledger::snapshot`]. The address is
/// kept as a `usize` so snapshots serialize (and round trip) without any
/// pointer shenanigans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveAlloc {
    pub addr: usize,
    pub count: usize,
}

/// A point-in-time copy of one ledger's books, for dumping alongside a test
/// failure. Entries are sorted by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub live: Vec<LiveAlloc>,
}

#[non_exhaustive]
#[derive(Debug)]
pub enum SnapshotFileError {
    IoError(io::Error),
    SerdeJsonError(serde_json::Error),
}

impl From<io::Error> for SnapshotFileError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<serde_json::Error> for SnapshotFileError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerdeJsonError(e)
    }
}

impl Snapshot {
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SnapshotFileError> {
        let file = File::create(path)?;
        serde_json::to_writer(file, self)?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotFileError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
