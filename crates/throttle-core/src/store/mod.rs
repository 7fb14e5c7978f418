//! Throttle state storage
//!
//! Stores are pure persistence: no policy lives here. The one contract that
//! matters for correctness is `update`, which must run read-modify-write for a
//! single identity without interleaving with another `update` for the same
//! identity. Distinct identities never block each other beyond a map lookup.

mod file;
mod kv;
mod memory;

pub use file::FileKeyValueStore;
pub use kv::{
    KvThrottleStore, PersistentKeyValueStore, FAILED_ATTEMPTS_KEY, RELEASE_TIMESTAMP_KEY,
    SUSPENSION_PERIOD_KEY,
};
pub use memory::MemoryThrottleStore;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, ThrottleError};
use crate::types::{IdentityId, ThrottleState};

/// Per-identity persistence of `ThrottleState`
pub trait ThrottleStore: Send + Sync {
    /// Read the state for `identity`; absent state reads as zero
    fn get(&self, identity: &IdentityId) -> Result<ThrottleState>;

    /// Overwrite the state for `identity`
    fn put(&self, identity: &IdentityId, state: &ThrottleState) -> Result<()>;

    /// Atomically replace the state for `identity` with `apply(current)`
    ///
    /// `apply` returning `None` leaves the store untouched. Returns the state
    /// held afterwards.
    fn update(
        &self,
        identity: &IdentityId,
        apply: &mut dyn FnMut(ThrottleState) -> Option<ThrottleState>,
    ) -> Result<ThrottleState>;
}

/// Table of per-identity mutexes
///
/// Entries exist only while someone holds or waits on them.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<IdentityId, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `identity`
    pub fn with_lock<T>(&self, identity: &IdentityId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let entry = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| ThrottleError::poisoned("lock table"))?;
            Arc::clone(locks.entry(*identity).or_default())
        };

        let result = match entry.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(ThrottleError::poisoned("identity")),
        };

        // Table + our clone: nobody else is waiting, drop the entry.
        // A poisoned entry goes too, so the next caller gets a fresh one.
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| ThrottleError::poisoned("lock table"))?;
        if Arc::strong_count(&entry) == 2 {
            locks.remove(identity);
        }

        result
    }

    /// Number of identities with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
