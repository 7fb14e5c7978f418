//! In-process throttle store

use std::collections::HashMap;
use std::sync::RwLock;

use super::{LockTable, ThrottleStore};
use crate::error::{Result, ThrottleError};
use crate::types::{IdentityId, ThrottleState};

/// `ThrottleStore` backed by a map in memory
///
/// State is lost on restart; meant for tests and single-process deployments
/// that accept that.
#[derive(Debug, Default)]
pub struct MemoryThrottleStore {
    states: RwLock<HashMap<IdentityId, ThrottleState>>,
    locks: LockTable,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities with stored state
    pub fn len(&self) -> usize {
        self.states.read().map(|states| states.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ThrottleStore for MemoryThrottleStore {
    fn get(&self, identity: &IdentityId) -> Result<ThrottleState> {
        let states = self
            .states
            .read()
            .map_err(|_| ThrottleError::poisoned("state map"))?;
        Ok(states.get(identity).copied().unwrap_or_default())
    }

    fn put(&self, identity: &IdentityId, state: &ThrottleState) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| ThrottleError::poisoned("state map"))?;
        states.insert(*identity, *state);
        Ok(())
    }

    fn update(
        &self,
        identity: &IdentityId,
        apply: &mut dyn FnMut(ThrottleState) -> Option<ThrottleState>,
    ) -> Result<ThrottleState> {
        self.locks.with_lock(identity, || {
            let current = self.get(identity)?;
            match apply(current) {
                Some(next) => {
                    self.put(identity, &next)?;
                    Ok(next)
                }
                None => Ok(current),
            }
        })
    }
}
