//! Adapter from a namespaced per-identity key-value store to `ThrottleStore`
//!
//! Throttle state shares the identity's metadata space with unrelated keys,
//! so every key is written under a prefix (`loginThrottle.` by default) and
//! only the three throttle keys are ever touched.

use std::collections::HashMap;

use super::{LockTable, ThrottleStore};
use crate::error::{Result, ThrottleError};
use crate::types::{IdentityId, ThrottleState};

/// Key holding `ThrottleState::failed_attempts_count`
pub const FAILED_ATTEMPTS_KEY: &str = "FailedAttemptsCount";
/// Key holding `ThrottleState::suspension_period_minutes`
pub const SUSPENSION_PERIOD_KEY: &str = "SuspensionPeriodMinutes";
/// Key holding `ThrottleState::release_timestamp`
pub const RELEASE_TIMESTAMP_KEY: &str = "ReleaseTimestamp";

/// Per-identity metadata storage with prefix namespacing
pub trait PersistentKeyValueStore: Send + Sync {
    /// All values for `identity` whose key starts with `prefix`, keyed by the
    /// remainder of the key (prefix stripped)
    fn get(&self, identity: &IdentityId, prefix: &str) -> Result<HashMap<String, String>>;

    /// Write `values` for `identity`, each key stored as `prefix + key`;
    /// keys not in `values` are left alone
    fn put(
        &self,
        identity: &IdentityId,
        values: &HashMap<String, String>,
        prefix: &str,
    ) -> Result<()>;

    /// Read the values under `prefix`, then write whatever `apply` returns
    ///
    /// Backends shared beyond one handle override this to hold their own
    /// exclusive lock across the read and the write. `None` skips the write.
    fn modify(
        &self,
        identity: &IdentityId,
        prefix: &str,
        apply: &mut dyn FnMut(&HashMap<String, String>) -> Result<Option<HashMap<String, String>>>,
    ) -> Result<()> {
        let current = self.get(identity, prefix)?;
        if let Some(values) = apply(&current)? {
            self.put(identity, &values, prefix)?;
        }
        Ok(())
    }
}

/// `ThrottleStore` over any `PersistentKeyValueStore`
pub struct KvThrottleStore<K> {
    backend: K,
    prefix: String,
    locks: LockTable,
}

impl<K: PersistentKeyValueStore> KvThrottleStore<K> {
    pub fn new(backend: K, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            locks: LockTable::new(),
        }
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    fn decode(identity: &IdentityId, values: &HashMap<String, String>) -> Result<ThrottleState> {
        Ok(ThrottleState {
            failed_attempts_count: parse_field(identity, values, FAILED_ATTEMPTS_KEY)?,
            suspension_period_minutes: parse_field(identity, values, SUSPENSION_PERIOD_KEY)?,
            release_timestamp: parse_field(identity, values, RELEASE_TIMESTAMP_KEY)?,
        })
    }

    fn encode(state: &ThrottleState) -> HashMap<String, String> {
        HashMap::from([
            (
                FAILED_ATTEMPTS_KEY.to_string(),
                state.failed_attempts_count.to_string(),
            ),
            (
                SUSPENSION_PERIOD_KEY.to_string(),
                state.suspension_period_minutes.to_string(),
            ),
            (
                RELEASE_TIMESTAMP_KEY.to_string(),
                state.release_timestamp.to_string(),
            ),
        ])
    }
}

fn parse_field<T>(
    identity: &IdentityId,
    values: &HashMap<String, String>,
    field: &'static str,
) -> Result<T>
where
    T: std::str::FromStr + Default,
{
    match values.get(field) {
        None => Ok(T::default()),
        Some(raw) if raw.trim().is_empty() => Ok(T::default()),
        Some(raw) => raw.trim().parse().map_err(|_| ThrottleError::CorruptState {
            identity: *identity,
            field,
            value: raw.clone(),
        }),
    }
}

impl<K: PersistentKeyValueStore> ThrottleStore for KvThrottleStore<K> {
    fn get(&self, identity: &IdentityId) -> Result<ThrottleState> {
        let values = self.backend.get(identity, &self.prefix)?;
        Self::decode(identity, &values)
    }

    fn put(&self, identity: &IdentityId, state: &ThrottleState) -> Result<()> {
        self.backend
            .put(identity, &Self::encode(state), &self.prefix)
    }

    fn update(
        &self,
        identity: &IdentityId,
        apply: &mut dyn FnMut(ThrottleState) -> Option<ThrottleState>,
    ) -> Result<ThrottleState> {
        self.locks.with_lock(identity, || {
            let mut held = ThrottleState::CLEARED;
            let mut step =
                |values: &HashMap<String, String>| -> Result<Option<HashMap<String, String>>> {
                    let current = Self::decode(identity, values)?;
                    Ok(match apply(current) {
                        Some(next) => {
                            held = next;
                            Some(Self::encode(&next))
                        }
                        None => {
                            held = current;
                            None
                        }
                    })
                };
            self.backend.modify(identity, &self.prefix, &mut step)?;
            Ok(held)
        })
    }
}
