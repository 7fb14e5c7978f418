//! Escalation policy
//!
//! The engine is stateless between calls. Each operation is one read (or one
//! atomic read-modify-write) against the store for a single identity:
//!
//! - `check` before credentials are validated
//! - `record_failure` after a wrong password for an existing identity
//! - `reset` after a successful login
//!
//! Every `attempts_limit + 1`th consecutive failure starts a suspension. The
//! first suspension lasts `delay_first_minutes`; each later one, with no
//! successful login in between, lasts `delay_consecutive_minutes` longer than
//! the previous one (up to the configured ceiling).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ThrottleConfig;
use crate::error::Result;
use crate::store::ThrottleStore;
use crate::types::{IdentityId, ThrottleState};

/// Result of a pre-authentication check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Credentials may be checked
    Allowed,
    /// The identity is suspended; skip the credential check
    Denied { remaining_secs: u64 },
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Compute the state that follows one more failed attempt at `now`
pub fn next_state_after_failure(
    current: ThrottleState,
    config: &ThrottleConfig,
    now: u64,
) -> ThrottleState {
    let mut next = current;
    next.failed_attempts_count = current.failed_attempts_count.saturating_add(1);

    if next.failed_attempts_count > config.attempts_limit {
        let escalated = if current.suspension_period_minutes == 0 {
            config.delay_first_minutes
        } else {
            current
                .suspension_period_minutes
                .saturating_add(config.delay_consecutive_minutes)
        };
        let capped = match config.suspension_cap() {
            Some(cap) => escalated.min(cap),
            None => escalated,
        };
        // A lowered ceiling never shrinks a tier already reached
        next.suspension_period_minutes = capped.max(current.suspension_period_minutes);

        let release = now.saturating_add(u64::from(next.suspension_period_minutes) * 60);
        // Never shorten a suspension that is already running
        next.release_timestamp = release.max(current.release_timestamp);
        next.failed_attempts_count = 0;
    }

    next
}

/// Stateless escalation policy over a `ThrottleStore`
#[derive(Clone)]
pub struct ThrottleEngine {
    store: Arc<dyn ThrottleStore>,
    config: ThrottleConfig,
}

impl ThrottleEngine {
    /// Create an engine; fails if `config` does not validate
    pub fn new(store: Arc<dyn ThrottleStore>, config: ThrottleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Read the stored state without changing it
    pub fn state(&self, identity: &IdentityId) -> Result<ThrottleState> {
        self.store.get(identity)
    }

    /// Whether `identity` may attempt to authenticate at `now`
    pub fn check(&self, identity: &IdentityId, now: u64) -> Result<Access> {
        let state = self.store.get(identity)?;
        Ok(match state.remaining_lockout_secs(now) {
            Some(remaining_secs) => Access::Denied { remaining_secs },
            None => Access::Allowed,
        })
    }

    /// Record a wrong password for an existing identity
    ///
    /// Must not be called for handles that did not resolve to an identity.
    /// Returns the state after the update.
    pub fn record_failure(&self, identity: &IdentityId, now: u64) -> Result<ThrottleState> {
        let state = self.store.update(identity, &mut |current| {
            Some(next_state_after_failure(current, &self.config, now))
        })?;

        if state.failed_attempts_count == 0 && state.is_suspended(now) {
            warn!(
                identity = %identity,
                period_minutes = state.suspension_period_minutes,
                release_timestamp = state.release_timestamp,
                "Login suspended after repeated failures"
            );
        } else {
            debug!(
                identity = %identity,
                failed_attempts = state.failed_attempts_count,
                "Failed login recorded"
            );
        }

        Ok(state)
    }

    /// Clear all throttle state after a successful login
    ///
    /// Identities with nothing recorded are left without a stored entry.
    pub fn reset(&self, identity: &IdentityId) -> Result<()> {
        let mut previous = ThrottleState::CLEARED;
        self.store.update(identity, &mut |current| {
            previous = current;
            (!current.is_clear()).then_some(ThrottleState::CLEARED)
        })?;

        if !previous.is_clear() {
            info!(
                identity = %identity,
                failed_attempts = previous.failed_attempts_count,
                period_minutes = previous.suspension_period_minutes,
                "Throttle state cleared"
            );
        }

        Ok(())
    }
}
