//! Core types: identity handles and per-identity throttle state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an account, as resolved by an `IdentityLookup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub u64);

impl IdentityId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Persisted throttle state for one identity
///
/// The zero value means "never failed" and is what stores return for an
/// identity they have no record of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleState {
    /// Consecutive failures since the last success or the last suspension
    pub failed_attempts_count: u32,

    /// Length of the current escalation tier in minutes (0 = no tier reached)
    pub suspension_period_minutes: u32,

    /// Unix timestamp at which the active suspension ends (0 = never suspended)
    pub release_timestamp: u64,
}

impl ThrottleState {
    /// The cleared state written on a successful login
    pub const CLEARED: ThrottleState = ThrottleState {
        failed_attempts_count: 0,
        suspension_period_minutes: 0,
        release_timestamp: 0,
    };

    /// Whether every field is zero
    pub fn is_clear(&self) -> bool {
        *self == Self::CLEARED
    }

    /// Whether a suspension is active at `now`
    pub fn is_suspended(&self, now: u64) -> bool {
        self.release_timestamp > now
    }

    /// Seconds until the suspension ends, if one is active at `now`
    pub fn remaining_lockout_secs(&self, now: u64) -> Option<u64> {
        if self.is_suspended(now) {
            Some(self.release_timestamp - now)
        } else {
            None
        }
    }
}
