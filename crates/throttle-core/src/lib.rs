//! Throttle Core - Escalating per-identity login throttle
//!
//! Protects a password sign-in from brute force by counting wrong passwords
//! per identity and suspending the identity for increasingly long periods:
//!
//! - `attempts_limit` wrong passwords are tolerated
//! - the next one suspends the identity for `delay_first_minutes`
//! - every further burst adds `delay_consecutive_minutes` to the suspension
//! - a successful login clears everything
//!
//! State is persisted per identity through a `ThrottleStore`; the engine
//! itself holds nothing between calls.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod notice;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FailurePolicy, ThrottleConfig};
pub use engine::{next_state_after_failure, Access, ThrottleEngine};
pub use error::{Result, ThrottleError};
pub use gate::{Admission, FailureOutcome, IdentityLookup, LoginGate, LoginResult};
pub use notice::{describe_duration, Notice};
pub use store::{
    FileKeyValueStore, KvThrottleStore, LockTable, MemoryThrottleStore, PersistentKeyValueStore,
    ThrottleStore,
};
pub use types::{IdentityId, ThrottleState};

/// Wrong passwords tolerated before a suspension
pub const DEFAULT_ATTEMPTS_LIMIT: u32 = 3;

/// First suspension length in minutes
pub const DEFAULT_DELAY_FIRST_MINUTES: u32 = 2;

/// Minutes added for each further suspension
pub const DEFAULT_DELAY_CONSECUTIVE_MINUTES: u32 = 3;

/// Suspension ceiling in minutes (24 hours)
pub const DEFAULT_MAX_SUSPENSION_MINUTES: u32 = 24 * 60;

/// Namespace for persisted throttle keys
pub const DEFAULT_KEY_PREFIX: &str = "loginThrottle.";
