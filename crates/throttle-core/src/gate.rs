//! Login gate: wires identity lookup, the clock and the engine into the
//! sign-in flow
//!
//! The caller drives the gate explicitly:
//!
//! 1. `admit(handle)` before looking at the password. `Unknown` handles skip
//!    throttling entirely; `Denied` must short-circuit the credential check.
//! 2. `record_failure(id)` after a wrong password for an admitted identity.
//! 3. `record_success(id)` after the credentials were accepted.
//!
//! `attempt` runs the whole sequence around a credential verifier.

use std::sync::Arc;

use tracing::{error, warn};

use crate::clock::Clock;
use crate::config::FailurePolicy;
use crate::engine::{Access, ThrottleEngine};
use crate::error::{Result, ThrottleError};
use crate::notice::Notice;
use crate::types::{IdentityId, ThrottleState};

/// Resolves a submitted login handle to an identity
pub trait IdentityLookup: Send + Sync {
    fn by_email(&self, email: &str) -> Result<Option<IdentityId>>;

    fn by_username(&self, username: &str) -> Result<Option<IdentityId>>;

    /// Try the handle as an email address first, then as a username
    fn resolve(&self, handle: &str) -> Result<Option<IdentityId>> {
        match self.by_email(handle)? {
            Some(identity) => Ok(Some(identity)),
            None => self.by_username(handle),
        }
    }
}

/// Decision taken before credentials are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No such identity; nothing is recorded for this attempt
    Unknown,
    /// Credentials may be checked for this identity
    Allowed(IdentityId),
    /// Do not check credentials
    Denied { identity: IdentityId, notice: Notice },
}

/// Result of recording a wrong password
#[derive(Debug)]
pub enum FailureOutcome {
    Recorded { state: ThrottleState, notice: Notice },
    /// The failure could not be persisted; the attempt was not counted
    Degraded(ThrottleError),
}

impl FailureOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            FailureOutcome::Recorded { notice, .. } => Some(*notice),
            FailureOutcome::Degraded(_) => None,
        }
    }
}

/// Outcome of a full sign-in attempt
#[derive(Debug)]
pub enum LoginResult {
    Authenticated(IdentityId),
    /// Credentials were wrong (or the handle is unknown)
    Rejected(Option<Notice>),
    /// The identity is suspended; credentials were not checked
    Locked(Notice),
}

/// Throttled sign-in flow
pub struct LoginGate {
    engine: ThrottleEngine,
    lookup: Arc<dyn IdentityLookup>,
    clock: Arc<dyn Clock>,
}

impl LoginGate {
    pub fn new(
        engine: ThrottleEngine,
        lookup: Arc<dyn IdentityLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            lookup,
            clock,
        }
    }

    /// Decide whether credentials for `handle` may be checked
    ///
    /// Lookup failures are returned as errors. Store failures are resolved by
    /// the configured `FailurePolicy`.
    pub fn admit(&self, handle: &str) -> Result<Admission> {
        let Some(identity) = self.lookup.resolve(handle)? else {
            return Ok(Admission::Unknown);
        };

        match self.engine.check(&identity, self.clock.now()) {
            Ok(Access::Allowed) => Ok(Admission::Allowed(identity)),
            Ok(Access::Denied { remaining_secs }) => Ok(Admission::Denied {
                identity,
                notice: Notice::LockedOut { remaining_secs },
            }),
            Err(e) if e.is_storage() => match self.engine.config().failure_policy {
                FailurePolicy::FailClosed => {
                    error!(identity = %identity, error = %e, "Throttle check failed, denying login");
                    Ok(Admission::Denied {
                        identity,
                        notice: Notice::Unavailable,
                    })
                }
                FailurePolicy::FailOpen => {
                    warn!(identity = %identity, error = %e, "Throttle check failed, allowing login unthrottled");
                    Ok(Admission::Allowed(identity))
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Count a wrong password for an admitted identity
    pub fn record_failure(&self, identity: &IdentityId) -> FailureOutcome {
        let now = self.clock.now();
        match self.engine.record_failure(identity, now) {
            Ok(state) => FailureOutcome::Recorded {
                state,
                notice: Notice::after_failure(&state, self.engine.config(), now),
            },
            Err(e) => {
                error!(identity = %identity, error = %e, "Failed login not recorded, throttle degraded");
                FailureOutcome::Degraded(e)
            }
        }
    }

    /// Clear throttle state after accepted credentials
    ///
    /// An error here should be reported, not turned into a failed login.
    pub fn record_success(&self, identity: &IdentityId) -> Result<()> {
        self.engine.reset(identity).inspect_err(|e| {
            error!(identity = %identity, error = %e, "Throttle state not cleared after login");
        })
    }

    /// Run a complete sign-in attempt
    ///
    /// `verify` is only called for identities that were admitted.
    pub fn attempt<F>(&self, handle: &str, verify: F) -> Result<LoginResult>
    where
        F: FnOnce(&IdentityId) -> Result<bool>,
    {
        let identity = match self.admit(handle)? {
            Admission::Unknown => return Ok(LoginResult::Rejected(None)),
            Admission::Denied { notice, .. } => return Ok(LoginResult::Locked(notice)),
            Admission::Allowed(identity) => identity,
        };

        if verify(&identity)? {
            // Login proceeds even if the reset could not be written
            let _ = self.record_success(&identity);
            Ok(LoginResult::Authenticated(identity))
        } else {
            Ok(LoginResult::Rejected(self.record_failure(&identity).notice()))
        }
    }
}
