//! Error types for the login throttle

use thiserror::Error;

use crate::types::IdentityId;

/// Result type alias for throttle operations
pub type Result<T> = std::result::Result<T, ThrottleError>;

/// Errors that can occur while checking or updating throttle state
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The backing store could not be read or written
    #[error("Throttle storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A persisted field holds something other than a non-negative integer
    #[error("Corrupt throttle state for identity {identity}: {field} = {value:?}")]
    CorruptState {
        identity: IdentityId,
        field: &'static str,
        value: String,
    },

    /// A tunable is out of range
    #[error("Invalid throttle configuration: {0}")]
    InvalidConfiguration(String),

    /// The identity lookup backend failed (a miss is not an error)
    #[error("Identity lookup failed: {0}")]
    Lookup(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("Config serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl ThrottleError {
    /// Whether the error means the throttle could not see or persist state.
    ///
    /// The gate applies its failure policy to these; anything else is a
    /// programming or deployment mistake and is propagated.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ThrottleError::StorageUnavailable(_)
                | ThrottleError::CorruptState { .. }
                | ThrottleError::Io(_)
                | ThrottleError::Json(_)
        )
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        ThrottleError::StorageUnavailable(format!("{} lock poisoned", what))
    }
}
