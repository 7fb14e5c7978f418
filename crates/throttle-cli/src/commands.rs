//! Command implementations for the operator CLI
//!
//! Each handler returns the text to print so it can be tested without a
//! terminal.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use throttle_core::{
    describe_duration, Access, Clock, FileKeyValueStore, IdentityId, KvThrottleStore, Notice,
    ThrottleConfig, ThrottleEngine,
};

/// Open the file-backed engine described by `config`
pub fn open_engine(config: &ThrottleConfig, state_path: &Path) -> Result<ThrottleEngine> {
    let backend = FileKeyValueStore::new(state_path)
        .with_context(|| format!("opening state file {}", state_path.display()))?;
    let store = KvThrottleStore::new(backend, config.key_prefix.clone());
    Ok(ThrottleEngine::new(Arc::new(store), config.clone())?)
}

fn describe_access(access: Access) -> String {
    match access {
        Access::Allowed => "allowed".to_string(),
        Access::Denied { remaining_secs } => {
            format!("denied ({} remaining)", describe_duration(remaining_secs))
        }
    }
}

/// Show the stored state and what a check would decide now
pub fn status(
    engine: &ThrottleEngine,
    clock: &dyn Clock,
    identity: IdentityId,
    json: bool,
) -> Result<String> {
    let now = clock.now();
    let state = engine.state(&identity)?;
    let access = engine.check(&identity, now)?;

    if json {
        let value = serde_json::json!({
            "identity": identity,
            "state": state,
            "allowed": access.is_allowed(),
            "remaining_secs": match access {
                Access::Allowed => 0,
                Access::Denied { remaining_secs } => remaining_secs,
            },
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    Ok(format!(
        "Identity:           {}\n\
         Failed attempts:    {} (limit {})\n\
         Suspension period:  {} minutes\n\
         Release timestamp:  {}\n\
         Access:             {}",
        identity,
        state.failed_attempts_count,
        engine.config().attempts_limit,
        state.suspension_period_minutes,
        state.release_timestamp,
        describe_access(access),
    ))
}

/// Run a check; the boolean is whether the identity is allowed
pub fn check(
    engine: &ThrottleEngine,
    clock: &dyn Clock,
    identity: IdentityId,
) -> Result<(bool, String)> {
    let access = engine.check(&identity, clock.now())?;
    let text = match access {
        Access::Allowed => format!("{}: allowed", identity),
        Access::Denied { remaining_secs } => format!(
            "{}: {}",
            identity,
            Notice::LockedOut { remaining_secs }
        ),
    };
    Ok((access.is_allowed(), text))
}

/// Record one failed attempt now
pub fn fail(engine: &ThrottleEngine, clock: &dyn Clock, identity: IdentityId) -> Result<String> {
    let now = clock.now();
    let state = engine.record_failure(&identity, now)?;
    Ok(format!(
        "{}: {}",
        identity,
        Notice::after_failure(&state, engine.config(), now)
    ))
}

/// Clear all throttle state (manual unlock)
pub fn reset(engine: &ThrottleEngine, identity: IdentityId) -> Result<String> {
    engine.reset(&identity)?;
    Ok(format!("{}: throttle state cleared", identity))
}

/// Effective configuration as TOML
pub fn config_show(config: &ThrottleConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// Write the default configuration to `path`
pub fn config_init(path: &Path, force: bool) -> Result<String> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    ThrottleConfig::default().save(path)?;
    Ok(format!("Wrote default configuration to {}", path.display()))
}
