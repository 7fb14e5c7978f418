//! User-facing messages for throttle outcomes
//!
//! Lockout messages always show the remaining duration, never the absolute
//! release time.

use std::fmt;

use crate::config::ThrottleConfig;
use crate::types::ThrottleState;

/// Message to show the person signing in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The identity is suspended; credentials were not checked
    LockedOut { remaining_secs: u64 },
    /// Wrong password; this many more are tolerated before a suspension
    AttemptsRemaining(u32),
    /// Wrong password that started (or hit) a suspension
    Suspended { minutes: u32 },
    /// Throttle state could not be read and the gate fails closed
    Unavailable,
}

impl Notice {
    /// Notice for a wrong password, given the state `record_failure` returned
    pub fn after_failure(state: &ThrottleState, config: &ThrottleConfig, now: u64) -> Self {
        if let Some(remaining_secs) = state.remaining_lockout_secs(now) {
            // An earlier, longer release may still be running
            let remaining_minutes =
                u32::try_from(remaining_secs.div_ceil(60)).unwrap_or(u32::MAX);
            Notice::Suspended {
                minutes: state
                    .suspension_period_minutes
                    .max(config.delay_first_minutes)
                    .max(remaining_minutes),
            }
        } else {
            Notice::AttemptsRemaining(
                config
                    .attempts_limit
                    .saturating_sub(state.failed_attempts_count),
            )
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LockedOut { remaining_secs } => write!(
                f,
                "Too many failed login attempts. Try again in {}.",
                describe_duration(*remaining_secs)
            ),
            Notice::AttemptsRemaining(1) => write!(f, "You have 1 try left."),
            Notice::AttemptsRemaining(n) => write!(f, "You have {} tries left.", n),
            Notice::Suspended { minutes: 1 } => {
                write!(f, "Your account has been suspended for 1 minute.")
            }
            Notice::Suspended { minutes } => {
                write!(f, "Your account has been suspended for {} minutes.", minutes)
            }
            Notice::Unavailable => write!(
                f,
                "Sign-in is temporarily unavailable. Please try again later."
            ),
        }
    }
}

/// Human-readable duration, rounded up to the displayed unit
pub fn describe_duration(secs: u64) -> String {
    let (value, unit) = if secs < 60 {
        (secs, "second")
    } else if secs < 3600 {
        (secs.div_ceil(60), "minute")
    } else if secs < 86400 {
        (secs.div_ceil(3600), "hour")
    } else {
        (secs.div_ceil(86400), "day")
    };

    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0 seconds")]
    #[case(1, "1 second")]
    #[case(59, "59 seconds")]
    #[case(60, "1 minute")]
    #[case(61, "2 minutes")]
    #[case(120, "2 minutes")]
    #[case(3600, "1 hour")]
    #[case(3601, "2 hours")]
    #[case(86400, "1 day")]
    #[case(90000, "2 days")]
    fn test_describe_duration(#[case] secs: u64, #[case] expected: &str) {
        assert_eq!(describe_duration(secs), expected);
    }

    #[test]
    fn test_locked_out_uses_remaining_duration() {
        let notice = Notice::LockedOut { remaining_secs: 90 };
        assert_eq!(
            notice.to_string(),
            "Too many failed login attempts. Try again in 2 minutes."
        );
    }

    #[test]
    fn test_after_failure_counts_down() {
        let config = ThrottleConfig::default();
        let state = ThrottleState {
            failed_attempts_count: 1,
            ..Default::default()
        };

        let notice = Notice::after_failure(&state, &config, 1_000);
        assert_eq!(notice, Notice::AttemptsRemaining(2));
        assert_eq!(notice.to_string(), "You have 2 tries left.");
    }

    #[test]
    fn test_after_failure_at_limit_has_no_tries_left() {
        let config = ThrottleConfig::default();
        let state = ThrottleState {
            failed_attempts_count: 3,
            ..Default::default()
        };
        assert_eq!(
            Notice::after_failure(&state, &config, 1_000),
            Notice::AttemptsRemaining(0)
        );
    }

    #[test]
    fn test_after_failure_reports_suspension() {
        let config = ThrottleConfig::default();
        let state = ThrottleState {
            failed_attempts_count: 0,
            suspension_period_minutes: 5,
            release_timestamp: 1_300,
        };

        let notice = Notice::after_failure(&state, &config, 1_000);
        assert_eq!(notice, Notice::Suspended { minutes: 5 });
        assert_eq!(
            notice.to_string(),
            "Your account has been suspended for 5 minutes."
        );
    }

    #[test]
    fn test_after_failure_reports_longer_running_release() {
        let config = ThrottleConfig::default();
        let state = ThrottleState {
            failed_attempts_count: 0,
            suspension_period_minutes: 2,
            release_timestamp: 1_000 + 10 * 60 + 1,
        };

        assert_eq!(
            Notice::after_failure(&state, &config, 1_000),
            Notice::Suspended { minutes: 11 }
        );
    }

    #[test]
    fn test_singular_forms() {
        assert_eq!(Notice::AttemptsRemaining(1).to_string(), "You have 1 try left.");
        assert_eq!(
            Notice::Suspended { minutes: 1 }.to_string(),
            "Your account has been suspended for 1 minute."
        );
    }
}
