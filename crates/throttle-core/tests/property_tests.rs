//! Property-based tests for the escalation state machine using proptest
//!
//! These tests verify invariants that should hold for any failure sequence
//! and any configuration.

use proptest::prelude::*;
use std::sync::Arc;
use throttle_core::{
    next_state_after_failure, Access, IdentityId, MemoryThrottleStore, ThrottleConfig,
    ThrottleEngine, ThrottleState, ThrottleStore,
};

const START: u64 = 1_700_000_000;

// ============================================
// Strategies
// ============================================

fn arb_config() -> impl Strategy<Value = ThrottleConfig> {
    (1u32..=10, 1u32..=60, 1u32..=60)
        .prop_map(|(limit, first, next)| ThrottleConfig::with_delays(limit, first, next).unbounded())
}

fn arb_state() -> impl Strategy<Value = ThrottleState> {
    (0u32..=20, 0u32..=10_000, 0u64..=START * 2).prop_map(|(count, period, release)| {
        ThrottleState {
            failed_attempts_count: count,
            suspension_period_minutes: period,
            release_timestamp: release,
        }
    })
}

/// Gaps (in seconds) between consecutive failures
fn arb_gaps() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(prop_oneof![Just(0u64), 0u64..=600, 0u64..=86_400], 1..120)
}

fn engine(config: ThrottleConfig) -> (ThrottleEngine, Arc<MemoryThrottleStore>) {
    let store = Arc::new(MemoryThrottleStore::new());
    let engine = ThrottleEngine::new(store.clone(), config).unwrap();
    (engine, store)
}

// ============================================
// Properties
// ============================================

proptest! {
    #[test]
    fn prop_count_never_exceeds_limit(config in arb_config(), gaps in arb_gaps()) {
        let (engine, _) = engine(config.clone());
        let id = IdentityId(1);
        let mut now = START;
        let mut previous = ThrottleState::default();

        for gap in gaps {
            now += gap;
            let state = engine.record_failure(&id, now).unwrap();
            prop_assert!(state.failed_attempts_count <= config.attempts_limit);

            if previous.failed_attempts_count == config.attempts_limit {
                // Escalation fired: counter restarts, tier grows
                prop_assert_eq!(state.failed_attempts_count, 0);
                prop_assert!(state.suspension_period_minutes > previous.suspension_period_minutes);
                prop_assert!(state.is_suspended(now));
            } else {
                prop_assert_eq!(state.failed_attempts_count, previous.failed_attempts_count + 1);
                prop_assert_eq!(state.suspension_period_minutes, previous.suspension_period_minutes);
            }
            previous = state;
        }
    }

    #[test]
    fn prop_nth_suspension_period(config in arb_config(), n in 1u32..=20) {
        let (engine, _) = engine(config.clone());
        let id = IdentityId(1);
        let mut now = START;

        for _ in 0..n {
            for _ in 0..=config.attempts_limit {
                engine.record_failure(&id, now).unwrap();
            }
            now = engine.state(&id).unwrap().release_timestamp;
        }

        let expected = config.delay_first_minutes + (n - 1) * config.delay_consecutive_minutes;
        prop_assert_eq!(engine.state(&id).unwrap().suspension_period_minutes, expected);
    }

    #[test]
    fn prop_period_monotonic_and_release_forward_only(
        config in arb_config(),
        start in arb_state(),
        gaps in arb_gaps(),
    ) {
        let mut state = start;
        let mut now = START;

        for gap in gaps {
            now += gap;
            let next = next_state_after_failure(state, &config, now);
            prop_assert!(next.suspension_period_minutes >= state.suspension_period_minutes);
            prop_assert!(next.release_timestamp >= state.release_timestamp);
            if next.release_timestamp != state.release_timestamp {
                prop_assert!(next.release_timestamp >= now);
            }
            state = next;
        }
    }

    #[test]
    fn prop_cap_bounds_new_tiers(gaps in arb_gaps(), cap in 2u32..=50) {
        let mut config = ThrottleConfig::with_delays(1, 2, 7);
        config.max_suspension_minutes = cap;
        let (engine, _) = engine(config);
        let id = IdentityId(1);
        let mut now = START;

        for gap in gaps {
            now += gap;
            let state = engine.record_failure(&id, now).unwrap();
            prop_assert!(state.suspension_period_minutes <= cap);
        }
    }

    #[test]
    fn prop_reset_always_clears(start in arb_state()) {
        let (engine, store) = engine(ThrottleConfig::default());
        let id = IdentityId(9);
        store.put(&id, &start).unwrap();

        engine.reset(&id).unwrap();
        prop_assert_eq!(store.get(&id).unwrap(), ThrottleState::default());
        prop_assert_eq!(engine.check(&id, 0).unwrap(), Access::Allowed);
    }

    #[test]
    fn prop_check_matches_release(start in arb_state(), now in 0u64..=START * 2) {
        let (engine, store) = engine(ThrottleConfig::default());
        let id = IdentityId(3);
        store.put(&id, &start).unwrap();

        let access = engine.check(&id, now).unwrap();
        if now >= start.release_timestamp {
            prop_assert_eq!(access, Access::Allowed);
        } else {
            prop_assert_eq!(
                access,
                Access::Denied { remaining_secs: start.release_timestamp - now }
            );
        }
    }

    #[test]
    fn prop_check_is_read_only(start in arb_state(), times in prop::collection::vec(0u64..=START * 2, 1..20)) {
        let (engine, store) = engine(ThrottleConfig::default());
        let id = IdentityId(4);
        store.put(&id, &start).unwrap();

        for now in times {
            engine.check(&id, now).unwrap();
        }
        prop_assert_eq!(store.get(&id).unwrap(), start);
    }
}
