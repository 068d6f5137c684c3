use std::time::{Duration, Instant};

use proptest::prelude::*;

use diagqual::debounce::{apply_pre_event, poll_time_qualification, DebounceState};
use diagqual::{notifier, DebounceConfig, DebounceEngine, QualifiedState};

fn counter_config() -> impl Strategy<Value = DebounceConfig> {
    (1u32..20, 1u32..20, 1u32..5, 1u32..5).prop_map(|(f, p, fs, ps)| DebounceConfig::counter(f, p, fs, ps))
}

fn verdict_for(counter: i64, config: &DebounceConfig) -> QualifiedState {
    let DebounceConfig::CounterBased(c) = config else {
        unreachable!("counter strategy only");
    };
    if counter >= c.counter_max() {
        QualifiedState::QualifiedFailed
    } else if counter <= c.counter_min() {
        QualifiedState::QualifiedPassed
    } else {
        QualifiedState::Unqualified
    }
}

proptest! {
    #[test]
    fn counter_stays_clamped_and_matches_verdict(
        config in counter_config(),
        reports in proptest::collection::vec(any::<bool>(), 0..200),
    ) {
        let DebounceConfig::CounterBased(c) = config else { unreachable!() };
        let mut state = DebounceState::new();
        let now = Instant::now();

        for pre_failed in reports {
            let before = state.qualified();
            let note = apply_pre_event(&mut state, &config, pre_failed, now);

            prop_assert!(state.counter() >= c.counter_min());
            prop_assert!(state.counter() <= c.counter_max());
            prop_assert_eq!(state.qualified(), verdict_for(state.counter(), &config));
            // Notify iff the verdict changed, and always with the new verdict.
            prop_assert_eq!(note.is_some(), before != state.qualified());
            if let Some(v) = note {
                prop_assert_eq!(v, state.qualified());
            }
        }
    }

    #[test]
    fn time_based_never_announces_same_verdict_twice(
        threshold_ms in 1u32..100,
        steps in proptest::collection::vec((any::<bool>(), 0u64..150, any::<bool>()), 0..100),
    ) {
        let config = DebounceConfig::time(threshold_ms);
        let mut state = DebounceState::new();
        let mut now = Instant::now();
        let mut last: Option<QualifiedState> = None;

        for (pre_failed, advance_ms, tick) in steps {
            now += Duration::from_millis(advance_ms);
            let note = if tick {
                poll_time_qualification(&mut state, &config, now)
            } else {
                apply_pre_event(&mut state, &config, pre_failed, now)
            };
            if let Some(v) = note {
                prop_assert_ne!(Some(v), last);
                prop_assert_eq!(v, state.qualified());
                last = Some(v);
            }
            if state.qualified().is_qualified() {
                prop_assert!(!state.run_active());
            }
        }
    }

    #[test]
    fn engine_notifications_mirror_policy(
        config in counter_config(),
        reports in proptest::collection::vec(any::<bool>(), 0..100),
    ) {
        let engine = DebounceEngine::default();
        let (notify, events) = notifier::channel();
        engine.register_monitor("p", config, Some(notify)).unwrap();

        let mut state = DebounceState::new();
        let now = Instant::now();
        let mut expected = Vec::new();
        for &pre_failed in &reports {
            engine.report_pre_event("p", pre_failed).unwrap();
            if let Some(v) = apply_pre_event(&mut state, &config, pre_failed, now) {
                expected.push(v);
            }
        }

        let got: Vec<_> = events.drain().into_iter().map(|e| e.state).collect();
        prop_assert_eq!(got, expected);
        let snap = engine.monitor_snapshot("p").unwrap();
        prop_assert_eq!(snap.counter, state.counter());
        prop_assert_eq!(snap.qualified, state.qualified());
    }
}
