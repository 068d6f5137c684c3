use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use diagqual::notifier::{self, notifier};
use diagqual::{DebounceConfig, DebounceEngine, EngineConfig, QualifiedState};

#[test]
fn concurrent_reports_qualify_exactly_once() {
    let engine = Arc::new(DebounceEngine::default());
    let (notify, events) = notifier::channel();
    engine
        .register_monitor("shared", DebounceConfig::counter(3, 3, 1, 1), Some(notify))
        .unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    engine.report_pre_event("shared", true).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let states: Vec<_> = events.drain().into_iter().map(|e| e.state).collect();
    assert_eq!(states, vec![QualifiedState::QualifiedFailed]);
    assert_eq!(engine.monitor_snapshot("shared").unwrap().counter, 3);
}

#[test]
fn concurrent_registration_of_same_id_has_one_winner() {
    let engine = Arc::new(DebounceEngine::default());
    let barrier = Arc::new(Barrier::new(16));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                match engine.register_monitor("dup", DebounceConfig::default(), None) {
                    Ok(()) => {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => assert!(err.is_already_exists()),
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(engine.monitor_count().unwrap(), 1);
}

#[test]
fn panicking_notifier_on_ticker_does_not_stop_other_monitors() {
    let engine = DebounceEngine::new(EngineConfig {
        tick_interval_ms: 5,
        ..EngineConfig::default()
    })
    .unwrap();
    let (notify, events) = notifier::channel();

    engine
        .register_monitor("bad", DebounceConfig::time(10), Some(notifier(|_, _| panic!("observer bug"))))
        .unwrap();
    engine.register_monitor("good", DebounceConfig::time(10), Some(notify)).unwrap();

    engine.report_pre_event("bad", true).unwrap();
    engine.report_pre_event("good", true).unwrap();

    let first = events.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(first.state, QualifiedState::QualifiedFailed);
    assert_eq!(engine.qualified_state("bad"), Some(QualifiedState::QualifiedFailed));

    // The ticker is still alive after the panic and keeps promoting.
    engine.report_pre_event("good", false).unwrap();
    assert_eq!(events.try_recv().unwrap().state, QualifiedState::Unqualified);
    let later = events.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(later.state, QualifiedState::QualifiedPassed);

    assert!(engine.is_ticker_running());
    assert!(engine.dispatcher_stats().notifier_panics >= 1);
}

#[test]
fn panicking_notifier_on_caller_thread_is_contained() {
    let engine = DebounceEngine::default();
    engine
        .register_monitor(
            "m",
            DebounceConfig::counter(1, 1, 1, 1),
            Some(notifier(|_, _| panic!("observer bug"))),
        )
        .unwrap();

    engine.report_pre_event("m", true).unwrap();
    assert_eq!(engine.qualified_state("m"), Some(QualifiedState::QualifiedFailed));
    assert_eq!(engine.dispatcher_stats().notifier_panics, 1);

    // The registry lock was not poisoned: the counter keeps moving 1 -> 0 -> -1.
    engine.report_pre_event("m", false).unwrap();
    assert_eq!(engine.qualified_state("m"), Some(QualifiedState::Unqualified));
    engine.report_pre_event("m", false).unwrap();
    assert_eq!(engine.qualified_state("m"), Some(QualifiedState::QualifiedPassed));
    assert_eq!(engine.dispatcher_stats().notifier_panics, 3);
}

#[test]
fn notifier_may_unregister_its_own_monitor() {
    let engine = Arc::new(DebounceEngine::default());
    let weak = Arc::downgrade(&engine);
    let n = notifier(move |id, state| {
        if state == QualifiedState::QualifiedFailed {
            if let Some(engine) = weak.upgrade() {
                engine.unregister_monitor(id).unwrap();
            }
        }
    });
    engine
        .register_monitor("self_removing", DebounceConfig::counter(1, 1, 1, 1), Some(n))
        .unwrap();

    engine.report_pre_event("self_removing", true).unwrap();
    assert_eq!(engine.qualified_state("self_removing"), None);
    assert_eq!(engine.monitor_count().unwrap(), 0);
}

#[test]
fn notifier_may_report_on_another_monitor() {
    let engine = Arc::new(DebounceEngine::default());
    let weak = Arc::downgrade(&engine);
    let (notify, events) = notifier::channel();
    let chained = notifier(move |_, state| {
        if let Some(engine) = weak.upgrade() {
            engine.set_qualified_state("downstream", state).unwrap();
        }
    });
    engine
        .register_monitor("upstream", DebounceConfig::counter(1, 1, 1, 1), Some(chained))
        .unwrap();
    engine.register_monitor("downstream", DebounceConfig::default(), Some(notify)).unwrap();

    engine.report_pre_event("upstream", true).unwrap();
    let event = events.try_recv().unwrap();
    assert_eq!(event.monitor_id.as_str(), "downstream");
    assert_eq!(event.state, QualifiedState::QualifiedFailed);
}

#[test]
fn unregister_during_ticker_scans_is_safe() {
    let engine = Arc::new(
        DebounceEngine::new(EngineConfig {
            tick_interval_ms: 1,
            ..EngineConfig::default()
        })
        .unwrap(),
    );

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("w{w}-{i}");
                    engine.register_monitor(id.as_str(), DebounceConfig::time(1), None).unwrap();
                    engine.report_pre_event(&id, i % 2 == 0).unwrap();
                    engine.unregister_monitor(&id).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(engine.monitor_count().unwrap(), 0);
    engine.shutdown();
    assert!(!engine.is_ticker_running());
}

#[test]
fn dropping_engine_joins_ticker() {
    let (notify, events) = notifier::channel();
    {
        let engine = DebounceEngine::new(EngineConfig {
            tick_interval_ms: 5,
            ..EngineConfig::default()
        })
        .unwrap();
        engine.register_monitor("t", DebounceConfig::time(60_000), Some(notify)).unwrap();
        assert!(engine.is_ticker_running());
    }
    // The engine and with it the only notifier handle are gone.
    assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn refused_time_registration_never_removes_a_concurrent_registration() {
    let engine = Arc::new(DebounceEngine::default());
    engine.shutdown();
    let barrier = Arc::new(Barrier::new(2));

    let refused = {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..500 {
                let err = engine.register_monitor("t", DebounceConfig::time(10), None).unwrap_err();
                assert!(matches!(err, diagqual::DiagError::EngineStopped));
            }
        })
    };

    barrier.wait();
    for _ in 0..500 {
        engine.register_monitor("t", DebounceConfig::counter(1, 1, 1, 1), None).unwrap();
        assert!(engine.monitor_snapshot("t").is_some());
        engine.unregister_monitor("t").unwrap();
    }
    refused.join().unwrap();
    assert_eq!(engine.monitor_count().unwrap(), 0);
}
