//! Debounce transition functions.
//!
//! Everything here is pure: the functions take the current state, the monitor
//! configuration, one reported pre-event and the current instant, mutate the
//! state in place and return the verdict to announce, if any. They are called
//! with the registry lock held and must never call out to a notifier.

use std::time::Instant;

use crate::types::QualifiedState;

use super::config::{CounterBased, DebounceConfig, TimeBased};

/// Mutable debounce accumulation state of one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebounceState {
    counter: i64,
    qualified: QualifiedState,
    last_pre_failed: Option<bool>,
    pre_started: Option<Instant>,
    frozen: bool,
}

impl DebounceState {
    /// A fresh, unqualified, unfrozen state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value (counter-based monitors only).
    #[must_use]
    pub const fn counter(&self) -> i64 {
        self.counter
    }

    /// Current qualified verdict.
    #[must_use]
    pub const fn qualified(&self) -> QualifiedState {
        self.qualified
    }

    /// Polarity of the current or last run (time-based monitors only).
    #[must_use]
    pub const fn last_pre_failed(&self) -> Option<bool> {
        self.last_pre_failed
    }

    /// Start of the active run, if one is being timed.
    #[must_use]
    pub const fn pre_started(&self) -> Option<Instant> {
        self.pre_started
    }

    /// True while a time-based run is waiting to qualify.
    #[must_use]
    pub const fn run_active(&self) -> bool {
        self.pre_started.is_some()
    }

    /// True if reported pre-events are being ignored.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Force the verdict without touching counters or timers.
    pub fn force_qualified(&mut self, state: QualifiedState) {
        self.qualified = state;
    }

    /// Stop accumulating until the next reset.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Clear counter, run markers and the frozen flag; the verdict becomes
    /// `Unqualified`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Apply one reported pre-event.
///
/// Returns the new verdict when a notification is owed. Frozen states are left
/// untouched and never produce a notification.
pub fn apply_pre_event(
    state: &mut DebounceState,
    config: &DebounceConfig,
    pre_failed: bool,
    now: Instant,
) -> Option<QualifiedState> {
    if state.frozen {
        return None;
    }
    match config {
        DebounceConfig::CounterBased(c) => apply_counter(state, c, pre_failed),
        DebounceConfig::TimeBased(t) => apply_time(state, t, pre_failed, now),
    }
}

/// Promote a time-based state whose run has lasted for the threshold.
///
/// This is the ticker's half of time-based debouncing. It only fires for an
/// unfrozen, still-unqualified state with an active run, so a concurrent
/// promotion by a reporting caller is never announced twice.
pub fn poll_time_qualification(
    state: &mut DebounceState,
    config: &DebounceConfig,
    now: Instant,
) -> Option<QualifiedState> {
    let DebounceConfig::TimeBased(t) = config else {
        return None;
    };
    if state.frozen || state.qualified.is_qualified() {
        return None;
    }
    let pre_failed = state.last_pre_failed?;
    let started = state.pre_started?;
    if now.saturating_duration_since(started) < t.threshold() {
        return None;
    }
    Some(qualify_run(state, pre_failed))
}

/// Instant at which [`poll_time_qualification`] will promote this state, if
/// a run is pending.
#[must_use]
pub fn time_deadline(state: &DebounceState, config: &DebounceConfig) -> Option<Instant> {
    let DebounceConfig::TimeBased(t) = config else {
        return None;
    };
    if state.frozen || state.qualified.is_qualified() || state.last_pre_failed.is_none() {
        return None;
    }
    state.pre_started.map(|started| started + t.threshold())
}

fn counter_verdict(counter: i64, c: &CounterBased) -> QualifiedState {
    if counter >= c.counter_max() {
        QualifiedState::QualifiedFailed
    } else if counter <= c.counter_min() {
        QualifiedState::QualifiedPassed
    } else {
        QualifiedState::Unqualified
    }
}

fn apply_counter(state: &mut DebounceState, c: &CounterBased, pre_failed: bool) -> Option<QualifiedState> {
    state.counter = if pre_failed {
        (state.counter + i64::from(c.failed_step)).min(c.counter_max())
    } else {
        (state.counter - i64::from(c.passed_step)).max(c.counter_min())
    };

    let verdict = counter_verdict(state.counter, c);
    if verdict.is_qualified() && verdict != state.qualified {
        state.qualified = verdict;
        return Some(verdict);
    }
    // An opposite-direction report pulled the counter off the threshold plateau.
    if state.qualified.is_qualified() && !verdict.is_qualified() {
        state.qualified = QualifiedState::Unqualified;
        return Some(QualifiedState::Unqualified);
    }
    None
}

fn apply_time(state: &mut DebounceState, t: &TimeBased, pre_failed: bool, now: Instant) -> Option<QualifiedState> {
    if state.last_pre_failed != Some(pre_failed) {
        state.last_pre_failed = Some(pre_failed);
        state.pre_started = Some(now);
        if state.qualified.is_qualified() {
            state.qualified = QualifiedState::Unqualified;
            return Some(QualifiedState::Unqualified);
        }
        return None;
    }

    // Same polarity: qualify right away if the caller's own report already
    // crosses the threshold, otherwise leave it to the ticker.
    if state.qualified.is_qualified() {
        return None;
    }
    let started = state.pre_started?;
    if now.saturating_duration_since(started) < t.threshold() {
        return None;
    }
    Some(qualify_run(state, pre_failed))
}

fn qualify_run(state: &mut DebounceState, pre_failed: bool) -> QualifiedState {
    let verdict = QualifiedState::for_polarity(pre_failed);
    state.qualified = verdict;
    state.pre_started = None;
    verdict
}
