//! Debounce engine facade.
//!
//! [`DebounceEngine`] owns the monitor registry, the notification dispatcher
//! and the qualification ticker. Every operation locks the registry briefly,
//! applies a transition, releases the lock and only then invokes the monitor's
//! notifier.
//!
//! # Notification ordering
//!
//! Transitions of one monitor are decided in lock order, but notifications are
//! delivered after the lock is released. If an observer calls back into the
//! engine from inside a notification and that call causes another transition,
//! the second notification is delivered before the first callback returns.
//! Observers that need strict ordering should forward events into a queue (see
//! [`crate::notifier::channel`]) rather than re-enter synchronously.

/// Background promotion of time-based monitors.
mod ticker;

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::debounce::{
    apply_pre_event, poll_time_qualification, time_deadline, DebounceConfig, DebounceMode, DebounceState,
};
use crate::error::{ConfigError, DiagError, DiagResult};
use crate::notifier::{Dispatch, DispatchStats, Dispatcher, QualifiedNotifier};
use crate::registry::Registry;
use crate::types::{MonitorId, QualifiedState};

use ticker::Ticker;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest the qualification ticker sleeps between scans, in milliseconds.
    ///
    /// The ticker also wakes at the earliest pending run deadline, so this only
    /// bounds the latency of runs whose deadline it has not seen yet.
    pub tick_interval_ms: u64,
    /// Name given to the ticker thread.
    pub ticker_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            ticker_thread_name: "diagqual-ticker".to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick interval is zero or the thread name is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "tick_interval_ms",
            });
        }
        if self.ticker_thread_name.trim().is_empty() {
            return Err(ConfigError::OutOfRange {
                field: "ticker_thread_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The ticker period as a `Duration`.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Malformed` for unparsable input, or the validation
    /// error for out-of-range values.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| ConfigError::Malformed {
            reason: format!("engine config: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Registry entry for one monitor.
pub(crate) struct MonitorState {
    config: DebounceConfig,
    notifier: Option<QualifiedNotifier>,
    debounce: DebounceState,
}

impl fmt::Debug for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorState")
            .field("config", &self.config)
            .field("has_notifier", &self.notifier.is_some())
            .field("debounce", &self.debounce)
            .finish()
    }
}

/// Point-in-time copy of a monitor's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Monitor id.
    pub id: MonitorId,
    /// Configuration supplied at registration.
    pub config: DebounceConfig,
    /// Current verdict.
    pub qualified: QualifiedState,
    /// Counter value (counter-based monitors).
    pub counter: i64,
    /// True while reports are ignored.
    pub frozen: bool,
    /// Polarity of the current or last time-based run.
    pub last_pre_failed: Option<bool>,
    /// True while a time-based run is waiting to qualify.
    pub run_active: bool,
    /// True if a notifier is attached.
    pub has_notifier: bool,
}

impl MonitorSnapshot {
    /// Debounce mode of the monitor.
    #[must_use]
    pub const fn mode(&self) -> DebounceMode {
        self.config.mode()
    }
}

/// Result of one ticker scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    /// Monitors qualified by this scan.
    pub(crate) promoted: usize,
    /// Earliest deadline of the runs still pending.
    pub(crate) next_due: Option<Instant>,
}

/// State shared between the facade and the ticker thread.
#[derive(Debug)]
pub(crate) struct EngineShared {
    monitors: Registry<MonitorId, MonitorState>,
    dispatcher: Dispatcher,
}

impl EngineShared {
    /// Promote every time-based monitor whose run has reached its threshold.
    ///
    /// All promotions of one scan are decided under a single lock acquisition
    /// and delivered after it is released.
    pub(crate) fn promote_due(&self, now: Instant) -> DiagResult<ScanOutcome> {
        let mut next_due: Option<Instant> = None;
        let due = self.monitors.scan_mut(|id, m| {
            if let Some(verdict) = poll_time_qualification(&mut m.debounce, &m.config, now) {
                tracing::debug!(monitor = %id, %verdict, "time-based run qualified by ticker");
                return Some(Dispatch::capture(id, m.notifier.as_ref(), verdict));
            }
            if let Some(deadline) = time_deadline(&m.debounce, &m.config) {
                next_due = Some(next_due.map_or(deadline, |d| d.min(deadline)));
            }
            None
        })?;
        let promoted = due.len();
        self.dispatcher.deliver_all(due);
        Ok(ScanOutcome { promoted, next_due })
    }

    /// Apply `f` to one monitor under the lock and deliver the verdict it
    /// returns, if any, after the lock is released.
    fn transition(
        &self,
        id: &str,
        f: impl FnOnce(&mut MonitorState) -> Option<QualifiedState>,
    ) -> DiagResult<()> {
        let dispatch = self.monitors.mutate(id, |m| {
            f(&mut *m).map(|verdict| Dispatch::capture(&MonitorId::from(id), m.notifier.as_ref(), verdict))
        })?;
        if let Some(dispatch) = dispatch {
            self.dispatcher.deliver(dispatch);
        }
        Ok(())
    }
}

#[derive(Debug)]
enum TickerSlot {
    Idle,
    Running(Ticker),
    Stopped,
}

/// Fault-monitor debouncing and qualification engine.
///
/// # Examples
///
/// ```
/// use diagqual::{notifier, DebounceConfig, DebounceEngine, QualifiedState};
///
/// let engine = DebounceEngine::default();
/// let (notify, events) = notifier::channel();
/// engine
///     .register_monitor("oil_pressure", DebounceConfig::counter(3, 3, 1, 1), Some(notify))
///     .unwrap();
///
/// for _ in 0..3 {
///     engine.report_pre_event("oil_pressure", true).unwrap();
/// }
/// assert_eq!(engine.qualified_state("oil_pressure"), Some(QualifiedState::QualifiedFailed));
/// assert_eq!(events.drain().len(), 1);
/// engine.shutdown();
/// ```
#[derive(Debug)]
pub struct DebounceEngine {
    config: EngineConfig,
    shared: Arc<EngineShared>,
    ticker: Mutex<TickerSlot>,
}

impl Default for DebounceEngine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl DebounceEngine {
    /// Create an engine with the given configuration.
    ///
    /// The qualification ticker is not started until the first time-based
    /// monitor is registered.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Config` if the configuration is invalid.
    pub fn new(config: EngineConfig) -> DiagResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            config,
            shared: Arc::new(EngineShared {
                monitors: Registry::new("monitor"),
                dispatcher: Dispatcher::default(),
            }),
            ticker: Mutex::new(TickerSlot::Idle),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a monitor in the `Unqualified` state.
    ///
    /// Registering a time-based monitor starts the qualification ticker if it
    /// is not running yet, and wakes it otherwise.
    ///
    /// # Errors
    ///
    /// - `DiagError::Config` if `config` is invalid.
    /// - `DiagError::EngineStopped` for a time-based monitor after
    ///   [`shutdown`](Self::shutdown), whether or not `id` is registered.
    /// - `DiagError::AlreadyExists` if `id` is registered; the existing
    ///   registration is untouched.
    pub fn register_monitor(
        &self,
        id: impl Into<MonitorId>,
        config: DebounceConfig,
        notifier: Option<QualifiedNotifier>,
    ) -> DiagResult<()> {
        config.validate()?;
        // Refused before the insert, so a failed registration never touches the registry.
        if config.mode() == DebounceMode::TimeBased {
            self.ensure_ticker()?;
        }

        let id = id.into();
        let state = MonitorState {
            config,
            notifier,
            debounce: DebounceState::new(),
        };
        self.shared.monitors.insert(id.clone(), state)?;
        tracing::debug!(monitor = %id, mode = ?config.mode(), "monitor registered");
        Ok(())
    }

    /// Remove a monitor.
    ///
    /// A ticker scan in progress either sees the monitor before removal or not
    /// at all.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn unregister_monitor(&self, id: impl AsRef<str>) -> DiagResult<()> {
        let id = id.as_ref();
        let removed = self.shared.monitors.remove(id)?;
        drop(removed);
        tracing::debug!(monitor = id, "monitor unregistered");
        Ok(())
    }

    /// Report an unqualified test result: `pre_failed == true` for pre-failed,
    /// `false` for pre-passed.
    ///
    /// Reports to a frozen monitor are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn report_pre_event(&self, id: impl AsRef<str>, pre_failed: bool) -> DiagResult<()> {
        let id = id.as_ref();
        let mut run_started = false;
        self.shared.transition(id, |m| {
            if m.debounce.is_frozen() {
                tracing::trace!(monitor = id, pre_failed, "pre-event ignored: debouncing frozen");
                return None;
            }
            let before = m.debounce.pre_started();
            let verdict = apply_pre_event(&mut m.debounce, &m.config, pre_failed, Instant::now());
            run_started = m.debounce.pre_started().is_some() && m.debounce.pre_started() != before;
            let verdict = verdict?;
            tracing::debug!(monitor = id, pre_failed, %verdict, counter = m.debounce.counter(), "qualified state changed");
            Some(verdict)
        })?;

        // A new run may be due before the ticker's next scheduled scan.
        if run_started {
            self.wake_ticker();
        }
        Ok(())
    }

    /// Current verdict, or `None` if `id` is not registered.
    #[must_use]
    pub fn qualified_state(&self, id: impl AsRef<str>) -> Option<QualifiedState> {
        self.shared
            .monitors
            .get(id.as_ref(), |m| m.debounce.qualified())
            .ok()
            .flatten()
    }

    /// Force the verdict and notify, regardless of the debounce state.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn set_qualified_state(&self, id: impl AsRef<str>, state: QualifiedState) -> DiagResult<()> {
        let id = id.as_ref();
        self.shared.transition(id, |m| {
            m.debounce.force_qualified(state);
            tracing::debug!(monitor = id, %state, "qualified state set by control");
            Some(state)
        })
    }

    /// Ignore reported pre-events until the next [`reset_debouncing`](Self::reset_debouncing).
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn freeze_debouncing(&self, id: impl AsRef<str>) -> DiagResult<()> {
        let id = id.as_ref();
        self.shared.monitors.mutate(id, |m| m.debounce.freeze())?;
        tracing::debug!(monitor = id, "debouncing frozen");
        Ok(())
    }

    /// Clear counter, run markers and the frozen flag, force `Unqualified`
    /// and notify.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn reset_debouncing(&self, id: impl AsRef<str>) -> DiagResult<()> {
        let id = id.as_ref();
        self.shared.transition(id, |m| {
            m.debounce.reset();
            tracing::debug!(monitor = id, "debouncing reset");
            Some(QualifiedState::Unqualified)
        })
    }

    /// Re-announce the current verdict without changing any state.
    ///
    /// Used to signal that the fault detection counter crossed the capture
    /// threshold for extended data records or freeze frames.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn trigger_fdc_threshold_reached(&self, id: impl AsRef<str>) -> DiagResult<()> {
        self.shared.transition(id.as_ref(), |m| Some(m.debounce.qualified()))
    }

    /// Force `Unqualified` and notify, leaving counters and timers untouched.
    ///
    /// A counter still sitting on a threshold re-qualifies on the next report
    /// in the same direction.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn reset_test_failed(&self, id: impl AsRef<str>) -> DiagResult<()> {
        let id = id.as_ref();
        self.shared.transition(id, |m| {
            m.debounce.force_qualified(QualifiedState::Unqualified);
            tracing::debug!(monitor = id, "test failed reset");
            Some(QualifiedState::Unqualified)
        })
    }

    /// Attach, replace or remove the notifier of a monitor.
    ///
    /// The previous notifier is dropped outside the registry lock.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn set_qualified_notifier(&self, id: impl AsRef<str>, notifier: Option<QualifiedNotifier>) -> DiagResult<()> {
        let previous = self
            .shared
            .monitors
            .mutate(id.as_ref(), |m| std::mem::replace(&mut m.notifier, notifier))?;
        drop(previous);
        Ok(())
    }

    /// Copy of a monitor's state, or `None` if `id` is not registered.
    #[must_use]
    pub fn monitor_snapshot(&self, id: impl AsRef<str>) -> Option<MonitorSnapshot> {
        let id = id.as_ref();
        self.shared
            .monitors
            .get(id, |m| MonitorSnapshot {
                id: MonitorId::from(id),
                config: m.config,
                qualified: m.debounce.qualified(),
                counter: m.debounce.counter(),
                frozen: m.debounce.is_frozen(),
                last_pre_failed: m.debounce.last_pre_failed(),
                run_active: m.debounce.run_active(),
                has_notifier: m.notifier.is_some(),
            })
            .ok()
            .flatten()
    }

    /// Ids of all registered monitors, sorted.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the registry lock is poisoned.
    pub fn monitor_ids(&self) -> DiagResult<Vec<MonitorId>> {
        let mut ids = self.shared.monitors.keys()?;
        ids.sort();
        Ok(ids)
    }

    /// Number of registered monitors.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Internal` if the registry lock is poisoned.
    pub fn monitor_count(&self) -> DiagResult<usize> {
        self.shared.monitors.len()
    }

    /// Event memory overflow status. Always unknown in a standalone
    /// deployment without event memory.
    #[must_use]
    pub const fn event_memory_overflow(&self) -> Option<bool> {
        None
    }

    /// Register for event memory overflow changes.
    ///
    /// # Errors
    ///
    /// Always returns `DiagError::NotSupported`: there is no event memory
    /// backend in a standalone deployment.
    pub fn set_event_memory_overflow_notifier<F>(&self, _notifier: F) -> DiagResult<()>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        Err(DiagError::NotSupported {
            operation: "set_event_memory_overflow_notifier",
        })
    }

    /// Notification delivery counters.
    #[must_use]
    pub fn dispatcher_stats(&self) -> DispatchStats {
        self.shared.dispatcher.stats()
    }

    /// True while the qualification ticker thread is running.
    ///
    /// False once the thread has exited, including after a failed scan.
    #[must_use]
    pub fn is_ticker_running(&self) -> bool {
        self.ticker
            .lock()
            .map(|slot| matches!(&*slot, TickerSlot::Running(ticker) if ticker.is_running()))
            .unwrap_or(false)
    }

    fn wake_ticker(&self) {
        if let Ok(slot) = self.ticker.lock() {
            if let TickerSlot::Running(ticker) = &*slot {
                ticker.wake();
            }
        }
    }

    /// Start the ticker if needed, then wake it.
    fn ensure_ticker(&self) -> DiagResult<()> {
        let mut slot = self
            .ticker
            .lock()
            .map_err(|_| DiagError::internal("poisoned lock: engine.ticker"))?;
        if let TickerSlot::Running(ticker) = &*slot {
            ticker.wake();
            return Ok(());
        }
        if matches!(*slot, TickerSlot::Stopped) {
            return Err(DiagError::EngineStopped);
        }

        let ticker = Ticker::spawn(
            &self.config.ticker_thread_name,
            self.config.tick_interval(),
            Arc::clone(&self.shared),
        )?;
        ticker.wake();
        *slot = TickerSlot::Running(ticker);
        Ok(())
    }

    /// Stop the qualification ticker and wait for its thread to exit.
    ///
    /// Idempotent. Monitors stay registered and all operations keep working,
    /// but time-based monitors are only qualified by their own reports from
    /// now on, and new time-based registrations are refused.
    pub fn shutdown(&self) {
        let previous = match self.ticker.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, TickerSlot::Stopped),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), TickerSlot::Stopped),
        };
        // The slot lock is released here, so a notifier on the ticker thread
        // that touches the engine cannot deadlock the join below.
        if let TickerSlot::Running(ticker) = previous {
            ticker.shutdown();
        }
    }
}

impl Drop for DebounceEngine {
    fn drop(&mut self) {
        // Deterministic teardown: the ticker thread is joined, never detached.
        self.shutdown();
    }
}
