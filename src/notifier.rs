//! Qualified-state notifiers and their delivery discipline.
//!
//! A notifier is any `Fn(&MonitorId, QualifiedState)` that is `Send + Sync`.
//! The engine never calls one while the registry lock is held: a transition
//! captures a [`Dispatch`] (notifier handle, id, verdict) under the lock, and
//! the [`Dispatcher`] delivers it once the lock has been released. Notifiers
//! may therefore call back into the engine, including to unregister their own
//! monitor.
//!
//! A panicking notifier is isolated: the panic is logged and counted, and the
//! caller (a reporting thread or the qualification ticker) carries on.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::error::{DiagError, DiagResult};
use crate::types::{MonitorId, QualifiedState};

/// Callback invoked with `(monitor id, new verdict)`.
pub type QualifiedNotifier = Arc<dyn Fn(&MonitorId, QualifiedState) + Send + Sync>;

/// Wrap a closure as a [`QualifiedNotifier`].
pub fn notifier<F>(f: F) -> QualifiedNotifier
where
    F: Fn(&MonitorId, QualifiedState) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Run a callback, containing any panic it raises.
///
/// Returns false if the callback panicked.
pub(crate) fn call_isolated(kind: &'static str, key: &dyn fmt::Display, f: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(kind, key = %key, %reason, "notifier panicked; notification dropped");
            false
        }
    }
}

/// A notification decided under the registry lock, awaiting delivery.
pub(crate) struct Dispatch {
    notifier: Option<QualifiedNotifier>,
    monitor_id: MonitorId,
    state: QualifiedState,
}

impl Dispatch {
    pub(crate) fn capture(monitor_id: &MonitorId, notifier: Option<&QualifiedNotifier>, state: QualifiedState) -> Self {
        Self {
            notifier: notifier.cloned(),
            monitor_id: monitor_id.clone(),
            state,
        }
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Notifier invocations that returned normally.
    pub delivered: u64,
    /// Notifier invocations that panicked.
    pub notifier_panics: u64,
}

/// Delivers captured notifications outside the registry lock.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    delivered: AtomicU64,
    panics: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn deliver(&self, dispatch: Dispatch) {
        let Dispatch {
            notifier,
            monitor_id,
            state,
        } = dispatch;
        let Some(notifier) = notifier else {
            return;
        };

        tracing::debug!(monitor = %monitor_id, %state, "delivering qualified notification");
        if call_isolated("monitor", &monitor_id, || notifier(&monitor_id, state)) {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn deliver_all(&self, dispatches: impl IntoIterator<Item = Dispatch>) {
        for dispatch in dispatches {
            self.deliver(dispatch);
        }
    }

    pub(crate) fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            notifier_panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// A qualified-state notification as seen by a channel observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationEvent {
    /// Monitor whose verdict was announced.
    pub monitor_id: MonitorId,
    /// Announced verdict.
    pub state: QualifiedState,
    /// Wall-clock time of delivery.
    pub at: DateTime<Utc>,
}

/// Receiving side of a channel-backed notifier.
#[derive(Debug)]
pub struct QualificationStream {
    rx: Receiver<QualificationEvent>,
}

impl QualificationStream {
    /// Receive the next event (blocking).
    ///
    /// # Errors
    ///
    /// Returns `DiagError::Disconnected` once every notifier handle feeding
    /// this stream has been dropped and the queue is empty.
    pub fn recv(&self) -> DiagResult<QualificationEvent> {
        self.rx.recv().map_err(|_| DiagError::Disconnected {
            path: "qualification_stream".to_string(),
        })
    }

    /// Receive the next event with a timeout.
    ///
    /// # Errors
    ///
    /// - `DiagError::Timeout` if nothing arrives within `timeout`.
    /// - `DiagError::Disconnected` once every notifier handle has been dropped
    ///   and the queue is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> DiagResult<QualificationEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => DiagError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => DiagError::Disconnected {
                path: "qualification_stream".to_string(),
            },
        })
    }

    /// Take the next event if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<QualificationEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event.
    #[must_use]
    pub fn drain(&self) -> Vec<QualificationEvent> {
        self.rx.try_iter().collect()
    }
}

/// Create a notifier that forwards every notification into a stream.
///
/// # Examples
///
/// ```
/// use diagqual::{notifier, MonitorId, QualifiedState};
///
/// let (notify, stream) = notifier::channel();
/// notify(&MonitorId::from("m"), QualifiedState::QualifiedFailed);
/// assert_eq!(stream.try_recv().unwrap().state, QualifiedState::QualifiedFailed);
/// ```
#[must_use]
pub fn channel() -> (QualifiedNotifier, QualificationStream) {
    let (tx, rx): (Sender<QualificationEvent>, _) = unbounded();
    let notify = notifier(move |id, state| {
        // A dropped stream only means nobody is listening any more.
        let _ = tx.send(QualificationEvent {
            monitor_id: id.clone(),
            state,
            at: Utc::now(),
        });
    });
    (notify, QualificationStream { rx })
}
