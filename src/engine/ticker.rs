//! Qualification ticker.
//!
//! A dedicated thread that promotes time-based monitors whose continuous run
//! has reached its threshold without further reports. It sleeps until the
//! earliest pending deadline, at most one interval, or until a wake message
//! arrives on its channel, and stops when the stop flag is set or the channel
//! is disconnected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::{DiagError, DiagResult};

use super::EngineShared;

/// Handle to a running ticker thread.
#[derive(Debug)]
pub(crate) struct Ticker {
    stop: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn(name: &str, interval: Duration, shared: Arc<EngineShared>) -> DiagResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        // One pending wake is enough: a scan covers every monitor.
        let (wake_tx, wake_rx) = bounded::<()>(1);

        let exited = Arc::new(AtomicBool::new(false));

        let thread_stop = Arc::clone(&stop);
        let thread_exited = Arc::clone(&exited);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                ticker_loop(&shared, interval, &thread_stop, &wake_rx);
                thread_exited.store(true, Ordering::Release);
            })
            .map_err(|e| DiagError::internal(format!("failed to spawn qualification ticker: {e}")))?;

        tracing::info!(
            thread = name,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "qualification ticker started"
        );
        Ok(Self {
            stop,
            exited,
            wake_tx,
            handle,
        })
    }

    /// False once the thread has left its loop.
    pub(crate) fn is_running(&self) -> bool {
        !self.exited.load(Ordering::Acquire)
    }

    /// Request an early scan. Never blocks.
    pub(crate) fn wake(&self) {
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::warn!("qualification ticker exited before wake");
            }
        }
    }

    /// Stop the thread and wait for it to exit.
    ///
    /// Called from the ticker thread itself (a notifier shutting the engine
    /// down), the thread is signalled but not joined; it exits after the
    /// current scan.
    pub(crate) fn shutdown(self) {
        let Self {
            stop, wake_tx, handle, ..
        } = self;
        stop.store(true, Ordering::Release);
        // Disconnecting the channel wakes a sleeping ticker immediately.
        drop(wake_tx);

        if handle.thread().id() == thread::current().id() {
            tracing::debug!("qualification ticker shut down from its own thread; not joining");
            return;
        }
        if handle.join().is_err() {
            tracing::error!("qualification ticker thread panicked");
        }
        tracing::info!("qualification ticker stopped");
    }
}

fn ticker_loop(shared: &EngineShared, interval: Duration, stop: &AtomicBool, wake_rx: &Receiver<()>) {
    let mut timeout = interval;
    loop {
        match wake_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if stop.load(Ordering::Acquire) {
            break;
        }

        match shared.promote_due(Instant::now()) {
            Ok(scan) => {
                if scan.promoted > 0 {
                    tracing::trace!(promoted = scan.promoted, "ticker scan promoted monitors");
                }
                timeout = scan
                    .next_due
                    .map_or(interval, |due| due.saturating_duration_since(Instant::now()).min(interval));
            }
            Err(err) => {
                tracing::error!(error = %err, "ticker scan failed; stopping qualification ticker");
                break;
            }
        }
    }
}
