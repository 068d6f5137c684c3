//! # diagqual - Fault Monitor Debouncing and Qualification
//!
//! diagqual turns raw, noisy test outcomes reported by fault monitors into
//! stable qualified verdicts, and tells an observer exactly when a verdict
//! changes.
//!
//! ## Core Concepts
//!
//! - **Monitor**: A named fault detector that reports pre-passed / pre-failed results
//! - **Debouncing**: Counter-based or time-based filtering of those reports
//! - **Qualified state**: `Unqualified`, `QualifiedFailed` or `QualifiedPassed`
//! - **Notifier**: Callback invoked outside all locks when the verdict changes
//! - **Ticker**: Background thread that qualifies time-based runs nobody reports on
//!
//! ## Usage
//!
//! ```rust
//! use diagqual::{notifier, DebounceConfig, DebounceEngine, QualifiedState};
//!
//! let engine = DebounceEngine::default();
//! let (notify, events) = notifier::channel();
//! engine.register_monitor("coolant_temp", DebounceConfig::counter(2, 2, 1, 1), Some(notify))?;
//!
//! engine.report_pre_event("coolant_temp", true)?;
//! engine.report_pre_event("coolant_temp", true)?;
//!
//! assert_eq!(engine.qualified_state("coolant_temp"), Some(QualifiedState::QualifiedFailed));
//! assert_eq!(events.drain().len(), 1);
//! # Ok::<(), diagqual::DiagError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types and debounce policy
pub mod debounce;
pub mod error;
pub mod types;

// Engine
pub mod engine;
pub mod notifier;
pub mod registry;

// Diagnostic manager surfaces
pub mod action;
pub mod coordinator;
pub mod dtc;
pub mod event_status;
pub mod operation_cycle;

pub use action::MonitorAction;
pub use debounce::{CounterBased, DebounceConfig, DebounceMode, DebounceState, TimeBased};
pub use dtc::{DtcId, DtcRegistry, DtcStatusNotifier, UdsStatus};
pub use engine::{DebounceEngine, EngineConfig, MonitorSnapshot};
pub use error::{ConfigError, DiagError, DiagResult};
pub use event_status::{EventStatusBit, EventStatusByte};
pub use notifier::{DispatchStats, QualificationEvent, QualificationStream, QualifiedNotifier};
pub use operation_cycle::{OperationCycleNotifier, OperationCycleRegistry};
pub use types::{MonitorId, QualifiedState};
