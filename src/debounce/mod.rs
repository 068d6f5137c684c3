//! Debounce configuration and transition policy.
//!
//! Two disciplines are supported. Counter-based debouncing moves a clamped
//! signed counter per report and qualifies at either extreme. Time-based
//! debouncing qualifies once a continuous run of one polarity has lasted for
//! the configured duration.

/// Per-monitor debounce configuration.
pub mod config;
/// Pure state transition functions.
pub mod policy;

pub use config::{CounterBased, DebounceConfig, DebounceMode, TimeBased};
pub use policy::{apply_pre_event, poll_time_qualification, time_deadline, DebounceState};
