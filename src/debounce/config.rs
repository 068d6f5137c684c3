//! Per-monitor debounce configuration.
//!
//! A configuration is supplied wholesale at registration time and never changes
//! afterwards. The debounce mode is carried by the enum variant, so a monitor
//! cannot switch between counter- and time-based debouncing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Debouncing discipline of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Accumulate a signed counter per reported pre-event.
    CounterBased,
    /// Require a continuous run of same-polarity pre-events for a duration.
    TimeBased,
}

/// Counter-based debounce parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterBased {
    /// Counter value at which the monitor qualifies as failed.
    pub failed_threshold: u32,
    /// Magnitude of the negative counter value at which the monitor qualifies as passed.
    pub passed_threshold: u32,
    /// Increment per pre-failed report.
    pub failed_step: u32,
    /// Decrement per pre-passed report.
    pub passed_step: u32,
}

impl Default for CounterBased {
    fn default() -> Self {
        Self {
            failed_threshold: 3,
            passed_threshold: 3,
            failed_step: 1,
            passed_step: 1,
        }
    }
}

impl CounterBased {
    /// Lower clamp bound of the counter.
    #[must_use]
    pub fn counter_min(&self) -> i64 {
        -i64::from(self.passed_threshold)
    }

    /// Upper clamp bound of the counter.
    #[must_use]
    pub fn counter_max(&self) -> i64 {
        i64::from(self.failed_threshold)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("failed_threshold", self.failed_threshold),
            ("passed_threshold", self.passed_threshold),
            ("failed_step", self.failed_step),
            ("passed_step", self.passed_step),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        Ok(())
    }
}

/// Time-based debounce parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeBased {
    /// Continuous same-polarity duration required to qualify, in milliseconds.
    pub time_threshold_ms: u32,
}

impl Default for TimeBased {
    fn default() -> Self {
        Self {
            time_threshold_ms: 12_000,
        }
    }
}

impl TimeBased {
    /// Creates a time-based configuration with the given threshold.
    #[must_use]
    pub const fn from_millis(time_threshold_ms: u32) -> Self {
        Self { time_threshold_ms }
    }

    /// The qualification threshold as a `Duration`.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(u64::from(self.time_threshold_ms))
    }
}

/// Debounce configuration of a single monitor.
///
/// # Examples
///
/// ```
/// use diagqual::{DebounceConfig, DebounceMode};
///
/// let cfg = DebounceConfig::from_json(
///     r#"{"mode":"counter_based","failed_threshold":5,"failed_step":2}"#,
/// ).unwrap();
/// assert_eq!(cfg.mode(), DebounceMode::CounterBased);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DebounceConfig {
    /// Counter-based debouncing.
    CounterBased(CounterBased),
    /// Time-based debouncing.
    TimeBased(TimeBased),
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self::CounterBased(CounterBased::default())
    }
}

impl DebounceConfig {
    /// Counter-based configuration with explicit thresholds and steps.
    #[must_use]
    pub const fn counter(failed_threshold: u32, passed_threshold: u32, failed_step: u32, passed_step: u32) -> Self {
        Self::CounterBased(CounterBased {
            failed_threshold,
            passed_threshold,
            failed_step,
            passed_step,
        })
    }

    /// Time-based configuration with the given threshold in milliseconds.
    #[must_use]
    pub const fn time(time_threshold_ms: u32) -> Self {
        Self::TimeBased(TimeBased::from_millis(time_threshold_ms))
    }

    /// The debounce mode carried by this configuration.
    #[must_use]
    pub const fn mode(&self) -> DebounceMode {
        match self {
            Self::CounterBased(_) => DebounceMode::CounterBased,
            Self::TimeBased(_) => DebounceMode::TimeBased,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotPositive` if any threshold or step is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::CounterBased(c) => c.validate(),
            Self::TimeBased(t) if t.time_threshold_ms == 0 => Err(ConfigError::NotPositive {
                field: "time_threshold_ms",
            }),
            Self::TimeBased(_) => Ok(()),
        }
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// Missing fields take their defaults; the `mode` tag is required.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Malformed` for unparsable input, or the validation
    /// error for out-of-range values.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| ConfigError::Malformed {
            reason: format!("debounce config: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }
}
