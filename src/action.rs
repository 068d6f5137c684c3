//! Monitor actions reported by applications and diagnostic control logic.
//!
//! [`MonitorAction`] is the command set a monitor front-end receives. Each
//! action maps onto one engine operation.

use serde::{Deserialize, Serialize};

use crate::engine::DebounceEngine;
use crate::error::DiagResult;
use crate::types::QualifiedState;

/// Action reported for a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MonitorAction {
    /// Qualified test result passed.
    Passed = 0x00,
    /// Qualified test result failed.
    Failed = 0x01,
    /// Unqualified test result pre-passed.
    Prepassed = 0x02,
    /// Unqualified test result pre-failed.
    Prefailed = 0x03,
    /// Trigger storage of extended data records and freeze frames.
    FdcThresholdReached = 0x04,
    /// Reset the test-failed verdict without other side effects.
    ResetTestFailed = 0x05,
    /// Freeze the internal debounce counter or timer.
    FreezeDebouncing = 0x06,
    /// Reset the internal debounce counter or timer.
    ResetDebouncing = 0x07,
}

impl MonitorAction {
    /// Decode an action from its numeric value.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0x00 => Self::Passed,
            0x01 => Self::Failed,
            0x02 => Self::Prepassed,
            0x03 => Self::Prefailed,
            0x04 => Self::FdcThresholdReached,
            0x05 => Self::ResetTestFailed,
            0x06 => Self::FreezeDebouncing,
            0x07 => Self::ResetDebouncing,
            _ => return None,
        })
    }

    /// True for the raw, unqualified results that go through debouncing.
    #[must_use]
    pub const fn is_pre_event(self) -> bool {
        matches!(self, Self::Prepassed | Self::Prefailed)
    }
}

impl DebounceEngine {
    /// Apply a monitor action.
    ///
    /// `Passed`/`Failed` bypass debouncing and force the verdict;
    /// `Prepassed`/`Prefailed` are reported as pre-events; the remaining
    /// actions invoke the matching control operation.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `id` is not registered.
    pub fn report_monitor_action(&self, id: impl AsRef<str>, action: MonitorAction) -> DiagResult<()> {
        let id = id.as_ref();
        tracing::trace!(monitor = id, ?action, "monitor action");
        match action {
            MonitorAction::Passed => self.set_qualified_state(id, QualifiedState::QualifiedPassed),
            MonitorAction::Failed => self.set_qualified_state(id, QualifiedState::QualifiedFailed),
            MonitorAction::Prepassed => self.report_pre_event(id, false),
            MonitorAction::Prefailed => self.report_pre_event(id, true),
            MonitorAction::FdcThresholdReached => self.trigger_fdc_threshold_reached(id),
            MonitorAction::ResetTestFailed => self.reset_test_failed(id),
            MonitorAction::FreezeDebouncing => self.freeze_debouncing(id),
            MonitorAction::ResetDebouncing => self.reset_debouncing(id),
        }
    }
}
