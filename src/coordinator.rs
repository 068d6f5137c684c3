//! Binding between monitor verdicts and DTC status bytes.

use std::sync::Arc;

use crate::dtc::{DtcId, DtcRegistry, UdsStatus};
use crate::notifier::{notifier, QualifiedNotifier};
use crate::types::QualifiedState;

const NOT_COMPLETED: UdsStatus = UdsStatus::from_bits(
    UdsStatus::TEST_NOT_COMPLETED_SINCE_LAST_CLEAR.bits() | UdsStatus::TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE.bits(),
);

const FAILED: UdsStatus = UdsStatus::from_bits(
    UdsStatus::TEST_FAILED.bits()
        | UdsStatus::TEST_FAILED_THIS_OPERATION_CYCLE.bits()
        | UdsStatus::TEST_FAILED_SINCE_LAST_CLEAR.bits(),
);

/// Status byte that follows `current` after a qualified verdict, or `None`
/// if the verdict does not touch the DTC.
#[must_use]
pub fn next_dtc_status(current: UdsStatus, verdict: QualifiedState) -> Option<UdsStatus> {
    match verdict {
        QualifiedState::Unqualified => None,
        QualifiedState::QualifiedFailed => Some(current.update(FAILED, NOT_COMPLETED)),
        QualifiedState::QualifiedPassed => Some(current.update(UdsStatus::EMPTY, UdsStatus::TEST_FAILED | NOT_COMPLETED)),
    }
}

/// Notifier that mirrors a monitor's verdicts into the status of `dtc`.
///
/// Attach it with `register_monitor` or `set_qualified_notifier`. Registry
/// errors (an unregistered DTC, a poisoned lock) are logged and dropped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use diagqual::{coordinator, DebounceConfig, DebounceEngine, DtcId, DtcRegistry, UdsStatus};
///
/// let dtcs = Arc::new(DtcRegistry::new());
/// dtcs.register_dtc(DtcId(0x0104), None).unwrap();
///
/// let engine = DebounceEngine::default();
/// let binding = coordinator::dtc_binding(Arc::clone(&dtcs), DtcId(0x0104));
/// engine.register_monitor("maf", DebounceConfig::counter(1, 1, 1, 1), Some(binding)).unwrap();
///
/// engine.report_pre_event("maf", true).unwrap();
/// assert!(dtcs.current_status(DtcId(0x0104)).unwrap().contains(UdsStatus::TEST_FAILED));
/// ```
#[must_use]
pub fn dtc_binding(dtcs: Arc<DtcRegistry>, dtc: DtcId) -> QualifiedNotifier {
    notifier(move |monitor, verdict| {
        if verdict == QualifiedState::Unqualified {
            return;
        }
        if let Err(err) = dtcs.update_dtc_status(dtc, |current| next_dtc_status(current, verdict)) {
            tracing::warn!(%monitor, %dtc, error = %err, "failed to update dtc status");
        }
    })
}
