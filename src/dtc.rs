//! DTC status registry.
//!
//! Stores a UDS status byte per diagnostic trouble code and announces changes
//! to an optional observer. A suppressed DTC still records reports but stays
//! silent.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DiagResult;
use crate::notifier::call_isolated;
use crate::registry::Registry;

/// Diagnostic trouble code number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DtcId(pub u32);

impl fmt::Display for DtcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

impl From<u32> for DtcId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// UDS DTC status byte (ISO 14229-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UdsStatus(u8);

impl UdsStatus {
    /// Most recent test result failed.
    pub const TEST_FAILED: Self = Self(0x01);
    /// Failed during the current operation cycle.
    pub const TEST_FAILED_THIS_OPERATION_CYCLE: Self = Self(0x02);
    /// Failed during the current or last operation cycle.
    pub const PENDING_DTC: Self = Self(0x04);
    /// Confirmed by the fault confirmation process.
    pub const CONFIRMED_DTC: Self = Self(0x08);
    /// Not completed since the last clear.
    pub const TEST_NOT_COMPLETED_SINCE_LAST_CLEAR: Self = Self(0x10);
    /// Failed at least once since the last clear.
    pub const TEST_FAILED_SINCE_LAST_CLEAR: Self = Self(0x20);
    /// Not completed during the current operation cycle.
    pub const TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE: Self = Self(0x40);
    /// Warning indicator requested.
    pub const WARNING_INDICATOR_REQUESTED: Self = Self(0x80);

    /// Status with no bit set.
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw status byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw status byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with the bits of `set` added and the bits of `clear` removed.
    #[must_use]
    pub const fn update(self, set: Self, clear: Self) -> Self {
        Self((self.0 | set.0) & !clear.0)
    }
}

impl BitOr for UdsStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for UdsStatus {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for UdsStatus {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for UdsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Callback invoked with `(dtc, old status, new status)`.
pub type DtcStatusNotifier = Arc<dyn Fn(DtcId, UdsStatus, UdsStatus) + Send + Sync>;

struct DtcEntry {
    status: Option<UdsStatus>,
    suppressed: bool,
    notifier: Option<DtcStatusNotifier>,
}

/// Registry of DTC status bytes.
#[derive(Debug)]
pub struct DtcRegistry {
    entries: Registry<DtcId, DtcEntry>,
}

impl Default for DtcRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DtcRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Registry::new("dtc"),
        }
    }

    /// Register a DTC with no status reported yet.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::AlreadyExists` if `dtc` is registered.
    pub fn register_dtc(&self, dtc: DtcId, notifier: Option<DtcStatusNotifier>) -> DiagResult<()> {
        self.entries.insert(
            dtc,
            DtcEntry {
                status: None,
                suppressed: false,
                notifier,
            },
        )?;
        tracing::debug!(%dtc, "dtc registered");
        Ok(())
    }

    /// Remove a DTC.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn unregister_dtc(&self, dtc: DtcId) -> DiagResult<()> {
        let removed = self.entries.remove(&dtc)?;
        drop(removed);
        tracing::debug!(%dtc, "dtc unregistered");
        Ok(())
    }

    /// Store a new status and notify if it differs from the previous one.
    ///
    /// The first report is always announced, with an empty previous status.
    /// Nothing is announced while the DTC is suppressed.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn report_dtc_status(&self, dtc: DtcId, status: UdsStatus) -> DiagResult<()> {
        self.update_dtc_status(dtc, |_| Some(status))
    }

    /// Derive the next status from the current one under the registry lock.
    ///
    /// `f` receives the stored status (empty before the first report) and
    /// returns the status to store, or `None` to leave the DTC untouched. It
    /// runs with the lock held and must not call back into the registry.
    /// Notification follows the rules of [`report_dtc_status`](Self::report_dtc_status).
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn update_dtc_status(&self, dtc: DtcId, f: impl FnOnce(UdsStatus) -> Option<UdsStatus>) -> DiagResult<()> {
        let pending = self.entries.mutate(&dtc, |entry| {
            let first = entry.status.is_none();
            let old = entry.status.unwrap_or(UdsStatus::EMPTY);
            let new = f(old)?;
            entry.status = Some(new);
            if (!first && old == new) || entry.suppressed {
                return None;
            }
            entry.notifier.clone().map(|n| (n, old, new))
        })?;

        if let Some((notifier, old, new)) = pending {
            tracing::debug!(%dtc, %old, %new, "dtc status changed");
            call_isolated("dtc", &dtc, || notifier(dtc, old, new));
        }
        Ok(())
    }

    /// Last reported status, or `None` if unregistered or never reported.
    #[must_use]
    pub fn current_status(&self, dtc: DtcId) -> Option<UdsStatus> {
        self.entries.get(&dtc, |entry| entry.status).ok().flatten().flatten()
    }

    /// Enable or disable suppression.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn set_dtc_suppression(&self, dtc: DtcId, suppressed: bool) -> DiagResult<()> {
        self.entries.mutate(&dtc, |entry| entry.suppressed = suppressed)?;
        tracing::debug!(%dtc, suppressed, "dtc suppression changed");
        Ok(())
    }

    /// Current suppression flag.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn dtc_suppression(&self, dtc: DtcId) -> DiagResult<bool> {
        self.entries.mutate(&dtc, |entry| entry.suppressed)
    }

    /// Attach, replace or remove the status notifier.
    ///
    /// # Errors
    ///
    /// Returns `DiagError::NotFound` if `dtc` is not registered.
    pub fn set_dtc_status_notifier(&self, dtc: DtcId, notifier: Option<DtcStatusNotifier>) -> DiagResult<()> {
        let previous = self
            .entries
            .mutate(&dtc, |entry| std::mem::replace(&mut entry.notifier, notifier))?;
        drop(previous);
        Ok(())
    }
}
