//! Event status bits exposed to applications.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::QualifiedState;

/// Single bit of an [`EventStatusByte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventStatusBit {
    /// The last qualified test result was failed.
    FailedAndTested = 0x01,
    /// The last qualified test result was passed.
    PassedAndTested = 0x02,
}

/// Bit set of [`EventStatusBit`]s.
///
/// # Examples
///
/// ```
/// use diagqual::{EventStatusBit, EventStatusByte};
///
/// let status = EventStatusByte::from_bits(&[EventStatusBit::FailedAndTested]);
/// assert!(status.is_failed_and_tested());
/// assert!(status.is_not_set(&[EventStatusBit::PassedAndTested]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventStatusByte(u8);

impl EventStatusByte {
    /// Wrap a raw status byte.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Combine a list of bits.
    #[must_use]
    pub fn from_bits(bits: &[EventStatusBit]) -> Self {
        Self(mask(bits))
    }

    /// Status implied by a qualified verdict.
    #[must_use]
    pub const fn from_qualified(state: QualifiedState) -> Self {
        match state {
            QualifiedState::Unqualified => Self(0),
            QualifiedState::QualifiedFailed => Self(EventStatusBit::FailedAndTested as u8),
            QualifiedState::QualifiedPassed => Self(EventStatusBit::PassedAndTested as u8),
        }
    }

    /// Raw byte value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True if all given bits are set.
    #[must_use]
    pub fn is_set(self, bits: &[EventStatusBit]) -> bool {
        let m = mask(bits);
        self.0 & m == m
    }

    /// True if none of the given bits are set.
    #[must_use]
    pub fn is_not_set(self, bits: &[EventStatusBit]) -> bool {
        self.0 & mask(bits) == 0
    }

    /// Shorthand for `is_set(&[FailedAndTested])`.
    #[must_use]
    pub fn is_failed_and_tested(self) -> bool {
        self.is_set(&[EventStatusBit::FailedAndTested])
    }

    /// Shorthand for `is_set(&[PassedAndTested])`.
    #[must_use]
    pub fn is_passed_and_tested(self) -> bool {
        self.is_set(&[EventStatusBit::PassedAndTested])
    }
}

impl fmt::Display for EventStatusByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

fn mask(bits: &[EventStatusBit]) -> u8 {
    bits.iter().fold(0, |acc, b| acc | *b as u8)
}
