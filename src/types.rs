//! Core identifier and verdict types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a registered monitor.
///
/// Opaque, comparable and hashable. No two monitors in one engine may share an
/// id.
///
/// # Examples
///
/// ```
/// use diagqual::MonitorId;
///
/// let id = MonitorId::from("coolant_temp_plausibility");
/// assert_eq!(id.as_str(), "coolant_temp_plausibility");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(String);

impl MonitorId {
    /// Creates a monitor id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MonitorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MonitorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&MonitorId> for MonitorId {
    fn from(id: &MonitorId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for MonitorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MonitorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Externally visible, debounced verdict of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifiedState {
    /// Not enough evidence has accumulated for a stable verdict.
    #[default]
    Unqualified,
    /// The monitor is qualified as failed.
    QualifiedFailed,
    /// The monitor is qualified as passed.
    QualifiedPassed,
}

impl QualifiedState {
    /// Returns true for either qualified verdict.
    #[must_use]
    pub const fn is_qualified(self) -> bool {
        !matches!(self, Self::Unqualified)
    }

    /// The verdict a continuous run of one polarity qualifies into.
    #[must_use]
    pub const fn for_polarity(pre_failed: bool) -> Self {
        if pre_failed {
            Self::QualifiedFailed
        } else {
            Self::QualifiedPassed
        }
    }
}

impl fmt::Display for QualifiedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unqualified => "unqualified",
            Self::QualifiedFailed => "qualified_failed",
            Self::QualifiedPassed => "qualified_passed",
        };
        f.write_str(s)
    }
}
