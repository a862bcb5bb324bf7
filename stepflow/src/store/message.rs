//! Store message log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Severity of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message.
    Info,
    /// Something unexpected that did not stop the run.
    Warning,
    /// A step failed and the run was terminated.
    Error,
    /// Diagnostics, recorded only when diagnostics are enabled.
    Debug,
}

impl Severity {
    const fn bit(self) -> u8 {
        match self {
            Self::Info => 0b0001,
            Self::Warning => 0b0010,
            Self::Error => 0b0100,
            Self::Debug => 0b1000,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// A set of severities used to query the message log.
///
/// Severities combine with `|`: `Severity::Error | Severity::Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeverityFilter(u8);

impl SeverityFilter {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Matches every severity.
    pub const ALL: Self = Self(0b1111);

    /// Returns true if the filter matches the severity.
    #[must_use]
    pub const fn contains(self, severity: Severity) -> bool {
        self.0 & severity.bit() != 0
    }
}

impl From<Severity> for SeverityFilter {
    fn from(severity: Severity) -> Self {
        Self(severity.bit())
    }
}

impl BitOr for Severity {
    type Output = SeverityFilter;

    fn bitor(self, rhs: Self) -> SeverityFilter {
        SeverityFilter(self.bit() | rhs.bit())
    }
}

impl BitOr<Severity> for SeverityFilter {
    type Output = Self;

    fn bitor(self, rhs: Severity) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl BitOr for SeverityFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One entry in the store's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The message text.
    pub text: String,
    /// The message severity.
    pub severity: Severity,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a new message stamped with the current time.
    #[must_use]
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
            timestamp: Utc::now(),
        }
    }

    /// Creates an info message.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Info)
    }

    /// Creates a warning message.
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Warning)
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Error)
    }

    /// Creates a debug message.
    #[must_use]
    pub fn debug(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Debug)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}
