//! Severity levels and line classification.
//!
//! A log line carries a severity when it contains the delimited tag
//! `" - <LEVEL> - "`, e.g. `2024-11-28 10:00:00 - ERROR - disk full`.
//! Matching is a case-sensitive substring search, not anchored to the start
//! of the line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Log severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Conditions that require an operator right now
    Critical,
}

impl SeverityLevel {
    /// All levels, least severe first.
    pub const ALL: [Self; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Order in which levels appear in reports and charts.
    pub const REPORT_ORDER: [Self; 5] = [
        Self::Info,
        Self::Warning,
        Self::Debug,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the upper-case tag name of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns the delimited marker searched for in log lines.
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::Debug => " - DEBUG - ",
            Self::Info => " - INFO - ",
            Self::Warning => " - WARNING - ",
            Self::Error => " - ERROR - ",
            Self::Critical => " - CRITICAL - ",
        }
    }

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(&self, level: Self) -> bool {
        *self >= level
    }

    /// Index of this level inside [`SeverityLevel::ALL`].
    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(CoreError::UnknownLevel(s.to_string())),
        }
    }
}

/// Classifies a single log line.
///
/// The raw line is searched, so a record whose message is empty
/// (`"... - ERROR - \n"`) still matches. Returns `None` when the line
/// carries no recognised marker. If several markers are present the most
/// severe one wins, so a line is always counted once.
#[must_use]
pub fn classify(line: &str) -> Option<SeverityLevel> {
    SeverityLevel::ALL
        .iter()
        .rev()
        .find(|level| line.contains(level.marker()))
        .copied()
}
