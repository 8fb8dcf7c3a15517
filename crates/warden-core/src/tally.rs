//! Per-batch severity statistics.
//!
//! A [`LevelTally`] always holds a counter for every [`SeverityLevel`], even
//! when the count is zero. Lines without a marker never touch a counter.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::level::{SeverityLevel, classify};

/// Header line of a rendered report.
pub const REPORT_HEADER: &str = "Log Analysis Summary:";

/// Occurrence counts per severity level for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTally {
    counts: [u64; 5],
    unclassified: u64,
}

impl LevelTally {
    /// Creates an all-zero tally.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counts: [0; 5],
            unclassified: 0,
        }
    }

    /// Classifies every line and tallies the result.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tally = Self::new();
        for line in lines {
            tally.observe(line.as_ref());
        }
        tally
    }

    /// Classifies a line and counts it. Returns the level, if any.
    pub fn observe(&mut self, line: &str) -> Option<SeverityLevel> {
        let level = classify(line);
        match level {
            Some(level) => self.record(level),
            None => self.unclassified += 1,
        }
        level
    }

    /// Increments the counter for `level`.
    pub fn record(&mut self, level: SeverityLevel) {
        self.counts[level.index()] += 1;
    }

    /// Returns the count for a level.
    #[must_use]
    pub const fn get(&self, level: SeverityLevel) -> u64 {
        self.counts[level.index()]
    }

    /// Number of classified lines.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of lines that carried no recognised marker.
    #[must_use]
    pub const fn unclassified(&self) -> u64 {
        self.unclassified
    }

    /// Returns true when no line was classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Share of `level` in the classified total, in percent.
    ///
    /// Returns `0.0` when nothing was classified.
    #[must_use]
    pub fn percentage(&self, level: SeverityLevel) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(level) as f64 / total as f64 * 100.0
    }

    /// Iterates `(level, count)` pairs in report order.
    pub fn iter(&self) -> impl Iterator<Item = (SeverityLevel, u64)> + '_ {
        SeverityLevel::REPORT_ORDER
            .iter()
            .map(|level| (*level, self.get(*level)))
    }

    /// Renders the human-readable summary block.
    ///
    /// ```text
    /// Log Analysis Summary:
    /// - INFO: 1 occurrences (50.00%)
    /// - WARNING: 0 occurrences (0.00%)
    /// ...
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from(REPORT_HEADER);
        for (level, count) in self.iter() {
            let _ = write!(
                out,
                "\n- {level}: {count} occurrences ({:.2}%)",
                self.percentage(level)
            );
        }
        out
    }
}

/// Tallies a batch of lines.
#[must_use]
pub fn tally<I, S>(lines: I) -> LevelTally
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    LevelTally::from_lines(lines)
}
