//! Selection of the files worth reading.

use std::path::Path;

/// Default suffix of monitored files.
pub const DEFAULT_LOG_SUFFIX: &str = ".log";

/// Accepts paths whose file name ends with a fixed suffix.
///
/// Matching is case-sensitive and looks at the file name only, so a
/// directory called `archive.log/` does not make its children match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileFilter {
    suffix: String,
}

impl LogFileFilter {
    /// Creates a filter for the given suffix.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Returns the suffix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Returns true if the path should be processed.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.suffix))
    }
}

impl Default for LogFileFilter {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_SUFFIX)
    }
}
