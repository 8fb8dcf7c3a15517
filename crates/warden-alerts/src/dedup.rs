//! Suppression of repeated alerts for the same critical line.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Default number of fingerprints remembered.
pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

/// Bounded memory of critical lines that have already been alerted.
///
/// A fingerprint covers the source path and the trimmed line text. When the
/// memory is full the oldest fingerprint is forgotten first.
#[derive(Debug, Clone)]
pub struct AlertDeduplicator {
    capacity: usize,
    seen: HashSet<u64>,
    order: VecDeque<u64>,
}

impl AlertDeduplicator {
    /// Creates a deduplicator remembering at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Computes the fingerprint of a line from a given file.
    #[must_use]
    pub fn fingerprint(source: &Path, line: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        line.trim().hash(&mut hasher);
        hasher.finish()
    }

    /// Returns true if the line has already been alerted.
    #[must_use]
    pub fn contains(&self, source: &Path, line: &str) -> bool {
        self.seen.contains(&Self::fingerprint(source, line))
    }

    /// Returns the lines that have not been alerted yet, in input order.
    #[must_use]
    pub fn unseen<'a, S: AsRef<str>>(&self, source: &Path, lines: &'a [S]) -> Vec<&'a str> {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| !self.contains(source, line))
            .collect()
    }

    /// Remembers lines as alerted.
    pub fn record<S: AsRef<str>>(&mut self, source: &Path, lines: &[S]) {
        for line in lines {
            let fp = Self::fingerprint(source, line.as_ref());
            if !self.seen.insert(fp) {
                continue;
            }
            self.order.push_back(fp);
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
    }

    /// Number of remembered fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maximum number of remembered fingerprints.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for AlertDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
