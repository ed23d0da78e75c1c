//! Core data types shared by the index and its persistence backends
//!
//! - `Interval`: earliest/latest coverage of a file or subtree
//! - `EntryState`: whether an entry is live or waiting to be deleted
//! - `IndexRecord`: one persisted row, also the shape of query results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time coverage of a data file or of a whole subtree
///
/// Both sides start unset. An unset interval is distinct from any real one
/// and never overlaps a query range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Earliest covered timestamp
    pub earliest: Option<DateTime<Utc>>,
    /// Latest covered timestamp
    pub latest: Option<DateTime<Utc>>,
}

impl Interval {
    /// Create an interval from two bounds, ordering them if needed
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        Self {
            earliest: Some(a.min(b)),
            latest: Some(a.max(b)),
        }
    }

    /// An interval covering a single instant
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::new(time, time)
    }

    /// Check if both bounds are set
    pub fn is_set(&self) -> bool {
        self.earliest.is_some() && self.latest.is_some()
    }

    /// Widen this interval so it also covers `other`
    ///
    /// An unset side acts as the identity.
    pub fn union(&mut self, other: &Interval) {
        self.earliest = match (self.earliest, other.earliest) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.latest = match (self.latest, other.latest) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Builder-style union
    pub fn merged(mut self, other: &Interval) -> Self {
        self.union(other);
        self
    }

    /// Widen this interval to cover a single timestamp
    pub fn include(&mut self, time: DateTime<Utc>) {
        self.union(&Interval::at(time));
    }

    /// Check if this interval overlaps the inclusive range `[earliest, latest]`
    pub fn overlaps(&self, earliest: &DateTime<Utc>, latest: &DateTime<Utc>) -> bool {
        match (self.earliest, self.latest) {
            (Some(start), Some(end)) => !(end < *earliest || start > *latest),
            _ => false,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.earliest, self.latest) {
            (Some(start), Some(end)) => write!(f, "[{}, {}]", start.to_rfc3339(), end.to_rfc3339()),
            _ => write!(f, "[unset]"),
        }
    }
}

/// Lifecycle state of an index entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Present on disk, or not yet checked
    #[default]
    Active,
    /// Gone from disk; removed from durable storage at the next write-out
    PendingDeletion,
}

/// One persisted index row
///
/// File entries carry absolute paths. In the flat-file backend, subdirectory
/// entries carry the directory name relative to the index they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub path: String,
    pub interval: Interval,
    pub modified: Option<DateTime<Utc>>,
}

impl IndexRecord {
    pub fn new(path: impl Into<String>, interval: Interval, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            interval,
            modified,
        }
    }
}
