//! Time-range lookup

use super::{Backend, Index, IndexResult};
use crate::storage::IndexRecord;
use chrono::{DateTime, Utc};

impl Index {
    /// Find every data file whose interval overlaps `[earliest, latest]`
    ///
    /// Both bounds are inclusive. Subdirectories are expanded into the
    /// matching files below them; directory entries are never returned.
    /// A database index is queried as persisted, so call
    /// [`Index::write_out`] first to see the effect of an update.
    pub fn find_logs(
        &self,
        earliest: &DateTime<Utc>,
        latest: &DateTime<Utc>,
    ) -> IndexResult<Vec<IndexRecord>> {
        match &self.backend {
            Backend::Database(db) => {
                db.ensure_schema()?;
                Ok(db.find_overlapping(earliest, latest)?)
            }
            Backend::FlatFile(_) => {
                let mut found = Vec::new();
                self.collect_overlapping(earliest, latest, &mut found);
                Ok(found)
            }
        }
    }

    fn collect_overlapping(
        &self,
        earliest: &DateTime<Utc>,
        latest: &DateTime<Utc>,
        found: &mut Vec<IndexRecord>,
    ) {
        for entry in self.entries.values() {
            if entry.is_pending_deletion() || !entry.interval.overlaps(earliest, latest) {
                continue;
            }

            match &entry.sub_index {
                Some(sub_index) => sub_index.collect_overlapping(earliest, latest, found),
                // Directory that could not be loaded
                None if entry.is_directory() => {
                    tracing::debug!("No index loaded for subdirectory {}", entry.path);
                }
                None => found.push(entry.record()),
            }
        }
    }
}
