//! Database index backend - a single SQLite table for a whole data source
//!
//! ```text
//! timefind(begin_time, end_time, last_mod_time, filename PRIMARY KEY)
//! ```
//!
//! Timestamps are stored in their codec form and compared numerically with
//! `CAST(... AS REAL)`. Older databases declared the time columns `REAL`;
//! rows from those are read back as well.
//!
//! The table holds a flat set of files. Subdirectories are not indexed here.

use crate::storage::codec;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{EntryState, IndexRecord, Interval};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

/// SQLite-backed index for one data source
pub struct IndexDatabase {
    conn: Connection,
    path: PathBuf,
}

/// Raw column text before timestamp decoding
struct RawRow {
    filename: String,
    begin: String,
    end: String,
    modified: String,
}

impl IndexDatabase {
    /// Open (or create) the database file
    ///
    /// The schema is not touched here; see [`IndexDatabase::ensure_schema`].
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Create the index table if it does not exist
    pub fn ensure_schema(&self) -> StorageResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS timefind (
                begin_time TEXT,
                end_time TEXT,
                last_mod_time TEXT,
                filename TEXT PRIMARY KEY
            )",
            [],
        )?;
        Ok(())
    }

    /// Number of rows in the index table
    pub fn count(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT filename, begin_time, end_time, last_mod_time FROM timefind
            )",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Read every row
    pub fn load(&self) -> StorageResult<Vec<IndexRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT filename, begin_time, end_time, last_mod_time FROM timefind
             ORDER BY filename",
        )?;

        let rows = stmt.query_map([], raw_row)?;
        let records = rows
            .map(|row| decode_row(row?))
            .collect::<StorageResult<Vec<_>>>();
        records
    }

    /// Find all rows whose interval overlaps `[earliest, latest]`, bounds inclusive
    ///
    /// SQLite narrows the rows on `REAL` values with a little slack; the
    /// decoded intervals then decide exactly.
    pub fn find_overlapping(
        &self,
        earliest: &DateTime<Utc>,
        latest: &DateTime<Utc>,
    ) -> StorageResult<Vec<IndexRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT filename, begin_time, end_time, last_mod_time FROM timefind
             WHERE begin_time <> '' AND end_time <> ''
               AND CAST(begin_time AS REAL) <= ?1
               AND CAST(end_time AS REAL) >= ?2
             ORDER BY filename",
        )?;

        let upper = codec::as_real(latest);
        let lower = codec::as_real(earliest);

        let rows = stmt.query_map(
            params![upper + real_slack(upper), lower - real_slack(lower)],
            raw_row,
        )?;
        let records = rows
            .map(|row| decode_row(row?))
            .filter(|record| match record {
                Ok(record) => record.interval.overlaps(earliest, latest),
                Err(_) => true,
            })
            .collect::<StorageResult<Vec<_>>>();
        records
    }

    /// Apply the in-memory state in one transaction
    ///
    /// Rows pending deletion are deleted, all others are upserted. Nothing is
    /// committed unless every statement succeeds.
    pub fn write(
        &self,
        rows: impl IntoIterator<Item = (IndexRecord, EntryState)>,
    ) -> StorageResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO timefind (filename, begin_time, end_time, last_mod_time)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(filename) DO UPDATE SET
                     begin_time = excluded.begin_time,
                     end_time = excluded.end_time,
                     last_mod_time = excluded.last_mod_time",
            )?;
            let mut delete = tx.prepare_cached("DELETE FROM timefind WHERE filename = ?1")?;

            for (record, state) in rows {
                match state {
                    EntryState::PendingDeletion => {
                        delete.execute(params![record.path])?;
                    }
                    EntryState::Active => {
                        upsert.execute(params![
                            record.path,
                            codec::encode_opt(record.interval.earliest.as_ref()),
                            codec::encode_opt(record.interval.latest.as_ref()),
                            codec::encode_opt(record.modified.as_ref()),
                        ])?;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Margin covering `REAL` rounding of an encoded value near `value`
fn real_slack(value: f64) -> f64 {
    1.0 + value.abs() * f64::EPSILON * 4.0
}

fn column_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    })
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        filename: row.get(0)?,
        begin: column_text(row, 1)?,
        end: column_text(row, 2)?,
        modified: column_text(row, 3)?,
    })
}

fn decode_row(raw: RawRow) -> StorageResult<IndexRecord> {
    let decode = |text: &str| {
        codec::decode_opt(text.as_bytes())
            .map_err(|e| StorageError::Format(format!("row {:?}: {}", raw.filename, e)))
    };

    let interval = Interval {
        earliest: decode(&raw.begin)?,
        latest: decode(&raw.end)?,
    };
    let modified = decode(&raw.modified)?;

    Ok(IndexRecord::new(raw.filename.clone(), interval, modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn record(path: &str, start: i64, end: i64) -> IndexRecord {
        IndexRecord::new(path, Interval::new(ts(start), ts(end)), Some(ts(end + 1)))
    }

    fn open(dir: &Path) -> IndexDatabase {
        let db = IndexDatabase::open(&dir.join("index.db")).unwrap();
        db.ensure_schema().unwrap();
        db
    }

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        assert_eq!(db.count().unwrap(), 0);
        assert!(db.load().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_and_load() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());

        db.write(vec![
            (record("/data/a.log", 100, 200), EntryState::Active),
            (record("/data/b.log", 300, 400), EntryState::Active),
        ])
        .unwrap();
        assert_eq!(db.count().unwrap(), 2);

        // Conflicting key overwrites every value column
        db.write(vec![(record("/data/a.log", 150, 250), EntryState::Active)])
            .unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows, vec![record("/data/a.log", 150, 250), record("/data/b.log", 300, 400)]);
    }

    #[test]
    fn test_pending_deletion_removes_row() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());

        db.write(vec![
            (record("/data/a.log", 100, 200), EntryState::Active),
            (record("/data/b.log", 300, 400), EntryState::Active),
        ])
        .unwrap();

        db.write(vec![(record("/data/a.log", 100, 200), EntryState::PendingDeletion)])
            .unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "/data/b.log");
    }

    #[test]
    fn test_find_overlapping_inclusive() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());

        db.write(vec![
            (record("/data/a.log", 100, 200), EntryState::Active),
            (record("/data/b.log", 300, 400), EntryState::Active),
            (record("/data/c.log", 5, 10), EntryState::Active),
        ])
        .unwrap();

        let found = db.find_overlapping(&ts(150), &ts(350)).unwrap();
        let paths: Vec<_> = found.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/data/a.log", "/data/b.log"]);

        assert!(db.find_overlapping(&ts(250), &ts(280)).unwrap().is_empty());
        assert!(db.find_overlapping(&ts(0), &ts(4)).unwrap().is_empty());

        let found = db.find_overlapping(&ts(10), &ts(20)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/data/c.log");
    }

    #[test]
    fn test_find_overlapping_nanosecond_bounds() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());

        let at = |nanos| DateTime::from_timestamp(1_700_000_000, nanos).unwrap();
        db.write(vec![(
            IndexRecord::new("/data/a.log", Interval::new(at(0), at(1)), Some(at(5))),
            EntryState::Active,
        )])
        .unwrap();

        // Indistinguishable as REAL, distinct as timestamps
        assert!(db.find_overlapping(&at(2), &at(3)).unwrap().is_empty());
        assert_eq!(db.find_overlapping(&at(1), &at(3)).unwrap().len(), 1);

        let row = DateTime::from_timestamp(1_699_999_999, 999_999_999).unwrap();
        assert!(db.find_overlapping(&row, &row).unwrap().is_empty());
        assert_eq!(db.find_overlapping(&row, &at(0)).unwrap().len(), 1);
    }

    #[test]
    fn test_reads_legacy_real_columns() {
        let dir = tempdir().unwrap();
        let db = IndexDatabase::open(&dir.path().join("legacy.db")).unwrap();
        db.conn
            .execute_batch(
                "CREATE TABLE timefind (begin_time REAL, end_time REAL, last_mod_time REAL, filename TEXT PRIMARY KEY);
                 INSERT INTO timefind VALUES (100.5, 200, 300, '/data/old.log');",
            )
            .unwrap();
        db.ensure_schema().unwrap();

        let rows = db.load().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].interval.earliest,
            Some(DateTime::from_timestamp(100, 500_000_000).unwrap())
        );
        assert_eq!(rows[0].interval.latest, Some(ts(200)));

        assert_eq!(db.find_overlapping(&ts(150), &ts(160)).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_row_is_format_error() {
        let dir = tempdir().unwrap();
        let db = open(dir.path());
        db.conn
            .execute(
                "INSERT INTO timefind VALUES ('soon', '2.0', '3.0', '/data/x.log')",
                [],
            )
            .unwrap();

        assert!(matches!(db.load(), Err(StorageError::Format(_))));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();

        {
            let db = open(dir.path());
            db.write(vec![(record("/data/a.log", 1, 2), EntryState::Active)])
                .unwrap();
        }

        {
            let db = open(dir.path());
            assert_eq!(db.count().unwrap(), 1);
        }
    }
}
