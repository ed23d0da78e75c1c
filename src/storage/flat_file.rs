//! Flat-file index backend
//!
//! One CSV file per indexed directory, one record per entry:
//!
//! ```text
//! path, earliest, latest, modified
//! ```
//!
//! Timestamps use the time codec; an unset timestamp is an empty field.
//! Files written before modification times were tracked have only three
//! fields and are still accepted.
//!
//! Writes go to a temporary file next to the target which then replaces it
//! with a rename, so a reader never sees a half-written index.

use crate::storage::codec;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{IndexRecord, Interval};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Contents of an index file as read from disk
#[derive(Debug, Default)]
pub struct FlatFileContents {
    pub records: Vec<IndexRecord>,
    /// Modification time of the index file itself
    pub modified: Option<DateTime<Utc>>,
}

/// A single per-directory index file
#[derive(Debug, Clone)]
pub struct FlatFile {
    path: PathBuf,
}

impl FlatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record from the index file
    ///
    /// Returns `None` if the file does not exist yet.
    pub fn read(&self) -> StorageResult<Option<FlatFileContents>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let modified = file
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(self.parse_record(&row)?);
        }

        Ok(Some(FlatFileContents { records, modified }))
    }

    fn parse_record(&self, row: &csv::StringRecord) -> StorageResult<IndexRecord> {
        if row.len() != 3 && row.len() != 4 {
            return Err(StorageError::Format(format!(
                "{}: expected 3 or 4 fields, found {}",
                self.path.display(),
                row.len()
            )));
        }

        let interval = Interval {
            earliest: codec::decode_opt(row[1].as_bytes())?,
            latest: codec::decode_opt(row[2].as_bytes())?,
        };

        let modified = match row.get(3) {
            Some(field) => codec::decode_opt(field.as_bytes())?,
            None => None,
        };

        Ok(IndexRecord::new(&row[0], interval, modified))
    }

    /// Replace the index file with the given records
    ///
    /// Missing parent directories are created first.
    pub fn write<'a>(&self, records: impl IntoIterator<Item = &'a IndexRecord>) -> StorageResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());

            for record in records {
                let earliest = codec::encode_opt(record.interval.earliest.as_ref());
                let latest = codec::encode_opt(record.interval.latest.as_ref());
                let modified = codec::encode_opt(record.modified.as_ref());

                writer.write_record([
                    record.path.as_str(),
                    earliest.as_str(),
                    latest.as_str(),
                    modified.as_str(),
                ])?;
            }

            writer.flush()?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        tracing::debug!("Wrote index file {:?}", self.path);
        Ok(())
    }
}
