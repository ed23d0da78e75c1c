//! CSV data files
//!
//! The timestamp column is detected from the header row (first header
//! containing "time", "date" or "timestamp"), falling back to the first
//! column. Rows whose cell does not parse are skipped.

use super::{parse_timestamp, Processor, ProcessorError};
use crate::storage::Interval;
use std::path::Path;

/// Processor for CSV files with a header row
#[derive(Debug, Clone, Default)]
pub struct CsvProcessor {
    /// Fixed column index, overriding header detection
    timestamp_column: Option<usize>,
    delimiter: Option<u8>,
}

impl CsvProcessor {
    /// Create a CSV processor with header-based column detection
    pub fn new() -> Self {
        Self::default()
    }

    /// Always read timestamps from this column (0-indexed)
    pub fn with_timestamp_column(mut self, column: usize) -> Self {
        self.timestamp_column = Some(column);
        self
    }

    /// Use a delimiter other than `,`
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Pick the timestamp column from a header row
    fn detect_column(headers: &csv::StringRecord) -> usize {
        headers
            .iter()
            .position(|header| {
                let header = header.to_lowercase();
                header.contains("time") || header.contains("date")
            })
            .unwrap_or(0)
    }
}

impl Processor for CsvProcessor {
    fn extract(&self, path: &Path) -> Result<Interval, ProcessorError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter.unwrap_or(b','))
            .from_path(path)?;

        let column = match self.timestamp_column {
            Some(column) => column,
            None => Self::detect_column(reader.headers()?),
        };

        let mut interval = Interval::default();
        let mut skipped = 0usize;

        for row in reader.records() {
            let row = row?;
            match row.get(column).and_then(parse_timestamp) {
                Some(time) => interval.include(time),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} rows without a timestamp in {:?}", skipped, path);
        }

        if interval.is_set() {
            Ok(interval)
        } else {
            Err(ProcessorError::NoTimestamps(path.to_path_buf()))
        }
    }
}
