//! Line-oriented text logs
//!
//! Takes the first ISO-8601 style timestamp found on each line, e.g.
//!
//! ```text
//! 2024-01-15 08:30:00,123 INFO request served
//! [2024-01-15T08:30:01Z] worker started
//! ```

use super::{parse_timestamp, Processor, ProcessorError};
use crate::storage::Interval;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const TIMESTAMP_PATTERN: &str =
    r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d{1,9})?(?:Z|[+-]\d{2}:?\d{2})?";

/// Processor for plain-text logs with a timestamp per line
#[derive(Debug, Clone)]
pub struct LogLineProcessor {
    pattern: Regex,
}

impl LogLineProcessor {
    /// Create a processor using the default timestamp pattern
    pub fn new() -> Result<Self, ProcessorError> {
        Self::with_pattern(TIMESTAMP_PATTERN)
    }

    /// Create a processor with a custom pattern
    ///
    /// The whole match must be something [`parse_timestamp`] understands.
    pub fn with_pattern(pattern: &str) -> Result<Self, ProcessorError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    fn line_timestamp(&self, line: &[u8]) -> Option<chrono::DateTime<chrono::Utc>> {
        let found = self.pattern.find(line)?;
        let text = std::str::from_utf8(found.as_bytes()).ok()?;
        parse_timestamp(&text.replace(',', "."))
    }
}

impl Processor for LogLineProcessor {
    fn extract(&self, path: &Path) -> Result<Interval, ProcessorError> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut interval = Interval::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if let Some(time) = self.line_timestamp(&line) {
                interval.include(time);
            }
        }

        if interval.is_set() {
            Ok(interval)
        } else {
            Err(ProcessorError::NoTimestamps(path.to_path_buf()))
        }
    }
}
