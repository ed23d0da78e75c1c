//! Content Processors
//!
//! A processor reads one data file and reports the time interval its records
//! cover. Processors are looked up by the `type` declared in a data source's
//! configuration:
//!
//! - `log`: line-oriented text with an ISO-8601 timestamp on each line
//! - `csv`: CSV with a header row and a timestamp column
//!
//! Extra processors can be registered before an index is opened; the
//! registry is not modified while an index is being updated.

mod csv_column;
mod log_lines;

pub use csv_column::CsvProcessor;
pub use log_lines::LogLineProcessor;

use crate::storage::Interval;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extracts the covered time interval from a data file
pub trait Processor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Interval, ProcessorError>;
}

impl<F> Processor for F
where
    F: Fn(&Path) -> Result<Interval, ProcessorError> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<Interval, ProcessorError> {
        self(path)
    }
}

/// Errors that can occur while extracting an interval
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("No timestamps found in {0:?}")]
    NoTimestamps(PathBuf),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Lookup from declared data type to processor
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in processors
    pub fn with_builtins() -> Result<Self, ProcessorError> {
        let mut registry = Self::new();
        registry.register("log", LogLineProcessor::new()?);
        registry.register("csv", CsvProcessor::new());
        Ok(registry)
    }

    /// Register a processor, replacing any previous one for the same type
    pub fn register(&mut self, data_type: impl Into<String>, processor: impl Processor + 'static) {
        self.processors.insert(data_type.into(), Arc::new(processor));
    }

    /// Get the processor for a data type
    pub fn get(&self, data_type: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(data_type).cloned()
    }

    /// Check if a data type has a processor
    pub fn contains(&self, data_type: &str) -> bool {
        self.processors.contains_key(data_type)
    }

    /// All registered data types, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// Parse a timestamp in one of the common textual forms
///
/// Tries RFC 3339, date-times with or without a numeric offset (UTC assumed
/// when absent), plain dates (midnight UTC) and finally Unix seconds.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let with_offset = [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
    ];
    for fmt in with_offset {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in naive {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    crate::storage::codec::decode(text.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();

        for text in [
            "2024-01-15T08:30:00Z",
            "2024-01-15T10:30:00+02:00",
            "2024-01-15T08:30:00+0000",
            "2024-01-15 08:30:00",
            "2024-01-15T08:30:00",
            "2024/01/15 08:30:00",
            "2024-01-15 08:30",
            "1705307400",
        ] {
            assert_eq!(parse_timestamp(text), Some(expected), "parsing {:?}", text);
        }

        assert_eq!(
            parse_timestamp("2024-01-15"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-01-15 08:30:00.250").map(|t| t.timestamp_subsec_millis()),
            Some(250)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ProcessorRegistry::with_builtins().unwrap();
        assert_eq!(registry.types(), vec!["csv", "log"]);
        assert!(registry.contains("log"));
        assert!(registry.get("pcap").is_none());
    }

    #[test]
    fn test_closure_processor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = ProcessorRegistry::new();
        registry.register("fixed", move |_path: &Path| -> Result<Interval, ProcessorError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Interval::at(DateTime::from_timestamp(42, 0).unwrap()))
        });

        let processor = registry.get("fixed").unwrap();
        let interval = processor.extract(Path::new("/nowhere")).unwrap();

        assert_eq!(interval.earliest, DateTime::from_timestamp(42, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
