//! Shared fixture for index tests
//!
//! Data files hold two Unix seconds, `"start end"`, which the `span`
//! processor turns into an interval. Every call is counted.

use super::Index;
use crate::config::Configuration;
use crate::processor::{ProcessorError, ProcessorRegistry};
use crate::storage::Interval;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

pub(crate) fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

pub(crate) struct Fixture {
    dir: TempDir,
    calls: Arc<AtomicUsize>,
    pub registry: ProcessorRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = ProcessorRegistry::new();
        registry.register(
            "span",
            move |path: &Path| -> Result<Interval, ProcessorError> {
                counter.fetch_add(1, Ordering::SeqCst);
                let content = std::fs::read_to_string(path)?;
                let mut bounds = content.split_whitespace().map(str::parse::<i64>);
                match (bounds.next(), bounds.next()) {
                    (Some(Ok(start)), Some(Ok(end))) => Ok(Interval::new(ts(start), ts(end))),
                    _ => Err(ProcessorError::Parse(format!("{:?}: expected a span", path))),
                }
            },
        );

        Self {
            dir,
            calls,
            registry,
        }
    }

    /// Scratch space outside the data and index directories
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("index.db")
    }

    /// Write a data file covering `[start, end]`; returns its absolute path
    pub fn write(&self, relative: &str, start: i64, end: i64) -> PathBuf {
        self.write_raw(relative, &format!("{} {}", start, end))
    }

    pub fn write_raw(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.data_dir().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Create a symlink at `relative` under the data directory
    #[cfg(unix)]
    pub fn symlink(&self, target: &Path, relative: &str) -> PathBuf {
        let link = self.data_dir().join(relative);
        std::os::unix::fs::symlink(target, &link).unwrap();
        link
    }

    /// Number of processor invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn flat_config(&self) -> Arc<Configuration> {
        Arc::new(
            Configuration::new("test", "span")
                .index_dir(self.index_dir())
                .path(self.data_dir())
                .include("*.log")
                .finalize()
                .unwrap(),
        )
    }

    pub fn db_config(&self) -> Arc<Configuration> {
        Arc::new(
            Configuration::new("test", "span")
                .index_db(self.db_path())
                .path(self.data_dir())
                .include("*.log")
                .finalize()
                .unwrap(),
        )
    }

    pub fn open_flat(&self) -> Index {
        Index::open(self.flat_config(), &self.registry).unwrap()
    }

    pub fn open_db(&self) -> Index {
        Index::open(self.db_config(), &self.registry).unwrap()
    }

    /// Move a file's modification time ten seconds past its current value
    pub fn touch_forward(path: &Path) {
        let metadata = std::fs::metadata(path).unwrap();
        let current = FileTime::from_last_modification_time(&metadata);
        let later = FileTime::from_unix_time(current.unix_seconds() + 10, current.nanoseconds());
        filetime::set_file_mtime(path, later).unwrap();
    }
}
