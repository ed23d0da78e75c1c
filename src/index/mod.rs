//! Timefind Index
//!
//! An [`Index`] maps every data file of one directory level to the time
//! interval it covers. Subdirectories appear as entries owning a nested
//! `Index`, so a flat-file index is a tree mirroring the data directories:
//!
//! ```text
//! Index ("")                      aggregate [t0, t9]
//!  ├── /data/a.log     [t0, t2]
//!  ├── /data/b.log     [t3, t5]
//!  └── 2024-01  ──►  Index ("2024-01")   aggregate [t6, t9]
//!                      └── /data/2024-01/c.log  [t6, t9]
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Index::open   read persisted state (whole tree for flat files)
//!      ↓
//! update        reconcile with the data directories and processors
//!      ↓
//! write_out     persist (atomic file replace / one transaction)
//!
//! find_logs     query any opened index
//! ```
//!
//! The database backend keeps one flat table for the whole data source and
//! does not descend into subdirectories.

mod error;
mod query;
mod update;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{IndexError, IndexResult};

use crate::config::{ConfigError, Configuration, StorageKind};
use crate::processor::{Processor, ProcessorRegistry};
use crate::storage::{EntryState, FlatFile, IndexDatabase, IndexRecord, Interval};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// State shared read-only by every node of one index tree
pub(crate) struct IndexContext {
    pub(crate) config: Arc<Configuration>,
    pub(crate) processor: Arc<dyn Processor>,
}

/// Durable home of one index node
enum Backend {
    FlatFile(FlatFile),
    Database(IndexDatabase),
}

/// One indexed file or subdirectory
#[derive(Debug)]
pub struct Entry {
    path: String,
    interval: Interval,
    modified: Option<DateTime<Utc>>,
    state: EntryState,
    sub_index: Option<Box<Index>>,
}

impl Entry {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval: Interval::default(),
            modified: None,
            state: EntryState::Active,
            sub_index: None,
        }
    }

    fn from_record(record: IndexRecord) -> Self {
        Self {
            path: record.path,
            interval: record.interval,
            modified: record.modified,
            state: EntryState::Active,
            sub_index: None,
        }
    }

    /// Absolute path of a file, or directory name of a subdirectory
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Modification time seen when the entry was last indexed
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_pending_deletion(&self) -> bool {
        self.state == EntryState::PendingDeletion
    }

    /// Subdirectory entries are stored by name rather than absolute path
    pub fn is_directory(&self) -> bool {
        !Path::new(&self.path).is_absolute()
    }

    /// The nested index of a subdirectory, once it has been loaded
    pub fn sub_index(&self) -> Option<&Index> {
        self.sub_index.as_deref()
    }

    pub fn record(&self) -> IndexRecord {
        IndexRecord::new(self.path.clone(), self.interval, self.modified)
    }
}

/// Statistics about an index tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of live file entries
    pub files: usize,
    /// Number of subdirectory entries
    pub directories: usize,
    /// Number of entries waiting to be deleted from the database
    pub pending_deletion: usize,
    /// Interval covered by the whole tree
    pub aggregate: Interval,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files, {} directories, {} pending deletion, covering {}",
            self.files, self.directories, self.pending_deletion, self.aggregate
        )
    }
}

/// Index of one directory level of a data source
pub struct Index {
    /// Path of this node relative to the data roots
    subdirectory: PathBuf,
    entries: BTreeMap<String, Entry>,
    aggregate: Interval,
    modified: Option<DateTime<Utc>>,
    backend: Backend,
    context: Arc<IndexContext>,
}

impl Index {
    /// Open the index for a data source
    ///
    /// For flat files the whole tree of index files is read now. For a
    /// database only the connection is opened; rows are loaded by
    /// [`Index::update`].
    pub fn open(config: Arc<Configuration>, registry: &ProcessorRegistry) -> IndexResult<Self> {
        config.validate()?;

        // No point reading anything without a way to process the data
        let processor = registry
            .get(&config.data_type)
            .ok_or_else(|| IndexError::UnknownProcessor(config.data_type.clone()))?;

        let context = Arc::new(IndexContext { config, processor });

        match context.config.storage()? {
            StorageKind::FlatFile(_) => Self::open_flat(context.clone(), PathBuf::new()),
            StorageKind::Database(path) => {
                let db = IndexDatabase::open(path)?;
                tracing::debug!("Opened index database {:?}", db.path());
                Ok(Self {
                    subdirectory: PathBuf::new(),
                    entries: BTreeMap::new(),
                    aggregate: Interval::default(),
                    modified: None,
                    backend: Backend::Database(db),
                    context: context.clone(),
                })
            }
        }
    }

    /// Read the flat-file index for `subdirectory` and everything below it
    pub(crate) fn open_flat(context: Arc<IndexContext>, subdirectory: PathBuf) -> IndexResult<Self> {
        let index_dir = context
            .config
            .index_dir
            .clone()
            .ok_or_else(|| ConfigError::MissingStorage(context.config.name.clone()))?;

        let file = FlatFile::new(
            index_dir
                .join(&subdirectory)
                .join(format!("{}.csv", context.config.name)),
        );

        let mut index = Self {
            subdirectory,
            entries: BTreeMap::new(),
            aggregate: Interval::default(),
            modified: None,
            backend: Backend::FlatFile(file.clone()),
            context,
        };

        // Not written yet; update() will fill it in
        let Some(contents) = file.read()? else {
            return Ok(index);
        };

        index.modified = contents.modified;

        for record in contents.records {
            index.aggregate.union(&record.interval);

            let mut entry = Entry::from_record(record);
            if entry.is_directory() {
                entry.sub_index = index.open_child(&index_dir, &entry);
            }

            tracing::trace!("idx - {} {}", entry.path, entry.interval);
            index.entries.insert(entry.path.clone(), entry);
        }

        Ok(index)
    }

    /// Load the nested index recorded by a subdirectory entry, if it exists on disk
    fn open_child(&self, index_dir: &Path, entry: &Entry) -> Option<Box<Index>> {
        let subdirectory = self.subdirectory.join(&entry.path);
        if !index_dir.join(&subdirectory).is_dir() {
            return None;
        }

        match Self::open_flat(self.context.clone(), subdirectory.clone()) {
            Ok(mut child) => {
                // The parent's record is the authoritative modification time
                if entry.modified.is_some() {
                    child.modified = entry.modified;
                }
                Some(Box::new(child))
            }
            Err(e) => {
                tracing::warn!("Could not read index from subdirectory {:?}: {}", subdirectory, e);
                None
            }
        }
    }

    /// Persist this index (and for flat files, every nested index)
    ///
    /// The in-memory tree is left untouched.
    pub fn write_out(&self) -> IndexResult<()> {
        match &self.backend {
            Backend::FlatFile(file) => {
                let records: Vec<IndexRecord> = self
                    .entries
                    .values()
                    .filter(|entry| !entry.is_pending_deletion())
                    .map(Entry::record)
                    .collect();
                file.write(&records)?;

                for entry in self.entries.values() {
                    if let Some(sub_index) = &entry.sub_index {
                        sub_index.write_out()?;
                    }
                }
            }
            Backend::Database(db) => {
                db.ensure_schema()?;
                db.write(
                    self.entries
                        .values()
                        .map(|entry| (entry.record(), entry.state)),
                )?;
            }
        }

        tracing::debug!("Wrote index {:?}", self.location());
        Ok(())
    }

    /// Index file or database this node is stored in
    pub fn location(&self) -> &Path {
        match &self.backend {
            Backend::FlatFile(file) => file.path(),
            Backend::Database(db) => db.path(),
        }
    }

    /// Path of this node relative to the data roots
    pub fn subdirectory(&self) -> &Path {
        &self.subdirectory
    }

    /// Union of the intervals of all live entries
    pub fn aggregate(&self) -> &Interval {
        &self.aggregate
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn config(&self) -> &Configuration {
        &self.context.config
    }

    pub fn is_database(&self) -> bool {
        matches!(self.backend, Backend::Database(_))
    }

    /// Entries of this level in path order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries across the whole tree
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            aggregate: self.aggregate,
            ..IndexStats::default()
        };
        self.collect_stats(&mut stats);
        stats
    }

    fn collect_stats(&self, stats: &mut IndexStats) {
        for entry in self.entries.values() {
            if entry.is_pending_deletion() {
                stats.pending_deletion += 1;
            } else if entry.is_directory() {
                stats.directories += 1;
            } else {
                stats.files += 1;
            }

            if let Some(sub_index) = &entry.sub_index {
                sub_index.collect_stats(stats);
            }
        }
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("location", &self.location())
            .field("subdirectory", &self.subdirectory)
            .field("entries", &self.entries)
            .field("aggregate", &self.aggregate)
            .field("modified", &self.modified)
            .finish()
    }
}
