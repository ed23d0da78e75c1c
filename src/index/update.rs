//! Reconciling an index with the data directories
//!
//! Each level runs, depth-first:
//!
//! 1. load rows (database only)
//! 2. prune entries whose files are gone
//! 3. scan the data roots, re-extracting new and stale files
//! 4. recurse into subdirectories (flat files only)
//! 5. recompute the aggregate interval

use super::{Backend, Entry, Index, IndexResult};
use crate::storage::{EntryState, Interval};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

impl Index {
    /// Bring the index up to date with the data files on disk
    ///
    /// Files that a processor cannot read are logged and skipped; their
    /// previous entries are kept. Nothing is persisted until
    /// [`Index::write_out`].
    pub fn update(&mut self) -> IndexResult<()> {
        let changed = self.reconcile()?;
        tracing::debug!(
            "Updated index {:?} ({})",
            self.location(),
            if changed { "changed" } else { "unchanged" }
        );
        Ok(())
    }

    /// Reconcile this level and everything below it; returns whether anything changed
    fn reconcile(&mut self) -> IndexResult<bool> {
        self.load_rows()?;

        let mut changed = self.prune();
        let directories = self.scan(&mut changed);

        if self.is_database() {
            for name in &directories {
                tracing::info!("Not processing subdirectory {}: database indexes are not recursive", name);
            }
        } else {
            for name in directories {
                changed |= self.update_subdirectory(name)?;
            }
        }

        self.aggregate = self
            .entries
            .values()
            .filter(|entry| !entry.is_pending_deletion())
            .fold(Interval::default(), |aggregate, entry| aggregate.merged(&entry.interval));

        if changed || self.modified.is_none() {
            self.modified = Some(Utc::now());
            changed = true;
        }

        Ok(changed)
    }

    /// Merge database rows into memory
    ///
    /// Entries already in memory win, so a second update before write-out
    /// keeps what the first one extracted.
    fn load_rows(&mut self) -> IndexResult<()> {
        let Backend::Database(db) = &self.backend else {
            return Ok(());
        };

        db.ensure_schema()?;

        let count = db.count()?;
        tracing::info!("Index database {:?} has {} entries", db.path(), count);
        if count == 0 {
            return Ok(());
        }

        for record in db.load()? {
            self.entries
                .entry(record.path.clone())
                .or_insert_with(|| Entry::from_record(record));
        }

        Ok(())
    }

    /// Drop (flat file) or mark for deletion (database) entries that are gone from disk
    fn prune(&mut self) -> bool {
        let roots = self.data_dirs();
        let is_database = self.is_database();
        let mut changed = false;

        self.entries.retain(|path, entry| {
            if entry.is_pending_deletion() {
                return true;
            }

            let on_disk = Path::new(path);
            if on_disk.is_absolute() && on_disk.exists() {
                return true;
            }
            let is_real_dir = |root: &PathBuf| {
                std::fs::symlink_metadata(root.join(path)).is_ok_and(|metadata| metadata.is_dir())
            };
            if roots.iter().any(is_real_dir) {
                return true;
            }

            tracing::info!("Removing missing file {}", path);
            changed = true;

            if is_database {
                entry.state = EntryState::PendingDeletion;
                true
            } else {
                false
            }
        });

        changed
    }

    /// Scan the data directories of this level
    ///
    /// Returns the names of the subdirectories found.
    fn scan(&mut self, changed: &mut bool) -> BTreeSet<String> {
        let mut directories = BTreeSet::new();

        for dir in self.data_dirs() {
            let listing = match std::fs::read_dir(&dir) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!("Could not read directory {:?}: {}", dir, e);
                    continue;
                }
            };

            for dir_entry in listing {
                let path = match dir_entry {
                    Ok(dir_entry) => dir_entry.path(),
                    Err(e) => {
                        tracing::warn!("Could not read entry in {:?}: {}", dir, e);
                        continue;
                    }
                };

                let (Some(name), Some(key)) = (
                    path.file_name().and_then(|name| name.to_str()),
                    path.to_str(),
                ) else {
                    tracing::warn!("Skipping path that is not valid UTF-8: {:?}", path);
                    continue;
                };

                // Symlinks are never followed into directories
                let metadata = match std::fs::symlink_metadata(&path) {
                    Ok(metadata) if metadata.file_type().is_symlink() => {
                        match std::fs::metadata(&path) {
                            Ok(target) if target.is_dir() => {
                                tracing::debug!("Not following symlinked directory {}", key);
                                continue;
                            }
                            Ok(target) => target,
                            Err(e) => {
                                tracing::warn!("Could not stat symlink target of {}: {}", key, e);
                                continue;
                            }
                        }
                    }
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!("Could not stat {}: {}", key, e);
                        continue;
                    }
                };

                if metadata.is_dir() {
                    directories.insert(name.to_string());
                    continue;
                }

                if !self.context.config.matches(name) {
                    continue;
                }

                let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
                *changed |= self.process_file(&path, key.to_string(), modified);
            }
        }

        directories
    }

    /// Extract a file unless its entry is up to date; returns whether the entry changed
    fn process_file(&mut self, path: &Path, key: String, modified: Option<DateTime<Utc>>) -> bool {
        if let Some(entry) = self.entries.get(&key) {
            let unchanged = match (modified, entry.modified) {
                (Some(on_disk), Some(seen)) => on_disk <= seen,
                _ => false,
            };
            if unchanged && !entry.is_pending_deletion() {
                tracing::debug!("Unchanged {}", key);
                return false;
            }
        }

        tracing::info!("Processing {}", key);

        match self.context.processor.extract(path) {
            Ok(interval) => {
                let entry = self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(key));
                entry.interval = interval;
                entry.modified = modified;
                entry.state = EntryState::Active;
                tracing::debug!("idx + {} {}", entry.path, entry.interval);
                true
            }
            Err(e) => {
                tracing::warn!("Could not process {:?}: {}", path, e);
                false
            }
        }
    }

    /// Update the nested index for one subdirectory and refresh its entry
    fn update_subdirectory(&mut self, name: String) -> IndexResult<bool> {
        tracing::info!("Processing subdirectory {}", self.subdirectory.join(&name).display());

        let existing = self
            .entries
            .get_mut(&name)
            .and_then(|entry| entry.sub_index.take());

        let mut sub_index = match existing {
            Some(sub_index) => sub_index,
            None => {
                let subdirectory = self.subdirectory.join(&name);
                match Index::open_flat(self.context.clone(), subdirectory) {
                    Ok(mut child) => {
                        if let Some(seen) = self.entries.get(&name).and_then(|entry| entry.modified) {
                            child.modified = Some(seen);
                        }
                        Box::new(child)
                    }
                    Err(e) => {
                        tracing::warn!("Skipping subdirectory {}: {}", name, e);
                        return Ok(false);
                    }
                }
            }
        };

        let mut changed = sub_index.reconcile()?;

        let entry = self
            .entries
            .entry(name.clone())
            .or_insert_with(|| Entry::new(name));

        if entry.interval != sub_index.aggregate
            || entry.modified != sub_index.modified
            || entry.is_pending_deletion()
        {
            changed = true;
        }

        entry.interval = sub_index.aggregate;
        entry.modified = sub_index.modified;
        entry.state = EntryState::Active;
        entry.sub_index = Some(sub_index);

        Ok(changed)
    }

    /// Data directories holding this level, one per configured root
    fn data_dirs(&self) -> Vec<PathBuf> {
        self.context
            .config
            .paths
            .iter()
            .map(|root| root.join(&self.subdirectory))
            .collect()
    }
}
