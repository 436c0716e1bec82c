//! Folder change detection from per-file modification times.
//!
//! Each run lists the folder, diffs the result against the snapshot persisted
//! by the previous run and writes the fresh snapshot back.

use crate::config::Config;
use crate::persist::{self, PersistError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Filename → modification time (seconds since the Unix epoch).
pub type Snapshot = BTreeMap<String, f64>;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Files added (or modified) and removed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl ChangeSet {
    /// Diff `old` against `new`. A file whose timestamp moved counts as added.
    pub fn between(old: &Snapshot, new: &Snapshot) -> Self {
        let added = new
            .iter()
            .filter(|(name, mtime)| old.get(*name) != Some(*mtime))
            .map(|(name, _)| name.clone())
            .collect();
        let removed = old
            .keys()
            .filter(|name| !new.contains_key(*name))
            .cloned()
            .collect();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone)]
pub struct Detection {
    pub changed: bool,
    pub change_set: ChangeSet,
    /// Folder state observed during this pass; persisted by [`ChangeDetector::advance`].
    pub snapshot: Snapshot,
}

/// Tracks which files in a folder changed since the last recorded snapshot.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: Config,
}

impl ChangeDetector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Diff the folder against its persisted snapshot and persist the new one.
    ///
    /// The snapshot is rewritten even when nothing changed.
    pub fn detect_and_advance(&self, folder: &Path) -> Result<Detection, SnapshotError> {
        let detection = self.detect(folder)?;
        self.advance(folder, &detection)?;
        Ok(detection)
    }

    /// Diff the folder against its persisted snapshot without writing anything.
    pub fn detect(&self, folder: &Path) -> Result<Detection, SnapshotError> {
        let snapshot = scan(folder)?;
        let (change_set, first_run) = match self.load(folder)? {
            Some(old) => (ChangeSet::between(&old, &snapshot), false),
            None => (
                ChangeSet {
                    added: snapshot.keys().cloned().collect(),
                    removed: BTreeSet::new(),
                },
                true,
            ),
        };
        // A first run over an empty folder still counts as a change so the
        // caller records a baseline.
        let changed = first_run || !change_set.is_empty();

        tracing::debug!(
            folder = %folder.display(),
            files = snapshot.len(),
            added = change_set.added.len(),
            removed = change_set.removed.len(),
            changed,
            "change detection"
        );

        Ok(Detection {
            changed,
            change_set,
            snapshot,
        })
    }

    /// Persist the snapshot observed by `detection`.
    pub fn advance(&self, folder: &Path, detection: &Detection) -> Result<(), SnapshotError> {
        persist::write_json(&self.config.snapshot_path(folder), &detection.snapshot)?;
        Ok(())
    }

    /// Scan `folder` and persist its current state as the new baseline.
    pub fn record(&self, folder: &Path) -> Result<Snapshot, SnapshotError> {
        let snapshot = scan(folder)?;
        persist::write_json(&self.config.snapshot_path(folder), &snapshot)?;
        Ok(snapshot)
    }

    /// Previously persisted snapshot, if any.
    pub fn load(&self, folder: &Path) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(persist::read_json(&self.config.snapshot_path(folder))?)
    }
}

/// List the non-directory entries of `folder` with their modification times.
pub fn scan(folder: &Path) -> Result<Snapshot, SnapshotError> {
    let scan_err = |source| SnapshotError::Scan {
        path: folder.to_path_buf(),
        source,
    };

    let mut snapshot = Snapshot::new();
    for entry in std::fs::read_dir(folder).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|source| SnapshotError::Scan {
                path: path.clone(),
                source,
            })?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        snapshot.insert(entry.file_name().to_string_lossy().into_owned(), mtime);
    }
    Ok(snapshot)
}
