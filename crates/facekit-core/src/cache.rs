//! Persisted name → encoding cache for a folder of reference images.
//!
//! The first run encodes every reference image. Later runs only re-encode files
//! the [`ChangeDetector`] reports as added or modified and drop entries for
//! removed files, so unchanged references are never encoded twice.

use crate::analyzer::{self, AnalyzerError, FaceAnalyzer};
use crate::config::{identity_name, Config};
use crate::persist::{self, PersistError};
use crate::snapshot::{ChangeDetector, ChangeSet, SnapshotError};
use crate::types::{Encoding, KnownFaces};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to list {path}: {source}")]
    ListFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error("no face detected in reference image {0}")]
    NoFaceInReference(String),
    #[error("no cached encoding named '{0}' to remove")]
    MissingEntry(String),
    #[error("encoding '{name}' has {actual} values, expected {expected}")]
    MalformedEncoding {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Paths of the two files persisted for a known folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub snapshot: PathBuf,
    pub encodings: PathBuf,
}

/// Incrementally maintained encodings for one or more known folders.
pub struct EncodingCache<A> {
    analyzer: A,
    detector: ChangeDetector,
    config: Config,
}

impl<A: FaceAnalyzer> EncodingCache<A> {
    pub fn new(analyzer: A, config: Config) -> Self {
        Self {
            analyzer,
            detector: ChangeDetector::new(config.clone()),
            config,
        }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut A {
        &mut self.analyzer
    }

    pub fn state_paths(&self, known_folder: &Path) -> StatePaths {
        StatePaths {
            snapshot: self.config.snapshot_path(known_folder),
            encodings: self.config.encodings_path(known_folder),
        }
    }

    /// Return the up-to-date encodings for `known_folder`.
    ///
    /// Builds the cache from scratch when no cache file exists, otherwise
    /// applies the folder's change set to the persisted mapping. The snapshot
    /// is advanced only after the patched cache has been written.
    pub fn get_current(&mut self, known_folder: &Path) -> Result<KnownFaces, CacheError> {
        let Some(mut known) = self.load(known_folder)? else {
            return self.bootstrap(known_folder);
        };

        let detection = self.detector.detect(known_folder)?;
        if !detection.changed {
            tracing::info!(folder = %known_folder.display(), entries = known.len(), "reference folder unchanged");
            self.detector.advance(known_folder, &detection)?;
            return Ok(known);
        }

        self.apply(known_folder, &detection.change_set, &mut known)?;
        persist::write_json(&self.config.encodings_path(known_folder), &known)?;
        self.detector.advance(known_folder, &detection)?;

        tracing::info!(
            folder = %known_folder.display(),
            added = detection.change_set.added.len(),
            removed = detection.change_set.removed.len(),
            entries = known.len(),
            "encoding cache updated"
        );
        Ok(known)
    }

    /// Read the persisted encodings without consulting the folder.
    ///
    /// Returns `None` when the cache has never been built.
    pub fn load(&self, known_folder: &Path) -> Result<Option<KnownFaces>, CacheError> {
        load_known(&self.config, known_folder)
    }

    /// Encode every compatible file in `known_folder` and record the baseline snapshot.
    fn bootstrap(&mut self, known_folder: &Path) -> Result<KnownFaces, CacheError> {
        tracing::info!(folder = %known_folder.display(), "building encoding cache");

        let list_err = |source| CacheError::ListFolder {
            path: known_folder.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(known_folder).map_err(list_err)? {
            let path = entry.map_err(list_err)?.path();
            if path.is_dir() {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.config.is_compatible(&file_name) {
                files.push(file_name);
            }
        }
        files.sort();

        let mut known = KnownFaces::new();
        for file_name in files {
            tracing::debug!(file = %file_name, "encoding reference");
            match self.encode_first(&known_folder.join(&file_name))? {
                Some(encoding) => {
                    check_dim(&self.config, &file_name, &encoding)?;
                    known.insert(identity_name(&file_name), encoding);
                }
                None => tracing::warn!(file = %file_name, "no face in reference image; skipping"),
            }
        }

        persist::write_json(&self.config.encodings_path(known_folder), &known)?;
        self.detector.record(known_folder)?;

        tracing::info!(folder = %known_folder.display(), entries = known.len(), "encoding cache built");
        Ok(known)
    }

    /// Patch `known` with the added and removed files of `change_set`.
    fn apply(
        &mut self,
        known_folder: &Path,
        change_set: &ChangeSet,
        known: &mut KnownFaces,
    ) -> Result<(), CacheError> {
        for file_name in &change_set.added {
            if !self.config.is_compatible(file_name) {
                tracing::info!(file = %file_name, "unsupported format; skipping");
                continue;
            }
            tracing::debug!(file = %file_name, "encoding added reference");
            let encoding = self
                .encode_first(&known_folder.join(file_name))?
                .ok_or_else(|| CacheError::NoFaceInReference(file_name.clone()))?;
            check_dim(&self.config, file_name, &encoding)?;
            known.insert(identity_name(file_name), encoding);
        }

        for file_name in &change_set.removed {
            if !self.config.is_compatible(file_name) {
                tracing::info!(file = %file_name, "unsupported format; skipping");
                continue;
            }
            let name = identity_name(file_name);
            tracing::debug!(file = %file_name, name = %name, "dropping removed reference");
            if known.remove(&name).is_none() {
                return Err(CacheError::MissingEntry(name));
            }
        }
        Ok(())
    }

    fn encode_first(&mut self, path: &Path) -> Result<Option<Encoding>, CacheError> {
        let image = analyzer::load_image(path)?;
        Ok(self.analyzer.detect_and_encode(&image)?.into_iter().next())
    }
}

/// Read the persisted encodings of `known_folder`, checking every vector's length.
///
/// Returns `None` when the cache has never been built.
pub fn load_known(config: &Config, known_folder: &Path) -> Result<Option<KnownFaces>, CacheError> {
    let Some(known) = persist::read_json::<KnownFaces>(&config.encodings_path(known_folder))? else {
        return Ok(None);
    };
    for (name, encoding) in &known {
        check_dim(config, name, encoding)?;
    }
    Ok(Some(known))
}

fn check_dim(config: &Config, name: &str, encoding: &Encoding) -> Result<(), CacheError> {
    if encoding.len() != config.encoding_dim {
        return Err(CacheError::MalformedEncoding {
            name: name.to_string(),
            expected: config.encoding_dim,
            actual: encoding.len(),
        });
    }
    Ok(())
}
