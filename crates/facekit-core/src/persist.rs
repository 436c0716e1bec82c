//! Whole-file JSON persistence for state kept beside a known folder.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and deserialize `path`, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io(path, e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Serialize `value` to `path`, replacing the whole file.
///
/// The data goes to a temporary file in the same directory first and is then
/// renamed over `path`, so readers never see a half-written file. Missing
/// parent directories are created.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

    let json = serde_json::to_vec(value).map_err(|source| PersistError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;
    tmp.write_all(&json).map_err(|e| PersistError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PersistError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let got: Option<BTreeMap<String, f64>> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_write_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".state").join("map.json");

        let first = BTreeMap::from([("a".to_string(), 1.0f64)]);
        write_json(&path, &first).unwrap();
        let second = BTreeMap::from([("b".to_string(), 2.5f64)]);
        write_json(&path, &second).unwrap();

        let got: BTreeMap<String, f64> = read_json(&path).unwrap().unwrap();
        assert_eq!(got, second);
        // Only the target file remains; the temporary file was renamed away.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_unserializable_is_serialize_error() {
        // JSON object keys must be strings.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        let bad = BTreeMap::from([((1u8, 2u8), 0.0f64)]);
        let err = write_json(&path, &bad).unwrap_err();
        assert!(matches!(err, PersistError::Serialize { .. }));
        assert!(err.to_string().starts_with("failed to serialize"));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<BTreeMap<String, f64>>(&path).unwrap_err();
        assert!(matches!(err, PersistError::Parse { .. }));
    }
}
