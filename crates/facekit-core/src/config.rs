use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default maximum distance for a positive match.
pub const DEFAULT_TOLERANCE: f64 = 0.5;
/// Default length of an encoding vector.
pub const DEFAULT_ENCODING_DIM: usize = 128;
/// Default hidden directory (inside the known folder) holding persisted state.
pub const DEFAULT_STATE_DIR: &str = ".facekit";

const SNAPSHOT_FILE: &str = "snapshot.json";
const ENCODINGS_FILE: &str = "encodings.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings shared by every component, loaded from `FACEKIT_*` variables or TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum Euclidean distance accepted as a match.
    pub tolerance: f64,
    /// Recognised image extensions, including the leading dot.
    pub compatible_formats: Vec<String>,
    /// Expected encoding length; cache files with other lengths are rejected.
    pub encoding_dim: usize,
    /// Name of the hidden state directory created inside a known folder.
    pub state_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            compatible_formats: [".jpg", ".jpeg", ".gif", ".png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            encoding_dim: DEFAULT_ENCODING_DIM,
            state_dir: DEFAULT_STATE_DIR.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `FACEKIT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `FACEKIT_*` keys resolved by `lookup`.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            tolerance: parse_or(lookup("FACEKIT_TOLERANCE"), defaults.tolerance),
            compatible_formats: lookup("FACEKIT_COMPATIBLE_FORMATS")
                .map(|v| parse_formats(&v))
                .unwrap_or(defaults.compatible_formats),
            encoding_dim: parse_or(lookup("FACEKIT_ENCODING_DIM"), defaults.encoding_dim),
            state_dir: lookup("FACEKIT_STATE_DIR").unwrap_or(defaults.state_dir),
        }
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether `file_name` carries one of the compatible extensions.
    ///
    /// Matching ignores ASCII case, so `FACE.JPG` is accepted.
    pub fn is_compatible(&self, file_name: &str) -> bool {
        let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.compatible_formats
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Hidden state directory for `folder`.
    pub fn state_dir(&self, folder: &Path) -> PathBuf {
        folder.join(&self.state_dir)
    }

    /// Persisted snapshot (filename → mtime) for `folder`.
    pub fn snapshot_path(&self, folder: &Path) -> PathBuf {
        self.state_dir(folder).join(SNAPSHOT_FILE)
    }

    /// Persisted encoding cache (name → encoding) for `folder`.
    pub fn encodings_path(&self, folder: &Path) -> PathBuf {
        self.state_dir(folder).join(ENCODINGS_FILE)
    }
}

/// Identity name for a reference file: the file name minus its extension.
pub fn identity_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

fn parse_formats(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('.') {
                s.to_string()
            } else {
                format!(".{s}")
            }
        })
        .collect()
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
