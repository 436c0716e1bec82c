//! facekit-core — Incremental face-encoding cache and recognition runs.
//!
//! Keeps a persisted name → encoding mapping for a folder of reference images
//! in sync with the folder's contents, re-encoding only what changed, and uses
//! it to label faces in probe images. Face detection and encoding are supplied
//! by a [`FaceAnalyzer`] implementation.

pub mod analyzer;
pub mod batch;
pub mod cache;
pub mod config;
pub mod matcher;
pub mod persist;
pub mod prompt;
pub mod snapshot;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer};
pub use batch::{BatchError, BatchRecognizer};
pub use cache::{CacheError, EncodingCache, StatePaths};
pub use config::{Config, ConfigError};
pub use matcher::Matcher;
pub use prompt::{
    NoPrompt, OverwriteDecision, OverwritePolicy, OverwritePrompt, PromptError, TerminalPrompt,
};
pub use snapshot::{ChangeDetector, ChangeSet, Detection, Snapshot, SnapshotError};
pub use types::{
    BoundingBox, Encoding, FaceLabel, FaceRegion, KnownFaces, MatchResult, UNKNOWN_DISTANCE,
    UNKNOWN_NAME,
};
