use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name reported for a face that matched no known identity.
pub const UNKNOWN_NAME: &str = "unknown";

/// Distance reported alongside [`UNKNOWN_NAME`].
pub const UNKNOWN_DISTANCE: f64 = 99999.0;

/// Known identities keyed by name (reference filename minus extension).
pub type KnownFaces = BTreeMap<String, Encoding>;

/// Face region as reported by the analyzer, in `(y1, x1, y2, x2)` order.
///
/// Corners are not guaranteed to be ordered; use [`normalize`](Self::normalize)
/// before cropping or reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub y1: u32,
    pub x1: u32,
    pub y2: u32,
    pub x2: u32,
}

impl BoundingBox {
    pub fn new(y1: u32, x1: u32, y2: u32, x2: u32) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Order the corners so that `min` is top-left and `max` bottom-right.
    pub fn normalize(&self) -> FaceRegion {
        FaceRegion {
            xmin: self.x1.min(self.x2),
            ymin: self.y1.min(self.y2),
            xmax: self.x1.max(self.x2),
            ymax: self.y1.max(self.y2),
        }
    }
}

/// Axis-aligned face rectangle with ordered corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl FaceRegion {
    /// Horizontal extent; 0 when the corners are inverted.
    pub fn width(&self) -> u32 {
        self.xmax.saturating_sub(self.xmin)
    }

    /// Vertical extent; 0 when the corners are inverted.
    pub fn height(&self) -> u32 {
        self.ymax.saturating_sub(self.ymin)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Face encoding vector (typically 128-dimensional).
///
/// Serialized as a plain JSON array of floats so cache files stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encoding {
    pub values: Vec<f64>,
}

impl Encoding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance between two encodings.
    pub fn euclidean_distance(&self, other: &Encoding) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Result of matching a probe encoding against the known faces.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Matched identity, or [`UNKNOWN_NAME`].
    pub name: String,
    /// Distance to the matched identity, or [`UNKNOWN_DISTANCE`].
    pub distance: f64,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            matched: false,
            name: UNKNOWN_NAME.to_string(),
            distance: UNKNOWN_DISTANCE,
        }
    }
}

/// One labelled face in a probe image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLabel {
    pub name: String,
    pub region: FaceRegion,
    pub distance: f64,
}
