//! Seam to the face-analysis backend.
//!
//! Locating faces in pixels and turning a face into an [`Encoding`] is done by
//! an external model; this crate only consumes its results.

use crate::types::{BoundingBox, Encoding, FaceRegion};
use image::{DynamicImage, ImageReader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
    #[error("analysis failed: {0}")]
    Backend(String),
}

/// Face detection and encoding backend.
///
/// Implementations may hold inference sessions, hence `&mut self`.
pub trait FaceAnalyzer {
    /// Encode every face found in `image`. Order is backend-defined; callers
    /// needing a single face use the first element.
    fn detect_and_encode(&mut self, image: &DynamicImage) -> Result<Vec<Encoding>, AnalyzerError>;

    /// Locate every face in `image`.
    fn locate(&mut self, image: &DynamicImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// Distance between two encodings. Symmetric, non-negative, 0 for equal inputs.
    fn distance(&self, a: &Encoding, b: &Encoding) -> f64 {
        a.euclidean_distance(b)
    }
}

/// Decode an image file from disk, sniffing the format from its contents.
pub fn load_image(path: &Path) -> Result<DynamicImage, AnalyzerError> {
    let decode = || -> Result<DynamicImage, image::ImageError> {
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
    };
    decode().map_err(|source| AnalyzerError::Decode {
        path: path.display().to_string(),
        source,
    })
}

/// Crop `region` out of `image`, clamped to the image bounds.
///
/// Inverted corners yield an empty crop.
pub fn crop(image: &DynamicImage, region: &FaceRegion) -> DynamicImage {
    let xmin = region.xmin.min(image.width());
    let ymin = region.ymin.min(image.height());
    let xmax = region.xmax.min(image.width());
    let ymax = region.ymax.min(image.height());
    image.crop_imm(xmin, ymin, xmax.saturating_sub(xmin), ymax.saturating_sub(ymin))
}
