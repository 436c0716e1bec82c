//! Nearest-identity matching under a distance tolerance.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::config::Config;
use crate::types::{Encoding, KnownFaces, MatchResult, UNKNOWN_DISTANCE};
use image::DynamicImage;

/// Finds the closest known identity for a probe face.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    tolerance: f64,
}

impl Matcher {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tolerance)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Encode `crop` and match its first face.
    ///
    /// Returns `None` when the analyzer finds no face in the crop.
    pub fn identify<A: FaceAnalyzer>(
        &self,
        analyzer: &mut A,
        crop: &DynamicImage,
        known: &KnownFaces,
    ) -> Result<Option<MatchResult>, AnalyzerError> {
        let Some(probe) = analyzer.detect_and_encode(crop)?.into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(self.compare(&*analyzer, &probe, known)))
    }

    /// Match `probe` against every known encoding.
    ///
    /// Always scans the whole mapping. The running minimum only moves on a
    /// strictly smaller distance, so the earliest of equal candidates (in key
    /// order) is kept. A match is declared if any running minimum fell within
    /// tolerance; the reported name and distance are the global minimum.
    pub fn compare<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &A,
        probe: &Encoding,
        known: &KnownFaces,
    ) -> MatchResult {
        let mut best_distance = UNKNOWN_DISTANCE;
        let mut best_name: Option<&str> = None;
        let mut is_matched = false;

        for (name, encoding) in known {
            let distance = analyzer.distance(encoding, probe);
            if distance < best_distance {
                best_distance = distance;
                best_name = Some(name.as_str());
                if best_distance <= self.tolerance {
                    is_matched = true;
                }
            }
        }

        match best_name {
            Some(name) if is_matched => MatchResult {
                matched: true,
                name: name.to_string(),
                distance: best_distance,
            },
            _ => MatchResult::unknown(),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{color_image, FakeAnalyzer};
    use crate::types::UNKNOWN_NAME;

    fn enc(values: &[f64]) -> Encoding {
        Encoding::new(values.to_vec())
    }

    fn known(entries: &[(&str, &[f64])]) -> KnownFaces {
        entries
            .iter()
            .map(|(name, values)| (name.to_string(), enc(values)))
            .collect()
    }

    #[test]
    fn test_match_within_tolerance() {
        let gallery = known(&[("alice", &[0.0, 0.0])]);
        let result = Matcher::new(0.5).compare(&FakeAnalyzer::default(), &enc(&[0.3, 0.0]), &gallery);
        assert!(result.matched);
        assert_eq!(result.name, "alice");
        assert!((result.distance - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_match_outside_tolerance_is_unknown() {
        let gallery = known(&[("alice", &[0.0, 0.0])]);
        let result = Matcher::new(0.5).compare(&FakeAnalyzer::default(), &enc(&[0.9, 0.0]), &gallery);
        assert_eq!(result, MatchResult::unknown());
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let gallery = known(&[("alice", &[0.0])]);
        let result = Matcher::new(0.5).compare(&FakeAnalyzer::default(), &enc(&[0.5]), &gallery);
        assert!(result.matched);
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let result = Matcher::default().compare(&FakeAnalyzer::default(), &enc(&[0.0]), &KnownFaces::new());
        assert!(!result.matched);
        assert_eq!(result.name, UNKNOWN_NAME);
        assert_eq!(result.distance, UNKNOWN_DISTANCE);
    }

    #[test]
    fn test_global_minimum_is_reported() {
        // "alice" passes first, "carol" is closer and replaces it, "bob" is ignored.
        let gallery = known(&[("alice", &[0.4]), ("bob", &[2.0]), ("carol", &[0.1])]);
        let result = Matcher::new(0.5).compare(&FakeAnalyzer::default(), &enc(&[0.0]), &gallery);
        assert_eq!(result.name, "carol");
        assert!((result.distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_first_in_key_order() {
        let gallery = known(&[("bob", &[0.2]), ("alice", &[-0.2])]);
        let result = Matcher::new(0.5).compare(&FakeAnalyzer::default(), &enc(&[0.0]), &gallery);
        assert_eq!(result.name, "alice");
    }

    #[test]
    fn test_identify_without_face_is_none() {
        let mut analyzer = FakeAnalyzer::default();
        let gallery = known(&[("alice", &[0.0, 0.0, 0.0, 0.0])]);
        let blank = color_image([0, 0, 0], 8, 8);
        let got = Matcher::default().identify(&mut analyzer, &blank, &gallery).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_identify_encodes_crop() {
        let mut analyzer = FakeAnalyzer::default();
        let face = color_image([255, 0, 0], 8, 8);
        let gallery = known(&[("red", &[1.0, 0.0, 0.0, 0.0]), ("green", &[0.0, 1.0, 0.0, 0.0])]);
        let got = Matcher::default().identify(&mut analyzer, &face, &gallery).unwrap().unwrap();
        assert_eq!(got.name, "red");
        assert_eq!(got.distance, 0.0);
    }
}
