//! Folder-level recognition and positioning runs.

use crate::analyzer::{self, AnalyzerError, FaceAnalyzer};
use crate::cache::{CacheError, EncodingCache};
use crate::config::Config;
use crate::matcher::Matcher;
use crate::persist::{self, PersistError};
use crate::prompt::{OverwritePolicy, OverwritePrompt, PromptError};
use crate::types::{FaceLabel, FaceRegion, KnownFaces};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Drives the analyzer and [`Matcher`] over folders of probe images.
pub struct BatchRecognizer<A, P> {
    cache: EncodingCache<A>,
    matcher: Matcher,
    overwrite: OverwritePolicy<P>,
    config: Config,
}

impl<A: FaceAnalyzer, P: OverwritePrompt> BatchRecognizer<A, P> {
    pub fn new(analyzer: A, config: Config, overwrite: OverwritePolicy<P>) -> Self {
        Self {
            cache: EncodingCache::new(analyzer, config.clone()),
            matcher: Matcher::from_config(&config),
            overwrite,
            config,
        }
    }

    pub fn cache(&self) -> &EncodingCache<A> {
        &self.cache
    }

    /// Label every face in every compatible image of `probe_folder`.
    ///
    /// Writes one `<file name>.json` per image into `output_folder` (replacing
    /// earlier results) and returns the number of images processed.
    pub fn process_folder(
        &mut self,
        probe_folder: &Path,
        output_folder: &Path,
        known_folder: &Path,
    ) -> Result<usize, BatchError> {
        let known = self.cache.get_current(known_folder)?;
        create_dir(output_folder)?;

        let mut processed = 0;
        for file_name in self.probe_files(probe_folder)? {
            tracing::info!(file = %file_name, "recognizing");
            let labels = self.recognize_image(&probe_folder.join(&file_name), &known)?;
            persist::write_json(&output_path(output_folder, &file_name), &labels)?;
            processed += 1;
        }

        tracing::info!(processed, "recognition complete");
        Ok(processed)
    }

    /// Locate, crop and match every face in one image.
    ///
    /// Faces the analyzer cannot encode are left out. Every remaining face is
    /// reported, including several faces matching the same name.
    pub fn recognize_image(
        &mut self,
        path: &Path,
        known: &KnownFaces,
    ) -> Result<Vec<FaceLabel>, BatchError> {
        let image = analyzer::load_image(path)?;
        let analyzer = self.cache.analyzer_mut();
        let boxes = analyzer.locate(&image)?;

        let mut labels = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let region = bbox.normalize();
            if region.is_empty() {
                continue;
            }
            let crop = analyzer::crop(&image, &region);
            let Some(result) = self.matcher.identify(analyzer, &crop, known)? else {
                tracing::debug!(?region, "no face encoded in crop");
                continue;
            };
            labels.push(FaceLabel {
                name: result.name,
                region,
                distance: result.distance,
            });
        }
        Ok(labels)
    }

    /// Write the located face regions of every compatible image in `raw_folder`.
    ///
    /// Existing outputs are only replaced when the overwrite policy allows it.
    /// Returns the number of outputs written.
    pub fn position_folder(
        &mut self,
        raw_folder: &Path,
        output_folder: &Path,
    ) -> Result<usize, BatchError> {
        create_dir(output_folder)?;

        let mut written = 0;
        for file_name in self.probe_files(raw_folder)? {
            let target = output_path(output_folder, &file_name);
            if target.exists() && !self.overwrite.should_overwrite(&file_name)? {
                tracing::info!(file = %file_name, "output exists; keeping it");
                continue;
            }

            tracing::info!(file = %file_name, "positioning");
            let image = analyzer::load_image(&raw_folder.join(&file_name))?;
            let regions: Vec<FaceRegion> = self
                .cache
                .analyzer_mut()
                .locate(&image)?
                .iter()
                .map(|b| b.normalize())
                .collect();
            persist::write_json(&target, &regions)?;
            written += 1;
        }

        tracing::info!(written, "positioning complete");
        Ok(written)
    }

    /// Compatible, non-directory entries of `folder`, sorted by name.
    fn probe_files(&self, folder: &Path) -> Result<Vec<String>, BatchError> {
        let io_err = |source| BatchError::Io {
            path: folder.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(folder).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.config.is_compatible(&file_name) {
                files.push(file_name);
            } else {
                tracing::info!(
                    file = %file_name,
                    supported = ?self.config.compatible_formats,
                    "format not supported; skipping"
                );
            }
        }
        files.sort();
        Ok(files)
    }
}

fn create_dir(path: &Path) -> Result<(), BatchError> {
    std::fs::create_dir_all(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn output_path(output_folder: &Path, file_name: &str) -> PathBuf {
    output_folder.join(format!("{file_name}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{NoPrompt, OverwriteDecision, TerminalPrompt};
    use crate::test_support::{write_face, write_image, FakeAnalyzer, ScriptedPrompt, TEST_DIM};
    use crate::types::{BoundingBox, UNKNOWN_NAME};
    use image::{Rgb, RgbImage};

    fn test_config() -> Config {
        Config {
            encoding_dim: TEST_DIM,
            ..Config::default()
        }
    }

    fn recognizer(analyzer: FakeAnalyzer) -> BatchRecognizer<FakeAnalyzer, NoPrompt> {
        BatchRecognizer::new(
            analyzer,
            test_config(),
            OverwritePolicy::new(OverwriteDecision::Yes, NoPrompt),
        )
    }

    fn read_labels(path: &Path) -> Vec<FaceLabel> {
        persist::read_json(path).unwrap().unwrap()
    }

    #[test]
    fn test_process_folder_labels_faces() {
        let root = tempfile::tempdir().unwrap();
        let known = root.path().join("known");
        let probes = root.path().join("probes");
        let out = root.path().join("out");
        std::fs::create_dir_all(&known).unwrap();
        std::fs::create_dir_all(probes.join("nested")).unwrap();

        write_face(&known, "alice.jpg", [200, 10, 10]);
        write_face(&known, "bob.png", [10, 200, 10]);
        write_face(&probes, "shot1.png", [200, 10, 10]);
        write_face(&probes, "shot2.jpg", [10, 10, 200]);
        std::fs::write(probes.join("readme.txt"), "skip me").unwrap();

        let mut batch = recognizer(FakeAnalyzer::default());
        let count = batch.process_folder(&probes, &out, &known).unwrap();
        assert_eq!(count, 2);

        let shot1 = read_labels(&out.join("shot1.png.json"));
        assert_eq!(shot1.len(), 1);
        assert_eq!(shot1[0].name, "alice");
        assert_eq!(shot1[0].region, FaceRegion { xmin: 0, ymin: 0, xmax: 8, ymax: 8 });

        let shot2 = read_labels(&out.join("shot2.jpg.json"));
        assert_eq!(shot2[0].name, UNKNOWN_NAME);
        assert!(!out.join("readme.txt.json").exists());
    }

    #[test]
    fn test_same_name_faces_are_all_kept() {
        let root = tempfile::tempdir().unwrap();
        let known = root.path().join("known");
        let probes = root.path().join("probes");
        std::fs::create_dir_all(&known).unwrap();
        std::fs::create_dir_all(&probes).unwrap();
        write_face(&known, "alice.jpg", [200, 10, 10]);

        // Two unknown faces side by side plus a faceless region.
        let mut img = RgbImage::from_pixel(24, 8, Rgb([10, 10, 200]));
        for x in 16..24 {
            for y in 0..8 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        write_image(&probes, "crowd.png", img);

        let analyzer = FakeAnalyzer::with_boxes(vec![
            BoundingBox::new(0, 8, 8, 0),
            BoundingBox::new(8, 8, 0, 16),
            BoundingBox::new(0, 16, 8, 24),
        ]);
        let mut batch = recognizer(analyzer);
        let known_faces = batch.cache.get_current(&known).unwrap();
        let labels = batch.recognize_image(&probes.join("crowd.png"), &known_faces).unwrap();

        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.name == UNKNOWN_NAME));
        assert_eq!(labels[1].region, FaceRegion { xmin: 8, ymin: 0, xmax: 16, ymax: 8 });
    }

    #[test]
    fn test_position_folder_respects_overwrite_answers() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        let out = root.path().join("positioned");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        for name in ["a.png", "b.png", "c.png", "d.png"] {
            write_face(&raw, name, [90, 90, 90]);
        }
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(out.join(format!("{name}.json")), "stale").unwrap();
        }

        let mut prompt = ScriptedPrompt::new(&[OverwriteDecision::No, OverwriteDecision::AllRemaining]);
        let mut batch = BatchRecognizer::new(
            FakeAnalyzer::default(),
            test_config(),
            OverwritePolicy::new(OverwriteDecision::Ask, &mut prompt),
        );
        let written = batch.position_folder(&raw, &out).unwrap();
        drop(batch);

        assert_eq!(written, 3);
        assert_eq!(prompt.asked, vec!["a.png", "b.png"]);
        assert_eq!(std::fs::read_to_string(out.join("a.png.json")).unwrap(), "stale");
        let regions: Vec<FaceRegion> = persist::read_json(&out.join("c.png.json")).unwrap().unwrap();
        assert_eq!(regions, vec![FaceRegion { xmin: 0, ymin: 0, xmax: 8, ymax: 8 }]);
        assert!(out.join("d.png.json").exists());
    }

    #[test]
    fn test_terminal_prompt_untouched_when_decision_is_fixed() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        let out = root.path().join("positioned");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        write_face(&raw, "a.png", [90, 90, 90]);
        std::fs::write(out.join("a.png.json"), "stale").unwrap();

        let mut batch = BatchRecognizer::new(
            FakeAnalyzer::default(),
            test_config(),
            OverwritePolicy::new(OverwriteDecision::Yes, TerminalPrompt),
        );
        assert_eq!(batch.position_folder(&raw, &out).unwrap(), 1);
        let regions: Vec<FaceRegion> = persist::read_json(&out.join("a.png.json")).unwrap().unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_missing_probe_folder_errors() {
        let root = tempfile::tempdir().unwrap();
        let known = root.path().join("known");
        std::fs::create_dir_all(&known).unwrap();

        let mut batch = recognizer(FakeAnalyzer::default());
        let err = batch
            .process_folder(&root.path().join("missing"), &root.path().join("out"), &known)
            .unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }
}
