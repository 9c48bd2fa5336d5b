//! Detector invocation
//!
//! The detection model is an external collaborator: it is handed a source
//! file, writes annotated media into a directory of its own and reports the
//! class label of every box it found.

pub mod labels;
pub mod ultralytics;

pub use ultralytics::UltralyticsDetector;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One detected box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: Option<f32>,
    pub bbox: (f32, f32, f32, f32), // normalized x_center, y_center, width, height
}

/// Detections reported for one invocation, keyed by 1-based frame index.
/// A still image is frame 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    frames: BTreeMap<u32, Vec<DetectionRecord>>,
}

impl DetectionOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: u32, record: DetectionRecord) {
        self.frames.entry(frame).or_default().push(record);
    }

    pub fn frame(&self, frame: u32) -> &[DetectionRecord] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Labels of the first frame only. For videos this ignores every later
    /// frame.
    pub fn first_frame_labels(&self) -> BTreeSet<String> {
        self.frame(1).iter().map(|r| r.class_name.clone()).collect()
    }

    /// Labels seen in any frame
    pub fn all_labels(&self) -> BTreeSet<String> {
        self.frames
            .values()
            .flatten()
            .map(|r| r.class_name.clone())
            .collect()
    }

    /// Frames with at least one detection
    pub fn frames_with_detections(&self) -> usize {
        self.frames.values().filter(|records| !records.is_empty()).count()
    }

    pub fn record_count(&self) -> usize {
        self.frames.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

/// A single detection request
#[derive(Debug, Clone)]
pub struct DetectRequest {
    pub source: PathBuf,
    pub output_root: PathBuf,
    pub invocation_id: Uuid,
}

impl DetectRequest {
    pub fn new(source: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_root: output_root.into(),
            invocation_id: Uuid::new_v4(),
        }
    }

    /// Directory the detector must write this invocation's output into
    pub fn run_dir(&self) -> PathBuf {
        run_dir(&self.output_root, self.invocation_id)
    }
}

pub(crate) fn run_dir(output_root: &Path, invocation_id: Uuid) -> PathBuf {
    output_root.join(invocation_id.to_string())
}

/// An object-detection backend.
///
/// `detect` returns only once the backend has finished writing its output
/// under [`DetectRequest::run_dir`].
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, request: &DetectRequest) -> Result<DetectionOutput>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> DetectionRecord {
        DetectionRecord {
            class_id: 0,
            class_name: name.to_string(),
            confidence: Some(0.9),
            bbox: (0.5, 0.5, 0.1, 0.1),
        }
    }

    #[test]
    fn test_first_frame_labels_ignore_later_frames() {
        let mut output = DetectionOutput::new();
        output.push(1, record("helmet"));
        output.push(2, record("mask"));
        output.push(3, record("helmet"));

        let first: Vec<String> = output.first_frame_labels().into_iter().collect();
        assert_eq!(first, vec!["helmet".to_string()]);

        let all: Vec<String> = output.all_labels().into_iter().collect();
        assert_eq!(all, vec!["helmet".to_string(), "mask".to_string()]);
        assert_eq!(output.frames_with_detections(), 3);
        assert_eq!(output.record_count(), 3);
    }

    #[test]
    fn test_first_frame_without_detections() {
        let mut output = DetectionOutput::new();
        output.push(7, record("mask"));
        assert!(output.first_frame_labels().is_empty());
        assert!(!output.is_empty());
    }

    #[test]
    fn test_empty_output() {
        let output = DetectionOutput::new();
        assert!(output.is_empty());
        assert!(output.frame(1).is_empty());
        assert!(output.all_labels().is_empty());
    }

    #[test]
    fn test_request_run_dir_is_keyed_by_invocation() {
        let first = DetectRequest::new("upload.jpg", "runs/detect");
        let second = DetectRequest::new("upload.jpg", "runs/detect");
        assert_ne!(first.run_dir(), second.run_dir());
        assert!(first.run_dir().starts_with("runs/detect"));
        assert!(first.run_dir().ends_with(first.invocation_id.to_string()));
    }
}
