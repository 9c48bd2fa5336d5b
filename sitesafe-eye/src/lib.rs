//! sitesafe-eye: PPE detection pipeline
//!
//! Persists user uploads, hands them to an external pretrained detector,
//! locates the annotated media the detector writes to disk and turns the
//! reported class labels into a presence/absence verdict for the PPE
//! categories the site cares about.

pub mod config;
pub mod detector;
pub mod error;
pub mod locator;
pub mod media;
pub mod pipeline;
pub mod registry;
pub mod upload;
pub mod verdict;

pub use config::{EyeConfig, VideoVerdictScope};
pub use detector::{DetectRequest, DetectionOutput, DetectionRecord, Detector, UltralyticsDetector};
pub use error::DetectError;
pub use locator::{LocatedOutput, OutputLocator};
pub use media::MediaKind;
pub use pipeline::{DetectionPipeline, DetectionResult, PipelineState};
pub use registry::{RunRecord, RunRegistry};
pub use upload::{UploadArtifact, UploadStore};
pub use verdict::{PpeCategory, PpeVerdict};
