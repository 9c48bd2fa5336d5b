//! Detection pipeline: upload → detector → output locator → verdict
//!
//! Every run gets its own invocation id and output directory, so concurrent
//! runs never pick up each other's media. Detector invocations are still
//! bounded by `detector.max_concurrent`.

use crate::config::{EyeConfig, VideoVerdictScope};
use crate::detector::{DetectRequest, DetectionOutput, Detector, UltralyticsDetector};
use crate::error::{DetectError, Result};
use crate::locator::{LocatedOutput, OutputLocator, MAX_SAMPLE_FRAMES};
use crate::media::MediaKind;
use crate::registry::{remove_dir_if_present, RunRecord, RunRegistry};
use crate::upload::{UploadArtifact, UploadStore};
use crate::verdict::PpeVerdict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of a run. There is no retry and no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Processing,
    Ready,
    Failed,
}

/// What a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub invocation_id: Uuid,
    pub output_dir: PathBuf,
    pub annotated_media_path: PathBuf,
    pub sample_frame_paths: Vec<PathBuf>,
    pub detected_labels: BTreeSet<String>,
}

impl DetectionResult {
    /// The annotated media must be of the same kind as the upload; anything
    /// else means the detector failed without saying so.
    pub fn new(
        invocation_id: Uuid,
        expected: MediaKind,
        located: LocatedOutput,
        detected_labels: BTreeSet<String>,
    ) -> Result<Self> {
        let actual = MediaKind::from_path(&located.media).ok();
        if actual != Some(expected) {
            return Err(DetectError::MediaKindMismatch {
                expected,
                path: located.media,
            });
        }

        let mut sample_frame_paths = located.sample_frames;
        sample_frame_paths.truncate(MAX_SAMPLE_FRAMES);

        Ok(Self {
            invocation_id,
            output_dir: located.dir,
            annotated_media_path: located.media,
            sample_frame_paths,
            detected_labels,
        })
    }
}

/// Runs uploads through the detector and keeps track of recent runs
pub struct DetectionPipeline {
    config: Arc<EyeConfig>,
    uploads: UploadStore,
    detector: Arc<dyn Detector>,
    locator: OutputLocator,
    permits: Semaphore,
    runs: RunRegistry,
}

impl DetectionPipeline {
    /// Create a pipeline around any detector
    pub fn new(config: EyeConfig, detector: Arc<dyn Detector>) -> Result<Self> {
        config.validate().map_err(DetectError::Config)?;

        let uploads = UploadStore::new(config.storage.upload_dir.clone());
        uploads.ensure_dir()?;
        let locator = OutputLocator::new(config.storage.output_root.clone());
        let permits = Semaphore::new(config.detector.max_concurrent);
        let runs = RunRegistry::new(config.retention.max_runs);

        info!(
            "Detection pipeline ready (detector: {}, output root: {:?})",
            detector.name(),
            locator.root()
        );

        Ok(Self {
            config: Arc::new(config),
            uploads,
            detector,
            locator,
            permits,
            runs,
        })
    }

    /// Create a pipeline backed by the ultralytics CLI
    pub fn from_config(config: EyeConfig) -> Result<Self> {
        let detector = Arc::new(UltralyticsDetector::new(config.detector.clone())?);
        Self::new(config, detector)
    }

    pub fn config(&self) -> &EyeConfig {
        &self.config
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    pub fn locator(&self) -> &OutputLocator {
        &self.locator
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Persist an upload named `file_name` and run it through the pipeline.
    /// Only upload problems are returned as errors; detection failures are
    /// recorded on the returned run.
    pub async fn submit(
        &self,
        bytes: &[u8],
        file_name: &str,
        expected: MediaKind,
    ) -> Result<Arc<RunRecord>> {
        let upload = self.uploads.persist_named(bytes, file_name, expected)?;
        Ok(self.process(upload).await)
    }

    /// Run a persisted upload through detection
    pub async fn process(&self, upload: UploadArtifact) -> Arc<RunRecord> {
        let request = DetectRequest {
            source: upload.path.clone(),
            output_root: self.locator.root().to_path_buf(),
            invocation_id: Uuid::new_v4(),
        };
        let mut record = RunRecord::processing(request.invocation_id, upload, request.run_dir());
        debug!("Run {}: idle -> processing", record.id);

        let evicted = self.runs.insert(record.clone());
        self.cleanup_runs(evicted);

        match self.execute(&request, record.kind).await {
            Ok((result, detections)) => {
                record.verdict = self.verdict_for(record.kind, &detections);
                info!(
                    "Run {} ready: {:?}, labels {:?}",
                    record.id, result.annotated_media_path, result.detected_labels
                );
                record.owned_output_dir = Some(result.output_dir.clone());
                record.result = Some(result);
                record.detections = Some(detections);
                record.state = PipelineState::Ready;
            }
            Err(e) => {
                error!("Run {} failed: {}", record.id, e);
                if let Err(cleanup_err) = remove_dir_if_present(&request.run_dir()) {
                    warn!("Failed to remove partial output of run {}: {}", record.id, cleanup_err);
                }
                record.error = Some(e.to_string());
                record.state = PipelineState::Failed;
            }
        }

        self.runs.update(record)
    }

    async fn execute(
        &self,
        request: &DetectRequest,
        kind: MediaKind,
    ) -> Result<(DetectionResult, DetectionOutput)> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DetectError::Config("detector permits closed".to_string()))?;

        let before = self.locator.snapshot_run_dirs()?;
        let detections = self.detector.detect(request).await?;

        let mut dir = request.run_dir();
        if !dir.is_dir() {
            warn!(
                "Detector did not create {:?}; falling back to the newest directory it touched",
                dir
            );
            dir = self.locator.latest_changed_run_dir(&before)?;
        }
        self.locator.wait_until_stable(&dir, &self.config.settle).await;

        let located = self.locator.locate(&dir, kind)?;
        let labels = self.labels_for(kind, &detections);
        let result = DetectionResult::new(request.invocation_id, kind, located, labels)?;
        Ok((result, detections))
    }

    /// Label set reported for a run
    fn labels_for(&self, kind: MediaKind, detections: &DetectionOutput) -> BTreeSet<String> {
        match (kind, self.config.verdict.video_scope) {
            (MediaKind::Video, VideoVerdictScope::AllFrames) => detections.all_labels(),
            _ => detections.first_frame_labels(),
        }
    }

    fn verdict_for(&self, kind: MediaKind, detections: &DetectionOutput) -> Option<PpeVerdict> {
        if kind == MediaKind::Video && self.config.verdict.video_scope == VideoVerdictScope::Off {
            return None;
        }
        let labels = self.labels_for(kind, detections);
        Some(PpeVerdict::from_labels(&labels, &self.config.verdict.labels))
    }

    fn cleanup_runs(&self, runs: Vec<Arc<RunRecord>>) {
        for run in runs {
            if let Err(e) = run.cleanup(&self.uploads) {
                warn!("Failed to clean up run {}: {}", run.id, e);
            }
        }
    }

    /// Delete every retained run if configured to
    pub fn shutdown(&self) {
        if !self.config.retention.cleanup_on_shutdown {
            return;
        }
        let runs = self.runs.drain();
        info!("Cleaning up {} retained runs", runs.len());
        self.cleanup_runs(runs);
    }
}
