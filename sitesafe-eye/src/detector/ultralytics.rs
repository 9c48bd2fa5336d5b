//! Ultralytics YOLO command-line detector

use crate::config::DetectorConfig;
use crate::detector::labels::read_run_labels;
use crate::detector::{DetectRequest, DetectionOutput, Detector};
use crate::error::{DetectError, Result};
use crate::media::MediaKind;
use async_trait::async_trait;
use std::fs;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

const STDERR_TAIL: usize = 2_000;

/// Runs `yolo predict` as a child process, one process per request.
///
/// Output goes to `<output_root>/<invocation id>/`; labels are requested
/// with `save_txt` so detections can be read back without a second
/// round-trip through the model.
pub struct UltralyticsDetector {
    config: DetectorConfig,
}

impl UltralyticsDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate().map_err(DetectError::Config)?;
        if !config.model.exists() {
            warn!("Detector model {:?} does not exist yet", config.model);
        }
        Ok(Self { config })
    }

    /// Arguments passed to the CLI for `request`
    pub fn arguments(&self, request: &DetectRequest) -> Vec<String> {
        let mut args = vec![
            "predict".to_string(),
            format!("model={}", self.config.model.display()),
            format!("source={}", request.source.display()),
            "save=True".to_string(),
            "save_txt=True".to_string(),
            "save_conf=True".to_string(),
            format!("project={}", request.output_root.display()),
            format!("name={}", request.invocation_id),
            "exist_ok=True".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    fn command(&self, request: &DetectRequest) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(self.arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Detector for UltralyticsDetector {
    async fn detect(&self, request: &DetectRequest) -> Result<DetectionOutput> {
        let source_kind = MediaKind::from_path(&request.source)?;
        fs::create_dir_all(&request.output_root)?;

        info!(
            "Running {} on {:?} (invocation {})",
            self.config.program, request.source, request.invocation_id
        );
        let child = self
            .command(request)
            .spawn()
            .map_err(|e| DetectError::DetectorSpawn(format!("{}: {}", self.config.program, e)))?;

        // Dropping the wait future on timeout kills the child (kill_on_drop).
        let output = match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| DetectError::DetectorTimeout(limit))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr
                .get(start..)
                .unwrap_or(stderr.as_ref())
                .trim()
                .to_string();
            return Err(DetectError::DetectorFailed {
                status: output.status.to_string(),
                stderr: tail,
            });
        }
        debug!("Detector stdout: {}", String::from_utf8_lossy(&output.stdout).trim());

        read_run_labels(&request.run_dir(), source_kind, &self.config.class_names)
    }

    fn name(&self) -> &str {
        "ultralytics"
    }
}
