//! Configuration for sitesafe-eye

use crate::verdict::PpeCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the PPE verdict is computed for video uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoVerdictScope {
    /// No verdict for videos; checks apply to images only
    Off,
    /// Labels of the first frame only
    FirstFrame,
    /// Union of labels over every frame the detector reported
    AllFrames,
}

/// External detector invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ultralytics CLI executable
    pub program: String,
    /// Pretrained weights handed to the CLI
    pub model: PathBuf,
    /// Class names in the model's index order
    pub class_names: Vec<String>,
    /// Extra `key=value` arguments appended to the predict command
    pub extra_args: Vec<String>,
    /// Kill the detector after this many seconds (none: wait forever)
    pub timeout_secs: Option<u64>,
    /// Detector invocations allowed to run at once
    pub max_concurrent: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            program: "yolo".to_string(),
            model: PathBuf::from("models/best.pt"),
            class_names: vec!["helmet".to_string(), "mask".to_string(), "person".to_string()],
            extra_args: Vec::new(),
            timeout_secs: None,
            max_concurrent: 1,
        }
    }
}

impl DetectorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("Detector program must not be empty".to_string());
        }
        if self.model.as_os_str().is_empty() {
            return Err("Detector model path must not be empty".to_string());
        }
        if self.max_concurrent == 0 || self.max_concurrent > 64 {
            return Err("max_concurrent must be between 1 and 64".to_string());
        }
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be positive when set".to_string());
        }
        Ok(())
    }
}

/// Where uploads and detector output live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: std::env::temp_dir().join("sitesafe-uploads"),
            output_root: PathBuf::from("runs/detect"),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.upload_dir.as_os_str().is_empty() || self.output_root.as_os_str().is_empty() {
            return Err("Storage directories must not be empty".to_string());
        }
        if self.upload_dir == self.output_root {
            return Err("upload_dir and output_root must differ".to_string());
        }
        Ok(())
    }
}

/// Poll-until-stable wait applied to an output directory after the
/// detector returns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub poll_interval_ms: u64,
    /// Consecutive identical listings required before the directory counts
    /// as settled
    pub stable_polls: u32,
    pub timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            stable_polls: 2,
            timeout_ms: 5_000,
        }
    }
}

impl SettleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be positive".to_string());
        }
        if self.stable_polls == 0 {
            return Err("stable_polls must be at least 1".to_string());
        }
        if self.timeout_ms < self.poll_interval_ms {
            return Err("timeout_ms must be at least poll_interval_ms".to_string());
        }
        Ok(())
    }
}

/// Model labels that count as each PPE category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryLabels {
    pub mask: Vec<String>,
    pub helmet: Vec<String>,
}

impl Default for CategoryLabels {
    fn default() -> Self {
        Self {
            mask: vec![PpeCategory::Mask.as_str().to_string()],
            helmet: vec![PpeCategory::Helmet.as_str().to_string()],
        }
    }
}

impl CategoryLabels {
    pub fn labels_for(&self, category: PpeCategory) -> &[String] {
        match category {
            PpeCategory::Mask => &self.mask,
            PpeCategory::Helmet => &self.helmet,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictConfig {
    pub video_scope: VideoVerdictScope,
    pub labels: CategoryLabels,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            video_scope: VideoVerdictScope::Off,
            labels: CategoryLabels::default(),
        }
    }
}

impl VerdictConfig {
    pub fn validate(&self) -> Result<(), String> {
        for category in PpeCategory::ALL {
            let labels = self.labels.labels_for(category);
            if labels.is_empty() || labels.iter().any(|l| l.trim().is_empty()) {
                return Err(format!("Category {} needs at least one non-empty label", category));
            }
        }
        let overlap = self
            .labels
            .mask
            .iter()
            .find(|label| self.labels.helmet.contains(label));
        if let Some(label) = overlap {
            return Err(format!("Label '{}' is mapped to more than one category", label));
        }
        Ok(())
    }
}

/// Lifetime of run artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Runs kept on disk; older ones are deleted as new ones arrive
    pub max_runs: usize,
    pub cleanup_on_shutdown: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_runs: 16,
            cleanup_on_shutdown: true,
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_runs == 0 {
            return Err("max_runs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Detection pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub detector: DetectorConfig,
    pub storage: StorageConfig,
    pub settle: SettleConfig,
    pub verdict: VerdictConfig,
    pub retention: RetentionConfig,
}

impl EyeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.detector.validate()?;
        self.storage.validate()?;
        self.settle.validate()?;
        self.verdict.validate()?;
        self.retention.validate()?;
        Ok(())
    }
}
