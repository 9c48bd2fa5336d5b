//! Bounded registry of recent runs
//!
//! Runs stay addressable (so their artifacts can be served) until newer runs
//! push them out; an evicted run is handed back to the caller, which deletes
//! its files.

use crate::detector::DetectionOutput;
use crate::error::Result;
use crate::media::MediaKind;
use crate::pipeline::{DetectionResult, PipelineState};
use crate::upload::{UploadArtifact, UploadStore};
use crate::verdict::PpeVerdict;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One pass through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub kind: MediaKind,
    pub state: PipelineState,
    pub upload: UploadArtifact,
    pub result: Option<DetectionResult>,
    #[serde(skip)]
    pub detections: Option<DetectionOutput>,
    pub verdict: Option<PpeVerdict>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Output directory created for this run and deleted with it
    #[serde(skip)]
    pub owned_output_dir: Option<PathBuf>,
}

impl RunRecord {
    pub(crate) fn processing(id: Uuid, upload: UploadArtifact, output_dir: PathBuf) -> Self {
        Self {
            id,
            kind: upload.kind,
            state: PipelineState::Processing,
            upload,
            result: None,
            detections: None,
            verdict: None,
            error: None,
            created_at: Utc::now(),
            owned_output_dir: Some(output_dir),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, PipelineState::Ready | PipelineState::Failed)
    }

    /// Sample frame `index`, if the run produced one
    pub fn sample_frame(&self, index: usize) -> Option<&PathBuf> {
        self.result.as_ref()?.sample_frame_paths.get(index)
    }

    /// Delete the upload and the run's own output directory
    pub fn cleanup(&self, uploads: &UploadStore) -> Result<()> {
        uploads.remove(&self.upload)?;
        if let Some(dir) = &self.owned_output_dir {
            remove_dir_if_present(dir)?;
        }
        debug!("Cleaned up run {}", self.id);
        Ok(())
    }
}

pub(crate) fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Recent runs, oldest first
pub struct RunRegistry {
    runs: RwLock<VecDeque<Arc<RunRecord>>>,
    max_runs: usize,
}

impl RunRegistry {
    pub fn new(max_runs: usize) -> Self {
        Self {
            runs: RwLock::new(VecDeque::new()),
            max_runs: max_runs.max(1),
        }
    }

    /// Add a run; returns the finished runs that no longer fit.
    /// Runs still processing are never evicted.
    pub fn insert(&self, record: RunRecord) -> Vec<Arc<RunRecord>> {
        let mut runs = self.runs.write();
        runs.push_back(Arc::new(record));

        let mut evicted = Vec::new();
        while runs.len() > self.max_runs {
            let Some(pos) = runs.iter().position(|r| r.is_finished()) else {
                warn!("{} runs in flight exceed the retention limit of {}", runs.len(), self.max_runs);
                break;
            };
            if let Some(run) = runs.remove(pos) {
                evicted.push(run);
            }
        }
        evicted
    }

    /// Replace the record with the same id, keeping its position
    pub fn update(&self, record: RunRecord) -> Arc<RunRecord> {
        let record = Arc::new(record);
        let mut runs = self.runs.write();
        match runs.iter().position(|r| r.id == record.id) {
            Some(pos) => runs[pos] = record.clone(),
            None => runs.push_back(record.clone()),
        }
        record
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<RunRecord>> {
        self.runs.read().iter().find(|r| r.id == id).cloned()
    }

    /// Most recently added run
    pub fn latest(&self) -> Option<Arc<RunRecord>> {
        self.runs.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }

    /// Remove and return every run
    pub fn drain(&self) -> Vec<Arc<RunRecord>> {
        self.runs.write().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(store: &UploadStore, output_root: &std::path::Path, state: PipelineState) -> RunRecord {
        let upload = store.persist(b"bytes", "jpg", None).unwrap();
        let id = Uuid::new_v4();
        let dir = output_root.join(id.to_string());
        fs::create_dir_all(&dir).unwrap();
        let mut record = RunRecord::processing(id, upload, dir);
        record.state = state;
        record
    }

    #[test]
    fn test_insert_evicts_oldest_finished() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));
        let registry = RunRegistry::new(2);

        let first = record(&store, temp_dir.path(), PipelineState::Ready);
        let first_id = first.id;
        assert!(registry.insert(first).is_empty());
        assert!(registry.insert(record(&store, temp_dir.path(), PipelineState::Failed)).is_empty());

        let evicted = registry.insert(record(&store, temp_dir.path(), PipelineState::Ready));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, first_id);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(first_id).is_none());
    }

    #[test]
    fn test_processing_runs_are_not_evicted() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));
        let registry = RunRegistry::new(1);

        registry.insert(record(&store, temp_dir.path(), PipelineState::Processing));
        let evicted = registry.insert(record(&store, temp_dir.path(), PipelineState::Processing));
        assert!(evicted.is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));
        let registry = RunRegistry::new(4);

        let run = record(&store, temp_dir.path(), PipelineState::Processing);
        let id = run.id;
        registry.insert(run.clone());
        registry.insert(record(&store, temp_dir.path(), PipelineState::Ready));

        let mut done = run;
        done.state = PipelineState::Ready;
        registry.update(done);

        assert_eq!(registry.get(id).unwrap().state, PipelineState::Ready);
        assert_eq!(registry.len(), 2);
        assert_ne!(registry.latest().unwrap().id, id);
    }

    #[test]
    fn test_cleanup_removes_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));
        let run = record(&store, temp_dir.path(), PipelineState::Ready);
        let dir = run.owned_output_dir.clone().unwrap();

        run.cleanup(&store).unwrap();
        assert!(!run.upload.path.exists());
        assert!(!dir.exists());
        run.cleanup(&store).unwrap();
    }

    #[test]
    fn test_drain() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));
        let registry = RunRegistry::new(4);
        registry.insert(record(&store, temp_dir.path(), PipelineState::Ready));
        registry.insert(record(&store, temp_dir.path(), PipelineState::Failed));

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
    }
}
