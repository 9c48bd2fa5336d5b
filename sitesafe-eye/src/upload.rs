//! Upload persistence
//!
//! Every upload lands in its own uniquely named file under the upload
//! directory. Nothing about the content is checked beyond its extension;
//! malformed media is passed on to the detector as-is.

use crate::error::{DetectError, Result};
use crate::media::MediaKind;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A user-submitted file persisted for one run
#[derive(Debug, Clone, Serialize)]
pub struct UploadArtifact {
    pub id: Uuid,
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Normalized extension, without the dot
    pub extension: String,
    pub original_name: Option<String>,
    pub size: u64,
}

/// Writes uploads to uniquely named files
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensure the upload directory exists
    pub fn ensure_dir(&self) -> Result<&Path> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            info!("Created upload directory: {:?}", self.dir);
        }
        Ok(&self.dir)
    }

    /// Persist `bytes` under a fresh name carrying `extension`
    pub fn persist(
        &self,
        bytes: &[u8],
        extension: &str,
        original_name: Option<&str>,
    ) -> Result<UploadArtifact> {
        let kind = MediaKind::from_extension(extension)?;
        let extension = normalize_extension(extension);
        self.ensure_dir()?;

        let suffix = format!(".{}", extension);
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        let (_, path) = file.keep().map_err(|e| DetectError::Io(e.error))?;

        let artifact = UploadArtifact {
            id: Uuid::new_v4(),
            path,
            kind,
            extension,
            original_name: original_name.map(str::to_string),
            size: bytes.len() as u64,
        };
        debug!(
            "Stored {} upload {:?} ({} bytes) at {:?}",
            artifact.kind, artifact.original_name, artifact.size, artifact.path
        );
        Ok(artifact)
    }

    /// Like [`persist`](Self::persist), but take the extension from the
    /// client-supplied file name and require it to be of `expected` kind
    pub fn persist_named(
        &self,
        bytes: &[u8],
        file_name: &str,
        expected: MediaKind,
    ) -> Result<UploadArtifact> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DetectError::UnsupportedExtension(file_name.to_string()))?;
        let actual = MediaKind::from_extension(extension)?;
        if actual != expected {
            return Err(DetectError::UnexpectedMediaKind { expected, actual });
        }
        self.persist(bytes, extension, Some(file_name))
    }

    /// Delete an upload. A file that is already gone is not an error.
    pub fn remove(&self, artifact: &UploadArtifact) -> Result<()> {
        match fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {:?} already removed", artifact.path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if ext == "jpeg" {
        "jpg".to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_persist_writes_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path().join("uploads"));

        let artifact = store.persist(b"fake mp4 bytes", "mp4", Some("site.mp4")).unwrap();
        assert_eq!(artifact.kind, MediaKind::Video);
        assert_eq!(artifact.extension, "mp4");
        assert_eq!(artifact.size, 14);
        assert_eq!(fs::read(&artifact.path).unwrap(), b"fake mp4 bytes");
        assert!(artifact.path.starts_with(store.dir()));
        assert_eq!(artifact.path.extension().unwrap(), "mp4");
    }

    #[test]
    fn test_persist_never_reuses_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path());

        let mut paths = HashSet::new();
        for _ in 0..20 {
            let artifact = store.persist(b"same bytes", "png", None).unwrap();
            assert!(paths.insert(artifact.path));
        }
    }

    #[test]
    fn test_persist_rejects_unknown_extension() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path());
        let result = store.persist(b"GIF89a", "gif", None);
        assert!(matches!(result, Err(DetectError::UnsupportedExtension(_))));
    }

    #[test]
    fn test_persist_normalizes_extension() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path());
        let artifact = store.persist(b"x", "JPEG", None).unwrap();
        assert_eq!(artifact.extension, "jpg");
        assert_eq!(artifact.kind, MediaKind::Image);
    }

    #[test]
    fn test_persist_named_checks_kind() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path());

        let result = store.persist_named(b"x", "helmet.png", MediaKind::Video);
        assert!(matches!(
            result,
            Err(DetectError::UnexpectedMediaKind { expected: MediaKind::Video, actual: MediaKind::Image })
        ));

        let result = store.persist_named(b"x", "no_extension", MediaKind::Image);
        assert!(matches!(result, Err(DetectError::UnsupportedExtension(_))));

        let artifact = store.persist_named(b"x", "crew.avi", MediaKind::Video).unwrap();
        assert_eq!(artifact.original_name.as_deref(), Some("crew.avi"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = UploadStore::new(temp_dir.path());
        let artifact = store.persist(b"x", "jpg", None).unwrap();

        store.remove(&artifact).unwrap();
        assert!(!artifact.path.exists());
        store.remove(&artifact).unwrap();
    }
}
