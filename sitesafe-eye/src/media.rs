//! Media kinds and the file extensions that identify them

use crate::error::{DetectError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of media a user submits and the detector produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Extensions accepted from the upload widget
    pub fn upload_extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4", "avi"],
            MediaKind::Image => &["jpg", "jpeg", "png"],
        }
    }

    /// Extensions searched for in detector output, most preferred first
    pub fn output_extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4", "avi"],
            MediaKind::Image => &["jpg", "png"],
        }
    }

    /// Classify an extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        [MediaKind::Video, MediaKind::Image]
            .into_iter()
            .find(|kind| kind.upload_extensions().contains(&ext.as_str()))
            .ok_or(DetectError::UnsupportedExtension(ext))
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DetectError::UnsupportedExtension(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME type for a media file, by extension
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Whether `path` ends in `extension` (case-insensitive)
pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_extension() {
        assert_eq!(MediaKind::from_extension("mp4").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_extension("AVI").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_extension(".png").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_extension("jpeg").unwrap(), MediaKind::Image);
    }

    #[test]
    fn test_from_extension_rejects_unknown() {
        match MediaKind::from_extension("gif") {
            Err(DetectError::UnsupportedExtension(ext)) => assert_eq!(ext, "gif"),
            other => panic!("Expected UnsupportedExtension, got {:?}", other),
        }
    }

    #[test]
    fn test_from_path_without_extension() {
        assert!(MediaKind::from_path(&PathBuf::from("runs/detect/predict")).is_err());
    }

    #[test]
    fn test_output_preference_order() {
        assert_eq!(MediaKind::Video.output_extensions(), &["mp4", "avi"]);
        assert_eq!(MediaKind::Image.output_extensions(), &["jpg", "png"]);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a/processed.MP4")), "video/mp4");
        assert_eq!(mime_type(Path::new("frame.jpg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("frame.png")), "image/png");
        assert_eq!(mime_type(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
        let kind: MediaKind = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(kind, MediaKind::Image);
    }
}
