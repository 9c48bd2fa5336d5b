//! Error types for sitesafe-eye

use crate::media::MediaKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Expected {expected} upload, got {actual}")]
    UnexpectedMediaKind { expected: MediaKind, actual: MediaKind },

    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Output {path:?} is not a {expected} file")]
    MediaKindMismatch { expected: MediaKind, path: PathBuf },

    #[error("Detector exited with {status}: {stderr}")]
    DetectorFailed { status: String, stderr: String },

    #[error("Detector did not finish within {0:?}")]
    DetectorTimeout(Duration),

    #[error("Failed to start detector: {0}")]
    DetectorSpawn(String),

    #[error("Malformed label file {path:?} at line {line}: {reason}")]
    LabelParse { path: PathBuf, line: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    /// Whether the failure was caused by what the user submitted rather than
    /// by the detector or the host.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DetectError::UnsupportedExtension(_) | DetectError::UnexpectedMediaKind { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
