//! Error types for sitesafe-server

use crate::render;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sitesafe_eye::DetectError;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("Invalid upload: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("No file was uploaded")]
    MissingFile,

    #[error("Run {0} not found")]
    RunNotFound(Uuid),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Detect(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            AppError::Detect(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart { status, .. } => *status,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::RunNotFound(_) | AppError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show in the browser. Server-side failures keep their
    /// details in the log only.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let page = render::error_page(status, &self.public_message());
        (status, Html(page)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesafe_eye::MediaKind;

    #[test]
    fn test_user_errors_are_bad_requests() {
        let err: AppError = DetectError::UnsupportedExtension("gif".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = DetectError::UnexpectedMediaKind {
            expected: MediaKind::Video,
            actual: MediaKind::Image,
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("Expected video upload"));
    }

    #[test]
    fn test_not_found() {
        assert_eq!(AppError::RunNotFound(Uuid::new_v4()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::ArtifactNotFound("sample 7".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_io_message_is_sanitized() {
        let err = AppError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/var/secret/uploads denied",
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("/var/secret"));
    }

    #[test]
    fn test_multipart_keeps_status() {
        let err = AppError::Multipart {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
