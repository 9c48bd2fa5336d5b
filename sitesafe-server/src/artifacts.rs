//! File responses for run artifacts
//!
//! Paths always come from the run registry, never from the request, so a
//! client can only reach files that belong to a known run.

use crate::error::AppError;
use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use sitesafe_eye::media::mime_type;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Name offered for the processed video download
pub const DOWNLOAD_FILE_NAME: &str = "processed_video.mp4";

/// MIME type offered for the processed video download
pub const DOWNLOAD_MIME: &str = "video/mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment(&'static str),
}

impl Disposition {
    fn header_value(self) -> String {
        match self {
            Disposition::Inline => "inline".to_string(),
            Disposition::Attachment(name) => format!("attachment; filename=\"{}\"", name),
        }
    }
}

/// Serve a file, guessing its content type from the extension
pub async fn serve_file(path: &Path, disposition: Disposition) -> Result<Response<Body>, AppError> {
    file_response(path, mime_type(path), disposition).await
}

pub async fn file_response(
    path: &Path,
    content_type: &str,
    disposition: Disposition,
) -> Result<Response<Body>, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::ArtifactNotFound(file_label(path)),
        _ => AppError::Io(e),
    })?;
    debug!("Serving {:?} ({} bytes)", path, bytes.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CONTENT_DISPOSITION, disposition.header_value())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Io(std::io::Error::new(ErrorKind::Other, e.to_string())))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_serve_file_sets_headers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("frame.png");
        std::fs::write(&path, b"png").unwrap();

        let response = serve_file(&path, Disposition::Inline).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");
    }

    #[tokio::test]
    async fn test_attachment_disposition() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("upload.avi");
        std::fs::write(&path, b"avi").unwrap();

        let response = file_response(&path, DOWNLOAD_MIME, Disposition::Attachment(DOWNLOAD_FILE_NAME))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"processed_video.mp4\""
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = serve_file(&temp_dir.path().join("gone.jpg"), Disposition::Inline).await;
        assert!(matches!(result, Err(AppError::ArtifactNotFound(name)) if name == "gone.jpg"));
    }
}
