// HTTP routes for the upload pages, run artifacts and the status API

use crate::artifacts::{file_response, serve_file, Disposition, DOWNLOAD_FILE_NAME, DOWNLOAD_MIME};
use crate::blog::blog_page;
use crate::error::AppError;
use crate::render;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::Response,
    response::{Html, IntoResponse, Json, Redirect},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitesafe_eye::{DetectionPipeline, MediaKind, PipelineState, PpeCategory, RunRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DetectionPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<DetectionPipeline>) -> Self {
        Self { pipeline }
    }

    fn run(&self, id: Uuid) -> Result<Arc<RunRecord>, AppError> {
        self.pipeline.runs().get(id).ok_or(AppError::RunNotFound(id))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// JSON view of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: Uuid,
    pub kind: MediaKind,
    pub state: PipelineState,
    pub detected_labels: BTreeSet<String>,
    pub sample_frames: usize,
    /// Presence per PPE category; absent when no verdict applies
    pub detection_info: Option<BTreeMap<PpeCategory, bool>>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&RunRecord> for RunStatus {
    fn from(run: &RunRecord) -> Self {
        Self {
            id: run.id,
            kind: run.kind,
            state: run.state,
            detected_labels: run
                .result
                .as_ref()
                .map(|r| r.detected_labels.clone())
                .unwrap_or_default(),
            sample_frames: run.result.as_ref().map(|r| r.sample_frame_paths.len()).unwrap_or(0),
            detection_info: run.verdict.as_ref().map(|v| v.detection_info().clone()),
            message: run.verdict.as_ref().map(|v| v.message()),
            error: run.error.clone(),
            created_at: run.created_at,
        }
    }
}

/// Build the application router. Request bodies above `max_upload_bytes`
/// are rejected before they reach a handler.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let pages = Router::new()
        .route("/", get(|| async { Redirect::to("/video") }))
        .route("/video", get(video_page_handler).post(video_upload_handler))
        .route("/image", get(image_page_handler).post(image_upload_handler))
        .route("/blog", get(blog_handler));

    let artifacts = Router::new()
        .route("/runs/:id/input", get(input_handler))
        .route("/runs/:id/output", get(output_handler))
        .route("/runs/:id/download", get(download_handler))
        .route("/runs/:id/samples/:index", get(sample_handler));

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/runs/:id", get(run_status_handler));

    pages
        .merge(artifacts)
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

async fn video_page_handler(State(state): State<AppState>) -> Html<String> {
    let scope = state.pipeline.config().verdict.video_scope;
    Html(render::upload_page(MediaKind::Video, scope))
}

async fn image_page_handler(State(state): State<AppState>) -> Html<String> {
    let scope = state.pipeline.config().verdict.video_scope;
    Html(render::upload_page(MediaKind::Image, scope))
}

async fn blog_handler() -> Html<String> {
    Html(blog_page())
}

async fn video_upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    handle_upload(state, multipart, MediaKind::Video).await
}

async fn image_upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    handle_upload(state, multipart, MediaKind::Image).await
}

/// Persist the uploaded file and run detection. Detection failures still
/// render the result page, which reports them.
async fn handle_upload(
    state: AppState,
    mut multipart: Multipart,
    kind: MediaKind,
) -> Result<Html<String>, AppError> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    info!("Received {} upload {:?} ({} bytes)", kind, file_name, bytes.len());

    let run = state.pipeline.submit(&bytes, &file_name, kind).await?;
    if run.state == PipelineState::Failed {
        warn!("Run {} failed; rendering error page", run.id);
    }
    Ok(Html(render::result_page(&run)))
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(AppError::MissingFile),
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(AppError::MissingFile)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Multipart {
        status: err.status(),
        message: err.body_text(),
    }
}

async fn input_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response<Body>, AppError> {
    let run = state.run(id)?;
    serve_file(&run.upload.path, Disposition::Inline).await
}

async fn output_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response<Body>, AppError> {
    let run = state.run(id)?;
    let result = run
        .result
        .as_ref()
        .ok_or_else(|| AppError::ArtifactNotFound(format!("output of run {}", id)))?;
    serve_file(&result.annotated_media_path, Disposition::Inline).await
}

async fn download_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response<Body>, AppError> {
    let run = state.run(id)?;
    let result = match (&run.result, run.kind) {
        (Some(result), MediaKind::Video) => result,
        _ => return Err(AppError::ArtifactNotFound(format!("processed video of run {}", id))),
    };
    file_response(
        &result.annotated_media_path,
        DOWNLOAD_MIME,
        Disposition::Attachment(DOWNLOAD_FILE_NAME),
    )
    .await
}

async fn sample_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response<Body>, AppError> {
    let run = state.run(id)?;
    let path = run
        .sample_frame(index)
        .ok_or_else(|| AppError::ArtifactNotFound(format!("sample {} of run {}", index, id)))?;
    serve_file(path, Disposition::Inline).await
}

async fn run_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let run = state.run(id)?;
    Ok(Json(RunStatus::from(run.as_ref())))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
