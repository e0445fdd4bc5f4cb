//! HTTP routes: the upload endpoint and a health probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::request::RawUpload;
use crate::error::{AiServiceError, Error, ExtractionError, ValidationError};
use crate::pipeline::{ProcessingFailure, UploadProcessor};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<UploadProcessor>,
}

/// Build the Axum router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate))
        // Older clients post here.
        .route("/api/generate-tickets", post(generate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ticketsmith"
    }))
}

// ── Upload ──────────────────────────────────────────────────────────────

async fn generate(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("upload", %request_id);
    handle_upload(state, multipart).instrument(span).await
}

async fn handle_upload(state: AppState, multipart: Multipart) -> Response {
    let request = match RawUpload::from_multipart(multipart)
        .await
        .and_then(RawUpload::validate)
    {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected upload");
            return error_response(ProcessingFailure {
                error: e.into(),
                partial: None,
            });
        }
    };

    info!(
        host = request.destination.base_url.host_str().unwrap_or_default(),
        project = %request.destination.project_key,
        mime_type = %request.mime_type,
        bytes = request.payload.len(),
        "Processing upload"
    );

    match state.processor.process(request).await {
        Ok(payload) => {
            info!(
                epics = payload.stats.epics,
                stories = payload.stats.stories,
                "Upload processed"
            );
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(failure) => error_response(failure),
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(ValidationError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Extraction(ExtractionError::OcrUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Extraction(ExtractionError::OcrFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::AiService(AiServiceError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        Error::AiService(_) => StatusCode::BAD_GATEWAY,
        Error::AiFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Tracker(_) => StatusCode::BAD_GATEWAY,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Upstream detail worth showing the caller, if any.
fn detail_for(err: &Error) -> Option<String> {
    match err {
        Error::AiFormat(e) => Some(e.raw.clone()),
        Error::AiService(AiServiceError::Status { body, .. }) if !body.is_empty() => {
            Some(body.clone())
        }
        Error::Tracker(e) => e.detail().map(str::to_string),
        _ => None,
    }
}

/// Render a failure as `{message, error}`, plus the partial hierarchy when there is one.
pub fn error_response(failure: ProcessingFailure) -> Response {
    let ProcessingFailure { error: err, partial } = failure;
    let status = status_for(&err);
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Upload failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Upload failed");
    }

    let message = match &partial {
        Some(p) => p.message.clone(),
        None => inner_message(&err),
    };
    let mut body = json!({
        "message": message,
        "error": detail_for(&err).unwrap_or_else(|| err.to_string()),
    });
    if let (Some(p), Value::Object(map)) = (partial, &mut body) {
        map.insert("stats".into(), json!(p.stats));
        map.insert("jira".into(), json!(p.jira));
        if !p.warnings.is_empty() {
            map.insert("warnings".into(), json!(p.warnings));
        }
    }
    (status, Json(body)).into_response()
}

/// The wrapped error's own message, without the category prefix.
fn inner_message(err: &Error) -> String {
    match err {
        Error::Config(e) => e.to_string(),
        Error::Validation(e) => e.to_string(),
        Error::Extraction(e) => e.to_string(),
        Error::AiService(e) => e.to_string(),
        Error::AiFormat(e) => e.to_string(),
        Error::Tracker(e) => e.to_string(),
    }
}
