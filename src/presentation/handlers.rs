// HTTP request handlers
use crate::application::errors::SessionError;
use crate::application::session_manager::SessionOptions;
use crate::application::transport::{ChunkSource, pump};
use crate::domain::point::Chunk;
use crate::infrastructure::chunked_frames::stream_from_receiver;
use crate::infrastructure::http_response::{
    accepts_brotli, error_response, json_response, or_status,
};
use crate::infrastructure::synthetic_source::{SyntheticRequest, SyntheticSource};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub offset: Option<i64>,
    pub chunk_size: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticStarted {
    pub request_id: String,
    pub total_points: Option<u64>,
    pub total_chunks: u32,
    pub resolution: u64,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Open a session ahead of its first chunk
pub async fn open_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    options: Option<Json<SessionOptions>>,
) -> Response {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    match state.sessions.open(&id, options) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn submit_chunk(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(chunk): Json<Chunk>,
) -> Response {
    match state.sessions.submit(&id, chunk).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn session_status(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.status(&id) {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Progressive event stream, one subscriber per session
pub async fn stream_events(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.subscribe(&id) {
        Ok(rx) => stream_from_receiver(rx, accepts_brotli(&headers)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn session_result(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.summary(&id) {
        Ok(summary) => or_status(json_response(&summary, accepts_brotli(&headers)).await),
        Err(e) => error_response(&e),
    }
}

/// One page of sample points
pub async fn session_sample(
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let offset = query.offset.unwrap_or(0);
    let chunk_size = query.chunk_size.unwrap_or(0);
    match state.sessions.fetch(&id, offset, chunk_size) {
        Ok(page) => or_status(json_response(&page, accepts_brotli(&headers)).await),
        Err(e) => error_response(&e),
    }
}

pub async fn cancel_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.cancel(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Feed generated points into the session in the background
pub async fn start_synthetic(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyntheticRequest>,
) -> Response {
    let source = SyntheticSource::new(&request);
    let started = SyntheticStarted {
        request_id: id.clone(),
        total_points: source.total_points(),
        total_chunks: source.total_chunks(),
        resolution: source.resolution(),
    };

    let options = SessionOptions {
        total_expected_points: source.total_points(),
        sample_cap: None,
    };
    if let Err(e) = state.sessions.open(&id, options) {
        return error_response(&e);
    }

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        match pump(&sessions, &id, source, None).await {
            Ok(chunks) => tracing::debug!(request_id = %id, chunks, "Synthetic feed finished"),
            Err(SessionError::Cancelled(_)) => {}
            Err(e) => e.log_error(&id),
        }
    });

    (StatusCode::ACCEPTED, Json(started)).into_response()
}
