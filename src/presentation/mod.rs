// Presentation layer - HTTP routes over the session manager
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    cancel_session, health_check, open_session, session_result, session_sample, session_status,
    start_synthetic, stream_events, submit_chunk,
};
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/sessions/:id", put(open_session).get(session_status).delete(cancel_session))
        .route("/sessions/:id/chunks", post(submit_chunk))
        .route("/sessions/:id/events", get(stream_events))
        .route("/sessions/:id/result", get(session_result))
        .route("/sessions/:id/sample", get(session_sample))
        .route("/sessions/:id/synthetic", post(start_synthetic))
        .with_state(state)
}
