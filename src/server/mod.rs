//! HTTP surface: `POST /upload`, `POST /ask`, `GET /health`.
//!
//! Handlers share one [`AppState`] behind an `Arc`. The router is built by
//! [`router`] so tests can drive it with `tower::ServiceExt::oneshot`
//! without binding a socket.

pub mod handlers;
pub mod models;
pub mod state;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use models::ApiError;
pub use state::AppState;

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/ask", post(handlers::ask::ask))
        .route("/health", get(handlers::health::health))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
