pub mod alert;
pub mod config;
mod error;
mod routes;
pub mod scanner;
pub mod session;
pub mod status;
pub mod suppressor;

pub use error::AlertError;

use axum::{Router, http::StatusCode, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::status::BotStatus;

pub struct AppState {
    pub status: Arc<BotStatus>,
}

/// Create the status router. Read-only: handlers never touch bot state.
pub fn create_app(status: Arc<BotStatus>, request_timeout: Duration) -> Router {
    let state = Arc::new(AppState { status });

    Router::new()
        .route("/", get(routes::status))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(state)
}
