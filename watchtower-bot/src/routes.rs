use crate::AppState;
use crate::status::StatusReport;

use axum::{Json, extract::State};
use axum_macros::debug_handler;
use std::sync::Arc;

#[debug_handler]
pub(crate) async fn status(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(state.status.report())
}

pub(crate) async fn health() -> &'static str {
    "OK"
}
