use axum::{extract::State, response::IntoResponse, Json};

use crate::gateway::AppState;

/// `GET /api/status`
pub(crate) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
        "tools": state.tools.len(),
    }))
}
