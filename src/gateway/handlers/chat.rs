use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gateway::transcript::{image_url, TranscriptEntry};
use crate::gateway::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatResponse {
    reply: String,
    image: Option<String>,
}

/// `POST /api/chat`: run one turn and append it to the transcript.
pub(crate) async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "message must not be empty" })),
        )
            .into_response();
    }

    // Holding the agent lock across the transcript update keeps entries in
    // turn order.
    let mut agent = state.agent.lock().await;
    let reply = agent.run(message).await;
    let image = image_url(&reply, &state.visualizations_dir).await;
    {
        let mut transcript = state.transcript.write().await;
        transcript.push(TranscriptEntry::user(message));
        transcript.push(TranscriptEntry::assistant(reply.clone(), image.clone()));
    }
    drop(agent);

    info!(reply_len = reply.len(), image = ?image, "chat turn complete");
    Json(ChatResponse { reply, image }).into_response()
}

/// `GET /api/history`
pub(crate) async fn api_history(State(state): State<AppState>) -> impl IntoResponse {
    let transcript = state.transcript.read().await;
    Json(transcript.clone())
}

/// `GET /api/tools`
pub(crate) async fn api_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tools.as_ref().clone())
}
