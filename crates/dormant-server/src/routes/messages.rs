//! Request/response protocol endpoint.

use crate::state::AppState;
use axum::{extract::State, Json};
use dormant_types::Response;
use serde_json::Value;
use std::sync::Arc;

/// Always answers 200: failures are reported in the body as `{ success: false, error }`.
pub async fn handle(State(state): State<Arc<AppState>>, Json(message): Json<Value>) -> Json<Response> {
    Json(dormant_core::handle_message(&state.activation, message).await)
}
