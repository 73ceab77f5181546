//! Direct control of the in-process host, standing in for a user at the browser.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dormant_types::{LivePage, PageId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<LivePage>> {
    Json(state.host.pages())
}

#[derive(Deserialize)]
pub struct OpenPageRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenPageRequest>,
) -> Result<Json<LivePage>, (StatusCode, String)> {
    let id = state.host.open_page(&req.url, &req.title);
    info!(target: "dormant::api", "Opened page {} at {}", id, req.url);
    state
        .host
        .page(id)
        .map(Json)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, format!("page {} vanished", id)))
}

/// Close a page out from under the engine.
pub async fn close(State(state): State<Arc<AppState>>, Path(id): Path<PageId>) -> StatusCode {
    if state.host.close_page(id) {
        info!(target: "dormant::api", "Closed page {}", id);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
