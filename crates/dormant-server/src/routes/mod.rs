//! HTTP route handlers.

pub mod messages;
pub mod pages;
pub mod suspension;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Routes mounted under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/message", post(messages::handle))
        .route("/state", get(suspension::get_state))
        .route("/reconcile", post(suspension::reconcile))
        .route("/janitor", post(suspension::sweep))
        .route("/pages", get(pages::list).post(pages::open))
        .route("/pages/{id}", delete(pages::close))
        .route("/health", get(health))
}
