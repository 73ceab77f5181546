//! Suspension state inspection and maintenance triggers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use dormant_core::{JanitorReport, MetadataJanitor, ReconcileOutcome, Reconciler, SuspensionState};
use std::sync::Arc;
use tracing::info;

pub async fn get_state(State(state): State<Arc<AppState>>) -> Result<Json<SuspensionState>, (StatusCode, String)> {
    state
        .activation
        .store()
        .load()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Ask for a reconciliation pass; the lease may decline it.
pub async fn reconcile(State(state): State<Arc<AppState>>) -> Result<Json<ReconcileOutcome>, (StatusCode, String)> {
    let outcome = Reconciler::run(&state.activation, Utc::now())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!(target: "dormant::api", "Manual reconciliation: {:?}", outcome);
    Ok(Json(outcome))
}

pub async fn sweep(State(state): State<Arc<AppState>>) -> Result<Json<JanitorReport>, (StatusCode, String)> {
    MetadataJanitor::sweep(&state.activation, Utc::now())
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
