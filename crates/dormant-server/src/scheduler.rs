//! Background timers: the delayed startup pass and the periodic janitor.

use crate::state::AppState;
use chrono::Utc;
use dormant_core::{MetadataJanitor, ReconcileOutcome, Reconciler, SuspensionController};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Run the first reconciliation pass once the startup delay has elapsed.
pub fn spawn_startup_reconcile(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let delay = state.activation.config().startup_delay();
        tokio::time::sleep(delay).await;
        match Reconciler::run(&state.activation, Utc::now()).await {
            Ok(ReconcileOutcome::Completed(report)) => {
                info!(target: "dormant::startup", "Startup reconciliation done ({} recreated)", report.recreated.len());
            }
            Ok(ReconcileOutcome::Skipped { reason }) => {
                debug!(target: "dormant::startup", "Startup reconciliation skipped: {:?}", reason);
            }
            Err(e) => warn!(target: "dormant::startup", "Startup reconciliation failed: {}", e),
        }
    })
}

/// Run [`tick`] on the janitor interval, forever.
pub fn spawn_janitor(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.activation.config().janitor_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the startup pass covers that moment.
        interval.tick().await;
        loop {
            interval.tick().await;
            tick(&state).await;
        }
    })
}

/// One periodic wake-up: reconcile, sweep, then suspend idle pages.
///
/// Each step logs its own failure so the next one still runs.
pub async fn tick(state: &AppState) {
    let ctx = &state.activation;
    let now = Utc::now();

    if let Err(e) = Reconciler::run(ctx, now).await {
        warn!(target: "dormant::reconcile", "Periodic reconciliation failed: {}", e);
    }
    if let Err(e) = MetadataJanitor::sweep(ctx, now).await {
        warn!(target: "dormant::janitor", "Janitor sweep failed: {}", e);
    }
    match SuspensionController::suspend_inactive(ctx, now).await {
        Ok(report) if !report.succeeded.is_empty() => {
            info!(target: "dormant::controller", "Auto-suspended {} idle pages", report.succeeded.len());
        }
        Ok(_) => {}
        Err(e) => warn!(target: "dormant::controller", "Auto-suspend failed: {}", e),
    }
}
