//! Request/response message handling.

use crate::context::Activation;
use crate::controller::SuspensionController;
use crate::host::HostPlatform;
use crate::reconciler::Reconciler;
use crate::whitelist;
use crate::{DormantError, Result};
use chrono::Utc;
use dormant_types::{PageId, Request, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhitelistChange<'a> {
    pattern: &'a str,
    changed: bool,
    whitelist: &'a [String],
}

#[derive(Debug, Serialize)]
struct WhitelistView<'a> {
    whitelist: &'a [String],
}

/// Handle one protocol message, never failing: errors become `{ success: false, error }`.
///
/// A reconciliation pass runs first so the action sees reconciled state.
pub async fn handle_message<H: HostPlatform>(ctx: &Activation<H>, message: Value) -> Response {
    let request = match parse_request(message) {
        Ok(request) => request,
        Err(e) => {
            warn!(target: "dormant::api", "Rejected message: {}", e);
            return Response::failure(e.to_string());
        }
    };
    debug!(target: "dormant::api", "Handling {:?}", request);

    if let Err(e) = Reconciler::run(ctx, Utc::now()).await {
        warn!(target: "dormant::reconcile", "Reconciliation before request failed: {}", e);
    }

    match execute(ctx, &request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(target: "dormant::api", "{:?} failed: {}", request, e);
            if is_restore(&request) {
                if let Err(notify_err) = ctx.host().notify("Could not restore", &e.to_string()).await {
                    warn!(target: "dormant::api", "Failed to show notification: {}", notify_err);
                }
            }
            Response::failure(e.to_string())
        }
    }
}

/// Decode a message, telling unknown actions apart from malformed ones.
pub fn parse_request(message: Value) -> Result<Request> {
    let action = message
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| DormantError::InvalidRequest("missing 'action'".to_string()))?;
    if !Request::is_known_action(action) {
        return Err(DormantError::UnknownAction(action.to_string()));
    }
    serde_json::from_value(message).map_err(|e| DormantError::InvalidRequest(e.to_string()))
}

async fn execute<H: HostPlatform>(ctx: &Activation<H>, request: &Request) -> Result<Response> {
    let response = match request {
        Request::SuspendTab { tab_id } => Response::with_payload(&SuspensionController::suspend(ctx, *tab_id).await?),
        Request::RestoreTab { tab_id } => Response::with_payload(&SuspensionController::restore(ctx, *tab_id).await?),
        Request::SuspendTabGroup { group_id } => {
            Response::with_payload(&SuspensionController::suspend_group(ctx, *group_id).await?)
        }
        Request::RestoreTabGroup { group_id } => {
            Response::with_payload(&SuspensionController::restore_group(ctx, *group_id).await?)
        }
        Request::RestoreAllTabs => Response::with_payload(&SuspensionController::restore_all(ctx).await?),
        Request::RestoreLostTabs => Response::with_payload(&SuspensionController::restore_all_lost(ctx).await?),
        Request::SuspendInactive => {
            Response::with_payload(&SuspensionController::suspend_inactive(ctx, Utc::now()).await?)
        }
        Request::AddToWhitelist { pattern, tab_id } => {
            let pattern = resolve_pattern(ctx, pattern.as_deref(), *tab_id).await?;
            let _metadata = ctx.metadata_lock().await;
            let mut settings = ctx.settings()?;
            let changed = settings.add_whitelist_pattern(&pattern);
            if changed {
                ctx.save_settings(&settings)?;
            }
            Response::with_payload(&WhitelistChange {
                pattern: &pattern,
                changed,
                whitelist: &settings.whitelist,
            })
        }
        Request::RemoveFromWhitelist { pattern } => {
            let _metadata = ctx.metadata_lock().await;
            let mut settings = ctx.settings()?;
            let changed = settings.remove_whitelist_pattern(pattern);
            if changed {
                ctx.save_settings(&settings)?;
            }
            Response::with_payload(&WhitelistChange {
                pattern,
                changed,
                whitelist: &settings.whitelist,
            })
        }
        Request::GetWhitelist => {
            let settings = ctx.settings()?;
            Response::with_payload(&WhitelistView {
                whitelist: &settings.whitelist,
            })
        }
        Request::GetSuspendedState => Response::with_payload(&ctx.store().load()?),
    };
    Ok(response)
}

/// The explicit pattern, else one derived from the page's (original) URL.
async fn resolve_pattern<H: HostPlatform>(
    ctx: &Activation<H>,
    pattern: Option<&str>,
    tab_id: Option<PageId>,
) -> Result<String> {
    if let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(pattern.to_string());
    }
    let id = tab_id.ok_or_else(|| DormantError::InvalidRequest("addToWhitelist needs a pattern or tabId".to_string()))?;
    let page = ctx.host().get_page(id).await?;
    let url = match ctx.placeholder_params(&page.url) {
        Some(params) if !params.url.is_empty() => params.url,
        _ => page.url,
    };
    whitelist::pattern_for_url(&url)
        .ok_or_else(|| DormantError::InvalidRequest(format!("cannot derive a whitelist pattern from '{}'", url)))
}

fn is_restore(request: &Request) -> bool {
    matches!(
        request,
        Request::RestoreTab { .. }
            | Request::RestoreTabGroup { .. }
            | Request::RestoreAllTabs
            | Request::RestoreLostTabs
    )
}
