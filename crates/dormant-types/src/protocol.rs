//! Request/response message protocol exposed to collaborators (UI, dashboards).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{GroupId, PageId};

/// Requests accepted by the suspension engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    SuspendTab { tab_id: PageId },
    RestoreTab { tab_id: PageId },
    SuspendTabGroup { group_id: GroupId },
    RestoreTabGroup { group_id: GroupId },
    /// Restore every live placeholder.
    RestoreAllTabs,
    /// Reopen every lost entry as an ordinary page.
    RestoreLostTabs,
    /// Whitelist either an explicit pattern or the host of a live page.
    AddToWhitelist {
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        tab_id: Option<PageId>,
    },
    RemoveFromWhitelist { pattern: String },
    GetWhitelist,
    GetSuspendedState,
    SuspendInactive,
}

impl Request {
    /// Every action name understood by [`Request`].
    pub const ACTIONS: &'static [&'static str] = &[
        "suspendTab",
        "restoreTab",
        "suspendTabGroup",
        "restoreTabGroup",
        "restoreAllTabs",
        "restoreLostTabs",
        "addToWhitelist",
        "removeFromWhitelist",
        "getWhitelist",
        "getSuspendedState",
        "suspendInactive",
    ];

    pub fn is_known_action(action: &str) -> bool {
        Self::ACTIONS.contains(&action)
    }
}

/// Reply to a [`Request`]: `{ success, error?, ...payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    /// A successful reply with no payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            payload: Map::new(),
        }
    }

    /// A successful reply whose payload fields are taken from `payload`.
    ///
    /// Payloads that do not serialize to a JSON object are placed under `result`.
    pub fn with_payload<T: Serialize>(payload: &T) -> Self {
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
            Err(e) => return Self::failure(format!("Failed to encode response: {}", e)),
        };
        Self {
            success: true,
            error: None,
            payload,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            payload: Map::new(),
        }
    }
}
