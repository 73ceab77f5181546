//! Integration tests for the HTTP surface.
//!
//! Requests go through the real router over an in-process host and a
//! SQLite database in a temporary directory.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use dormant_core::SeedPage;
use dormant_server::{config::Config, routes, scheduler, state::AppState};
use dormant_types::Settings;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn create_test_app(seed: &[SeedPage]) -> (Router, Arc<AppState>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        port: 0,
        db_path: temp_dir.path().join("test.db"),
        ..Config::default()
    };
    let state = Arc::new(AppState::with_seed(config, seed).expect("Failed to create AppState"));
    let app = Router::new()
        .nest("/api", routes::api_router())
        .with_state(state.clone());
    (app, state, temp_dir)
}

fn page(url: &str) -> SeedPage {
    SeedPage {
        url: url.to_string(),
        title: url.to_string(),
        ..SeedPage::default()
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn message(app: &Router, body: Value) -> Value {
    let (status, value) = send(app, "POST", "/api/message", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    value
}

#[tokio::test]
async fn test_health() {
    let (app, _state, _dir) = create_test_app(&[]);
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_action_is_reported_in_body() {
    let (app, _state, _dir) = create_test_app(&[]);
    let body = message(&app, json!({"action": "teleport"})).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("teleport"));
}

#[tokio::test]
async fn test_suspend_restore_through_protocol() {
    let (app, state, _dir) = create_test_app(&[page("https://a.test/"), page("https://b.test/")]);

    let body = message(&app, json!({"action": "suspendTab", "tabId": 1})).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "suspended");
    let placeholder = body["placeholderUrl"].as_str().unwrap().to_string();
    assert_eq!(state.host.page(1).unwrap().url, placeholder);

    let (status, snapshot) = send(&app, "GET", "/api/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["active"]["1"]["originalUrl"], "https://a.test/");
    assert_eq!(snapshot["active"]["1"]["hostPageId"], 1);

    let body = message(&app, json!({"action": "restoreAllTabs"})).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["succeeded"], json!([1]));
    assert_eq!(state.host.page(1).unwrap().url, "https://a.test/");
}

#[tokio::test]
async fn test_group_suspension_moves_focus() {
    let mut reading = page("https://a.test/");
    reading.group = Some("Reading".into());
    reading.active = true;
    let mut also_reading = page("https://b.test/");
    also_reading.group = Some("Reading".into());
    let (app, state, _dir) = create_test_app(&[page("https://outside.test/"), reading, also_reading]);

    let group_id = state.host.page(2).unwrap().group_id.unwrap();
    let body = message(&app, json!({"action": "suspendTabGroup", "groupId": group_id})).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["succeeded"], json!([2, 3]));
    assert_eq!(body["focusMovedTo"], 1);
    assert!(state.host.page(1).unwrap().active);

    let body = message(&app, json!({"action": "restoreTabGroup", "groupId": group_id})).await;
    assert_eq!(body["succeeded"], json!([2, 3]));
}

#[tokio::test]
async fn test_closed_placeholder_is_recreated_on_next_request() {
    let (app, state, _dir) = create_test_app(&[page("https://a.test/")]);
    message(&app, json!({"action": "suspendTab", "tabId": 1})).await;

    let (status, _) = send(&app, "DELETE", "/api/pages/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The suspend request above completed a pass; the lease is cooling down.
    let (_, outcome) = send(&app, "POST", "/api/reconcile", None).await;
    assert_eq!(outcome["status"], "skipped");
    assert_eq!(outcome["reason"], "coolingDown");

    state.activation.lease().reset_cooldown();
    let (status, outcome) = send(&app, "POST", "/api/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "completed");
    assert_eq!(outcome["recreated"][0]["oldId"], 1);
    let new_id = outcome["recreated"][0]["newId"].as_i64().unwrap();

    let (_, pages) = send(&app, "GET", "/api/pages", None).await;
    let pages = pages.as_array().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["id"], new_id);
    assert!(state.activation.is_placeholder(pages[0]["url"].as_str().unwrap()));
}

#[tokio::test]
async fn test_lost_pages_reopen_as_ordinary_pages() {
    let (app, state, _dir) = create_test_app(&[page("https://a.test/")]);
    message(&app, json!({"action": "suspendTab", "tabId": 1})).await;
    send(&app, "DELETE", "/api/pages/1", None).await;

    state.host.set_fail_page_creation(true);
    state.activation.lease().reset_cooldown();
    let (_, outcome) = send(&app, "POST", "/api/reconcile", None).await;
    assert_eq!(outcome["demoted"], 1);
    state.host.set_fail_page_creation(false);

    let (_, snapshot) = send(&app, "GET", "/api/state", None).await;
    assert_eq!(snapshot["lost"][0]["originalUrl"], "https://a.test/");
    assert_eq!(snapshot["lost"][0]["lastHostPageId"], 1);

    let body = message(&app, json!({"action": "restoreLostTabs"})).await;
    assert_eq!(body["success"], true);
    let reopened = body["succeeded"][0].as_i64().unwrap();
    assert_eq!(state.host.page(reopened).unwrap().url, "https://a.test/");

    let (_, snapshot) = send(&app, "GET", "/api/state", None).await;
    assert_eq!(snapshot["lost"], json!([]));
}

#[tokio::test]
async fn test_whitelist_round_trip() {
    let (app, _state, _dir) = create_test_app(&[page("https://www.docs.test/guide")]);

    let body = message(&app, json!({"action": "addToWhitelist", "tabId": 1})).await;
    assert_eq!(body["pattern"], "docs.test");

    let body = message(&app, json!({"action": "suspendTab", "tabId": 1})).await;
    assert_eq!(body["outcome"], "skipped");
    assert_eq!(body["reason"], "whitelisted");

    let body = message(&app, json!({"action": "removeFromWhitelist", "pattern": "docs.test"})).await;
    assert_eq!(body["changed"], true);
    let body = message(&app, json!({"action": "getWhitelist"})).await;
    assert_eq!(body["whitelist"], json!([]));
}

#[tokio::test]
async fn test_periodic_tick_suspends_idle_pages() {
    let (_app, state, _dir) = create_test_app(&[page("https://idle.test/"), page("https://busy.test/")]);
    state
        .host
        .edit_page(1, |p| p.last_accessed = Some(Utc::now() - Duration::hours(1)))
        .unwrap();
    state
        .activation
        .save_settings(&Settings {
            auto_suspend_after_minutes: Some(30),
            ..Settings::default()
        })
        .unwrap();

    scheduler::tick(&state).await;

    assert!(state.activation.is_placeholder(&state.host.page(1).unwrap().url));
    assert_eq!(state.host.page(2).unwrap().url, "https://busy.test/");
    let snapshot = state.activation.store().load().unwrap();
    assert_eq!(snapshot.active.len(), 1);
}
