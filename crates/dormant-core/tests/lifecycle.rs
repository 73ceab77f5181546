//! End-to-end suspension lifecycle across simulated process restarts.
//!
//! Each "restart" opens fresh stores over the same SQLite file and a fresh
//! reconciliation lease, while the host keeps its pages, mirroring a
//! background process being torn down between wake-ups.

use chrono::{Duration, Utc};
use dormant_core::{
    Activation, HostPlatform, KeyValueStore, MemoryHost, MetadataJanitor, ReconcileLease, ReconcileOutcome, Reconciler,
    SqliteKvStore, SuspendOutcome, SuspensionConfig, SuspensionController, LOCAL_SCOPE, SUSPENDED_STATE_KEY,
    SYNC_QUOTA_BYTES_PER_ITEM, SYNC_SCOPE,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// Start a process against the database in `dir`.
fn boot(dir: &TempDir, host: &Arc<MemoryHost>) -> Activation<MemoryHost> {
    let db = dir.path().join("dormant.db");
    let config = SuspensionConfig::default();
    let local = Arc::new(SqliteKvStore::open(&db, LOCAL_SCOPE).unwrap());
    let sync = Arc::new(
        SqliteKvStore::open(&db, SYNC_SCOPE)
            .unwrap()
            .with_quota(SYNC_QUOTA_BYTES_PER_ITEM),
    );
    let lease = Arc::new(ReconcileLease::new(config.lease_ttl(), config.reconcile_cooldown()));
    Activation::new(host.clone(), local, sync, config, lease)
}

async fn reconcile(ctx: &Activation<MemoryHost>) -> dormant_core::ReconcileReport {
    match Reconciler::run(ctx, Utc::now()).await.unwrap() {
        ReconcileOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {:?}", other),
    }
}

#[tokio::test]
async fn test_suspended_page_survives_restart() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let id = host.open_page("https://a.test/article", "Article");

    let first = boot(&dir, &host);
    let outcome = SuspensionController::suspend(&first, id).await.unwrap();
    assert!(matches!(outcome, SuspendOutcome::Suspended { .. }));
    drop(first);

    let second = boot(&dir, &host);
    let report = reconcile(&second).await;
    assert!(report.is_noop());
    assert_eq!(host.pages_created(), 0);

    let state = second.store().load().unwrap();
    assert_eq!(state.active.len(), 1);
    assert_eq!(state.record(id).unwrap().original_url, "https://a.test/article");

    SuspensionController::restore(&second, id).await.unwrap();
    assert_eq!(host.page(id).unwrap().url, "https://a.test/article");
    assert!(boot(&dir, &host).store().load().unwrap().active.is_empty());
}

#[tokio::test]
async fn test_orphan_is_recreated_exactly_once() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let id = host.open_page("https://a.test/", "a");
    SuspensionController::suspend(&boot(&dir, &host), id).await.unwrap();
    host.close_page(id);

    let report = reconcile(&boot(&dir, &host)).await;
    assert_eq!(report.recreated.len(), 1);
    let new_id = report.recreated[0].new_id;
    assert_ne!(new_id, id);

    // A second process sees the recreated placeholder and does nothing.
    let report = reconcile(&boot(&dir, &host)).await;
    assert!(report.is_noop());
    assert_eq!(host.pages_created(), 1);

    let state = boot(&dir, &host).store().load().unwrap();
    assert_eq!(state.active.keys().copied().collect::<Vec<_>>(), vec![new_id]);
    assert!(state.record(new_id).unwrap().recreated_at.is_some());
}

#[tokio::test]
async fn test_overlapping_triggers_run_one_pass() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let id = host.open_page("https://a.test/", "a");
    let ctx = boot(&dir, &host);
    SuspensionController::suspend(&ctx, id).await.unwrap();
    host.close_page(id);

    let now = Utc::now();
    let startup = ctx.clone();
    let user = ctx.clone();
    let (a, b) = tokio::join!(Reconciler::run(&startup, now), Reconciler::run(&user, now));
    let completed = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|o| matches!(o, ReconcileOutcome::Completed(_)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(host.pages_created(), 1);
    assert_eq!(ctx.store().load().unwrap().active.len(), 1);
}

#[tokio::test]
async fn test_browser_session_restore_closes_duplicates() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let a = host.open_page("https://a.test/", "a");
    let b = host.open_page("https://b.test/", "b");
    let ctx = boot(&dir, &host);
    let placeholder_a = match SuspensionController::suspend(&ctx, a).await.unwrap() {
        SuspendOutcome::Suspended { placeholder_url } => placeholder_url,
        other => panic!("unexpected {:?}", other),
    };
    let placeholder_b = match SuspensionController::suspend(&ctx, b).await.unwrap() {
        SuspendOutcome::Suspended { placeholder_url } => placeholder_url,
        other => panic!("unexpected {:?}", other),
    };
    drop(ctx);

    // The browser restarts: every page comes back under a new id, and the
    // session restore also reopened `a` as an ordinary page.
    host.close_page(a);
    host.close_page(b);
    let new_a = host.open_page(&placeholder_a, "a");
    let new_b = host.open_page(&placeholder_b, "b");
    let live_a = host.open_page("https://a.test/", "a");

    let ctx = boot(&dir, &host);
    let report = reconcile(&ctx).await;
    assert!(report.session_restore);
    assert_eq!(report.healed, 2);
    assert_eq!(report.duplicates_closed, 1);
    assert!(report.recreated.is_empty());
    assert_eq!(host.pages_created(), 0);

    assert!(host.page(new_a).is_none());
    assert!(host.page(live_a).is_some());
    let state = ctx.store().load().unwrap();
    assert!(state.record(new_a).is_none());
    assert_eq!(state.record(new_b).unwrap().original_url, "https://b.test/");
}

#[tokio::test]
async fn test_failed_recreation_then_restore_all_lost() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let a = host.open_page("https://a.test/", "a");
    let b = host.open_page("https://b.test/", "b");
    let ctx = boot(&dir, &host);
    SuspensionController::suspend(&ctx, a).await.unwrap();
    SuspensionController::suspend(&ctx, b).await.unwrap();
    host.close_page(a);
    host.close_page(b);

    host.set_fail_page_creation(true);
    let report = reconcile(&boot(&dir, &host)).await;
    assert_eq!(report.demoted, 2);

    let state = boot(&dir, &host).store().load().unwrap();
    assert!(state.active.is_empty());
    let lost: Vec<_> = state.lost.iter().map(|e| e.last_host_page_id).collect();
    assert_eq!(lost, vec![a, b]);

    host.set_fail_page_creation(false);
    let ctx = boot(&dir, &host);
    let report = SuspensionController::restore_all_lost(&ctx).await.unwrap();
    assert_eq!(report.succeeded.len(), 2);
    for id in report.succeeded {
        let page = host.get_page(id).await.unwrap();
        assert!(!ctx.is_placeholder(&page.url));
    }
    assert!(ctx.store().load().unwrap().lost.is_empty());
}

#[tokio::test]
async fn test_janitor_demotes_then_expires() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let id = host.open_page("https://a.test/", "a");
    let ctx = boot(&dir, &host);
    SuspensionController::suspend(&ctx, id).await.unwrap();
    host.close_page(id);

    let now = Utc::now();
    let report = MetadataJanitor::sweep(&ctx, now).await.unwrap();
    assert!(report.is_noop(), "still inside the grace window");

    let later = now + Duration::minutes(6);
    let report = MetadataJanitor::sweep(&ctx, later).await.unwrap();
    assert_eq!(report.demoted, vec![id]);

    let report = MetadataJanitor::sweep(&ctx, later + Duration::days(6) + Duration::hours(23)).await.unwrap();
    assert_eq!(report.pruned, 0);

    let report = MetadataJanitor::sweep(&ctx, later + Duration::days(7) + Duration::seconds(1)).await.unwrap();
    assert_eq!(report.pruned, 1);
    assert!(boot(&dir, &host).store().load().unwrap().lost.is_empty());
}

#[tokio::test]
async fn test_damaged_record_does_not_block_later_wakeups() {
    let dir = TempDir::new().unwrap();
    let host = Arc::new(MemoryHost::new());
    let kept = host.open_page("https://kept.test/", "kept");
    let fresh = host.open_page("https://new.test/", "new");
    let ctx = boot(&dir, &host);
    let placeholder = match SuspensionController::suspend(&ctx, kept).await.unwrap() {
        SuspendOutcome::Suspended { placeholder_url } => placeholder_url,
        other => panic!("unexpected {:?}", other),
    };
    drop(ctx);

    // A collaborator sharing the local scope writes a record missing `suspendedAt`.
    let raw = SqliteKvStore::open(&dir.path().join("dormant.db"), LOCAL_SCOPE).unwrap();
    let mut envelope = raw.get(SUSPENDED_STATE_KEY).unwrap().unwrap();
    envelope["active"]["99"] = json!({"hostPageId": 99, "originalUrl": "https://bad.test/"});
    raw.set(SUSPENDED_STATE_KEY, &envelope).unwrap();

    let ctx = boot(&dir, &host);
    reconcile(&ctx).await;
    let outcome = SuspensionController::suspend(&ctx, fresh).await.unwrap();
    assert!(matches!(outcome, SuspendOutcome::Suspended { .. }));
    assert!(ctx.is_placeholder(&host.page(fresh).unwrap().url));
    assert_eq!(host.page(kept).unwrap().url, placeholder);

    let state = ctx.store().load().unwrap();
    assert_eq!(state.record(kept).unwrap().original_url, "https://kept.test/");
    assert_eq!(state.record(fresh).unwrap().original_url, "https://new.test/");
}
