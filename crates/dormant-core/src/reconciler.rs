//! Reconciliation of live pages, persisted metadata and working state.
//!
//! One pass runs, in order: self-heal (via [`LiveTabIndex::refresh`]),
//! session-restore classification, then either duplicate resolution (bulk
//! session restore) or orphan recreation, and finally a single persist of
//! whatever changed. Passes are serialized by the activation's
//! [`crate::ReconcileLease`].

use crate::context::Activation;
use crate::host::HostPlatform;
use crate::lease::LeaseDenied;
use crate::live_index::LiveTabIndex;
use crate::state::SuspensionState;
use crate::Result;
use chrono::{DateTime, Utc};
use dormant_types::{CreatePage, GroupId, LivePage, PageId, SuspendedPageRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Outcome of the session-restore check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRestoreCheck {
    /// Distinct original URLs represented by live placeholders.
    pub placeholder_urls: usize,
    /// How many of those are also open as ordinary pages.
    pub overlap: usize,
    pub ratio: f64,
    pub is_session_restore: bool,
}

/// A placeholder reopened under a new page id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recreation {
    pub old_id: PageId,
    pub new_id: PageId,
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

/// What one completed pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub healed: usize,
    pub session_restore: bool,
    pub overlap_ratio: f64,
    pub recreated: Vec<Recreation>,
    /// Orphaned records dropped because another live placeholder already carries the URL.
    pub stale_dropped: usize,
    /// Orphaned records moved to the lost list because recreation failed.
    pub demoted: usize,
    /// Placeholders closed in favour of a live ordinary duplicate.
    pub duplicates_closed: usize,
    /// Ordinary pages moved into a suspended duplicate's group.
    pub regrouped: usize,
    pub persisted: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.healed == 0
            && self.recreated.is_empty()
            && self.stale_dropped == 0
            && self.demoted == 0
            && self.duplicates_closed == 0
            && self.regrouped == 0
    }
}

/// Result of asking for a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReconcileOutcome {
    Completed(ReconcileReport),
    Skipped { reason: LeaseDenied },
}

/// Old group id -> group the pass actually placed pages in.
type GroupRemap = HashMap<GroupId, GroupId>;

pub struct Reconciler;

impl Reconciler {
    /// Run one pass unless another is in flight or one completed within the cooldown.
    pub async fn run<H: HostPlatform>(ctx: &Activation<H>, now: DateTime<Utc>) -> Result<ReconcileOutcome> {
        let guard = match ctx.lease().try_acquire(now) {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(target: "dormant::reconcile", "Skipping reconciliation: {:?}", reason);
                return Ok(ReconcileOutcome::Skipped { reason });
            }
        };

        // An error drops the guard, releasing the lease without a cooldown.
        let report = Self::pass(ctx, now).await?;
        guard.complete(now);

        if !report.is_noop() {
            info!(
                target: "dormant::reconcile",
                "Reconciled: healed={} recreated={} stale={} demoted={} duplicates_closed={} session_restore={}",
                report.healed,
                report.recreated.len(),
                report.stale_dropped,
                report.demoted,
                report.duplicates_closed,
                report.session_restore
            );
        }
        Ok(ReconcileOutcome::Completed(report))
    }

    async fn pass<H: HostPlatform>(ctx: &Activation<H>, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let _metadata = ctx.metadata_lock().await;
        let store = ctx.store();
        let mut state = store.load()?;
        let index = LiveTabIndex::refresh(ctx, &mut state, now).await?;
        let before = state.clone();

        let mut report = ReconcileReport {
            healed: index.healed,
            persisted: index.persisted,
            ..Default::default()
        };

        let check = Self::classify(&index, &state, ctx.config().restore_threshold);
        report.session_restore = check.is_session_restore;
        report.overlap_ratio = check.ratio;

        if check.is_session_restore {
            info!(
                target: "dormant::reconcile",
                "Session restore detected: {}/{} suspended URLs are open as ordinary pages",
                check.overlap,
                check.placeholder_urls
            );
            Self::resolve_duplicates(ctx, &index, &mut state, &mut report).await;
        } else {
            Self::recreate_orphans(ctx, &index, &mut state, now, &mut report).await;
        }

        if state != before {
            report.persisted = store.persist_or_log(&state);
        }
        Ok(report)
    }

    /// Compare placeholder URLs against ordinary page URLs.
    pub fn classify(index: &LiveTabIndex, state: &SuspensionState, threshold: f64) -> SessionRestoreCheck {
        let placeholder_urls = index.placeholder_urls(state);
        let ordinary_urls = index.ordinary_urls();
        let overlap = placeholder_urls.intersection(&ordinary_urls).count();
        let ratio = if placeholder_urls.is_empty() {
            0.0
        } else {
            overlap as f64 / placeholder_urls.len() as f64
        };
        SessionRestoreCheck {
            placeholder_urls: placeholder_urls.len(),
            overlap,
            ratio,
            is_session_restore: overlap > 0 && ratio >= threshold,
        }
    }

    /// Recreate placeholders for active records whose page is gone.
    async fn recreate_orphans<H: HostPlatform>(
        ctx: &Activation<H>,
        index: &LiveTabIndex,
        state: &mut SuspensionState,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) {
        let mut represented = index.placeholder_urls(state);
        let mut remap = GroupRemap::new();
        let orphans: Vec<PageId> = state
            .active
            .keys()
            .copied()
            .filter(|id| !index.contains(*id))
            .collect();

        for old_id in orphans {
            let Some(record) = state.record(old_id).cloned() else {
                continue;
            };

            if represented.contains(&record.original_url) {
                debug!(
                    target: "dormant::reconcile",
                    "Dropping stale record {} for {}: already represented",
                    old_id,
                    record.original_url
                );
                state.remove_active(old_id);
                report.stale_dropped += 1;
                continue;
            }

            let url = ctx.placeholder_url(&record.original_url, &record.title, &record.favicon);
            match ctx.host().create_page(CreatePage::background(url)).await {
                Ok(page) => {
                    state.rekey(old_id, page.id, now);
                    represented.insert(record.original_url.clone());

                    let group_id = if record.has_group() {
                        Self::restore_membership(ctx, page.id, &record, &mut remap).await
                    } else {
                        None
                    };
                    if let Some(rekeyed) = state.active.get_mut(&page.id) {
                        rekeyed.group_id = group_id.or(rekeyed.group_id);
                    }

                    info!(
                        target: "dormant::reconcile",
                        "Recreated placeholder {} -> {} for {}",
                        old_id,
                        page.id,
                        record.original_url
                    );
                    report.recreated.push(Recreation {
                        old_id,
                        new_id: page.id,
                        original_url: record.original_url,
                        group_id,
                    });
                }
                Err(e) => {
                    warn!(
                        target: "dormant::reconcile",
                        "Could not recreate placeholder for {}: {}; moving to lost",
                        record.original_url,
                        e
                    );
                    state.demote(old_id, now);
                    report.demoted += 1;
                }
            }
        }
    }

    /// Close placeholders that duplicate a live ordinary page.
    async fn resolve_duplicates<H: HostPlatform>(
        ctx: &Activation<H>,
        index: &LiveTabIndex,
        state: &mut SuspensionState,
        report: &mut ReconcileReport,
    ) {
        let mut ordinary_by_url: HashMap<&str, &LivePage> = HashMap::new();
        for page in &index.ordinary {
            ordinary_by_url.entry(page.url.as_str()).or_insert(page);
        }
        let mut grouped: HashSet<PageId> = index
            .ordinary
            .iter()
            .filter(|p| p.group_id.is_some())
            .map(|p| p.id)
            .collect();
        let mut remap = GroupRemap::new();

        for placeholder in &index.placeholders {
            let Some(url) = LiveTabIndex::represented_url(placeholder, state) else {
                continue;
            };
            let Some(ordinary) = ordinary_by_url.get(url.as_str()) else {
                continue;
            };

            let record = state.remove_active(placeholder.page.id);
            if !grouped.contains(&ordinary.id) {
                if let Some(record) = record.as_ref().filter(|r| r.has_group()) {
                    if Self::restore_membership(ctx, ordinary.id, record, &mut remap)
                        .await
                        .is_some()
                    {
                        grouped.insert(ordinary.id);
                        report.regrouped += 1;
                    }
                }
            }

            match ctx.host().remove_page(placeholder.page.id).await {
                Ok(()) => report.duplicates_closed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(
                    target: "dormant::reconcile",
                    "Could not close duplicate placeholder {}: {}",
                    placeholder.page.id,
                    e
                ),
            }
            debug!(
                target: "dormant::reconcile",
                "Resolved duplicate of {} in favour of page {}",
                url,
                ordinary.id
            );
        }
    }

    /// Put `page_id` back into the record's group, recreating and relabelling
    /// the group when the original is gone.
    async fn restore_membership<H: HostPlatform>(
        ctx: &Activation<H>,
        page_id: PageId,
        record: &SuspendedPageRecord,
        remap: &mut GroupRemap,
    ) -> Option<GroupId> {
        let host = ctx.host();

        if let Some(old_gid) = record.group_id {
            let target = remap.get(&old_gid).copied().unwrap_or(old_gid);
            match host.group_pages(&[page_id], Some(target)).await {
                Ok(gid) => return Some(gid),
                Err(e) => debug!(
                    target: "dormant::reconcile",
                    "Group {} unavailable for page {}: {}; creating a new one",
                    target,
                    page_id,
                    e
                ),
            }
        }

        match host.group_pages(&[page_id], None).await {
            Ok(gid) => {
                if let Err(e) = host
                    .update_group(gid, record.group_title.as_deref(), record.group_color)
                    .await
                {
                    warn!(target: "dormant::reconcile", "Could not relabel group {}: {}", gid, e);
                }
                if let Some(old_gid) = record.group_id {
                    remap.insert(old_gid, gid);
                }
                Some(gid)
            }
            Err(e) => {
                warn!(target: "dormant::reconcile", "Could not regroup page {}: {}", page_id, e);
                None
            }
        }
    }
}
