//! Periodic metadata cleanup.
//!
//! Active records whose page has been gone longer than the orphan grace
//! period move to the lost list; lost entries older than the retention
//! window are dropped.

use crate::context::Activation;
use crate::host::HostPlatform;
use crate::Result;
use chrono::{DateTime, Utc};
use dormant_types::{PageId, PageQuery};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JanitorReport {
    /// Records moved to the lost list.
    pub demoted: Vec<PageId>,
    /// Records dropped because their URL was already on the lost list.
    pub deduplicated: usize,
    /// Lost entries past retention.
    pub pruned: usize,
    pub persisted: bool,
}

impl JanitorReport {
    pub fn is_noop(&self) -> bool {
        self.demoted.is_empty() && self.deduplicated == 0 && self.pruned == 0
    }
}

pub struct MetadataJanitor;

impl MetadataJanitor {
    pub async fn sweep<H: HostPlatform>(ctx: &Activation<H>, now: DateTime<Utc>) -> Result<JanitorReport> {
        let _metadata = ctx.metadata_lock().await;
        let live: HashSet<PageId> = ctx
            .host()
            .query_pages(&PageQuery::all())
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        let store = ctx.store();
        let mut state = store.load()?;
        let mut report = JanitorReport::default();

        let grace = ctx.config().orphan_grace();
        let expired: Vec<PageId> = state
            .active
            .values()
            .filter(|r| !live.contains(&r.host_page_id) && now - r.last_attached_at() > grace)
            .map(|r| r.host_page_id)
            .collect();

        for id in expired {
            let Some(record) = state.remove_active(id) else {
                continue;
            };
            let url = record.original_url.clone();
            if state.push_lost(record, now) {
                debug!(target: "dormant::janitor", "Page {} ({}) is lost", id, url);
                report.demoted.push(id);
            } else {
                debug!(target: "dormant::janitor", "Page {} ({}) already on the lost list", id, url);
                report.deduplicated += 1;
            }
        }

        report.pruned = state.prune_lost_before(now - ctx.config().lost_retention());

        if !report.is_noop() {
            report.persisted = store.persist_or_log(&state);
            info!(
                target: "dormant::janitor",
                "Janitor: {} demoted, {} deduplicated, {} pruned",
                report.demoted.len(),
                report.deduplicated,
                report.pruned
            );
        }
        Ok(report)
    }
}
