//! User-facing suspend/restore transitions.
//!
//! Every transition reads the envelope through [`crate::MetadataStore`],
//! applies its change, and writes it back before touching the page, so a
//! teardown between the write and the navigation leaves a record the
//! reconciler can heal from.

use crate::context::Activation;
use crate::host::HostPlatform;
use crate::whitelist;
use crate::{DormantError, Result};
use chrono::{DateTime, Duration, Utc};
use dormant_types::{CreatePage, GroupId, LivePage, PageId, PageQuery, Settings, SuspendedPageRecord, WindowId};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Why a page was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    AlreadySuspended,
    EmptyUrl,
    Whitelisted,
    Audible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SuspendOutcome {
    Suspended { placeholder_url: String },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RestoreOutcome {
    Restored { url: String },
    /// The page had already navigated away from its placeholder.
    NotSuspended { cleared_record: bool },
}

/// Result of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub succeeded: Vec<PageId>,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_moved_to: Option<PageId>,
    /// Original URLs left on the lost list because their page could not be reopened.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub still_lost: Vec<String>,
}

pub struct SuspensionController;

impl SuspensionController {
    /// Replace a live page with its placeholder.
    pub async fn suspend<H: HostPlatform>(ctx: &Activation<H>, id: PageId) -> Result<SuspendOutcome> {
        let page = ctx.host().get_page(id).await?;
        let settings = ctx.settings()?;
        if let Some(reason) = Self::refusal(ctx, &page, &settings) {
            debug!(target: "dormant::controller", "Not suspending page {}: {:?}", id, reason);
            return Ok(SuspendOutcome::Skipped { reason });
        }
        Self::suspend_page(ctx, page).await
    }

    /// Navigate a placeholder back to its original page.
    pub async fn restore<H: HostPlatform>(ctx: &Activation<H>, id: PageId) -> Result<RestoreOutcome> {
        let _metadata = ctx.metadata_lock().await;
        let page = ctx.host().get_page(id).await?;
        let store = ctx.store();
        let mut state = store.load()?;

        if !ctx.is_placeholder(&page.url) {
            let cleared_record = state.remove_active(id).is_some();
            if cleared_record {
                debug!(target: "dormant::controller", "Page {} left its placeholder; clearing record", id);
                store.persist_or_log(&state);
            }
            return Ok(RestoreOutcome::NotSuspended { cleared_record });
        }

        let url = ctx
            .placeholder_params(&page.url)
            .map(|p| p.url)
            .filter(|u| !u.is_empty())
            .or_else(|| state.record(id).map(|r| r.original_url.clone()))
            .ok_or(DormantError::MissingOriginalUrl(id))?;

        ctx.host().update_page_url(id, &url).await?;
        state.remove_active(id);
        store.persist_or_log(&state);
        info!(target: "dormant::controller", "Restored page {} -> {}", id, url);
        Ok(RestoreOutcome::Restored { url })
    }

    /// Suspend every page of a group, first moving focus out of it if needed.
    pub async fn suspend_group<H: HostPlatform>(ctx: &Activation<H>, group_id: GroupId) -> Result<BatchReport> {
        let pages = ctx.host().query_pages(&PageQuery::in_group(group_id)).await?;
        if pages.is_empty() {
            return Err(DormantError::GroupNotFound(group_id));
        }

        let mut report = BatchReport::default();
        if let Some(focused) = pages.iter().find(|p| p.active) {
            report.focus_moved_to = Some(Self::move_focus_out_of_group(ctx, focused.window_id).await?);
        }

        let settings = ctx.settings()?;
        for page in pages {
            if Self::refusal(ctx, &page, &settings).is_some() {
                report.skipped += 1;
                continue;
            }
            let id = page.id;
            match Self::suspend_page(ctx, page).await {
                Ok(_) => report.succeeded.push(id),
                Err(e) => {
                    warn!(target: "dormant::controller", "Failed to suspend page {} of group {}: {}", id, group_id, e);
                    report.failed += 1;
                }
            }
        }
        info!(
            target: "dormant::controller",
            "Suspended {} pages of group {} ({} skipped, {} failed)",
            report.succeeded.len(),
            group_id,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Restore every placeholder of a group.
    pub async fn restore_group<H: HostPlatform>(ctx: &Activation<H>, group_id: GroupId) -> Result<BatchReport> {
        let pages = ctx.host().query_pages(&PageQuery::in_group(group_id)).await?;
        if pages.is_empty() {
            return Err(DormantError::GroupNotFound(group_id));
        }
        Ok(Self::restore_pages(ctx, pages).await)
    }

    /// Restore every live placeholder.
    pub async fn restore_all<H: HostPlatform>(ctx: &Activation<H>) -> Result<BatchReport> {
        let query = PageQuery::with_url_prefix(ctx.config().placeholder_base.clone());
        let pages = ctx.host().query_pages(&query).await?;
        Ok(Self::restore_pages(ctx, pages).await)
    }

    /// Reopen every lost entry as an ordinary page.
    ///
    /// Entries whose page could not be opened stay on the lost list and are
    /// named in [`BatchReport::still_lost`].
    pub async fn restore_all_lost<H: HostPlatform>(ctx: &Activation<H>) -> Result<BatchReport> {
        let _metadata = ctx.metadata_lock().await;
        let store = ctx.store();
        let mut state = store.load()?;
        let lost = std::mem::take(&mut state.lost);
        let mut report = BatchReport::default();

        for entry in lost {
            let url = entry.original_url().to_string();
            match ctx.host().create_page(CreatePage::background(url.clone())).await {
                Ok(page) => report.succeeded.push(page.id),
                Err(e) => {
                    warn!(target: "dormant::controller", "Could not reopen lost page {}: {}", url, e);
                    state.lost.push(entry);
                    report.still_lost.push(url);
                    report.failed += 1;
                }
            }
        }

        store.persist_or_log(&state);
        info!(
            target: "dormant::controller",
            "Reopened {} lost pages ({} failed)",
            report.succeeded.len(),
            report.failed
        );
        Ok(report)
    }

    /// Suspend ordinary pages idle longer than the configured threshold.
    pub async fn suspend_inactive<H: HostPlatform>(ctx: &Activation<H>, now: DateTime<Utc>) -> Result<BatchReport> {
        let settings = ctx.settings()?;
        let mut report = BatchReport::default();
        let Some(minutes) = settings.auto_suspend_after_minutes.filter(|m| *m > 0) else {
            return Ok(report);
        };
        let cutoff = now - Duration::minutes(minutes as i64);

        for page in ctx.host().query_pages(&PageQuery::all()).await? {
            let idle = page.last_accessed.is_some_and(|t| t <= cutoff);
            if !idle || page.active || (page.pinned && !settings.suspend_pinned) {
                continue;
            }
            if Self::refusal(ctx, &page, &settings).is_some() {
                report.skipped += 1;
                continue;
            }
            let id = page.id;
            match Self::suspend_page(ctx, page).await {
                Ok(_) => report.succeeded.push(id),
                Err(e) => {
                    warn!(target: "dormant::controller", "Auto-suspend of page {} failed: {}", id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn refusal<H: HostPlatform>(ctx: &Activation<H>, page: &LivePage, settings: &Settings) -> Option<SkipReason> {
        if ctx.is_placeholder(&page.url) {
            Some(SkipReason::AlreadySuspended)
        } else if page.url.is_empty() {
            Some(SkipReason::EmptyUrl)
        } else if whitelist::is_whitelisted(&page.url, &settings.whitelist) {
            Some(SkipReason::Whitelisted)
        } else if page.audible {
            Some(SkipReason::Audible)
        } else {
            None
        }
    }

    async fn suspend_page<H: HostPlatform>(ctx: &Activation<H>, page: LivePage) -> Result<SuspendOutcome> {
        let _metadata = ctx.metadata_lock().await;
        let favicon = page.fav_icon_url.clone().unwrap_or_default();
        let placeholder_url = ctx.placeholder_url(&page.url, &page.title, &favicon);

        let mut record = SuspendedPageRecord::new(page.id, page.url.clone(), page.title.clone(), favicon, Utc::now());
        if let Some(group_id) = page.group_id {
            record.group_id = Some(group_id);
            if let Ok(group) = ctx.host().get_group(group_id).await {
                record.group_title = Some(group.title).filter(|t| !t.is_empty());
                record.group_color = Some(group.color);
            }
        }

        let store = ctx.store();
        let mut state = store.load()?;
        state.insert_active(record)?;
        store.persist_or_log(&state);

        if let Err(e) = ctx.host().update_page_url(page.id, &placeholder_url).await {
            state.remove_active(page.id);
            store.persist_or_log(&state);
            return Err(e);
        }

        info!(target: "dormant::controller", "Suspended page {} ({})", page.id, page.url);
        Ok(SuspendOutcome::Suspended { placeholder_url })
    }

    async fn restore_pages<H: HostPlatform>(ctx: &Activation<H>, pages: Vec<LivePage>) -> BatchReport {
        let mut report = BatchReport::default();
        for page in pages {
            if !ctx.is_placeholder(&page.url) {
                report.skipped += 1;
                continue;
            }
            match Self::restore(ctx, page.id).await {
                Ok(RestoreOutcome::Restored { .. }) => report.succeeded.push(page.id),
                Ok(RestoreOutcome::NotSuspended { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(target: "dormant::controller", "Failed to restore page {}: {}", page.id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Focus an ungrouped ordinary page in `window_id`, opening a blank one if none exists.
    async fn move_focus_out_of_group<H: HostPlatform>(ctx: &Activation<H>, window_id: WindowId) -> Result<PageId> {
        let query = PageQuery {
            window_id: Some(window_id),
            ungrouped: true,
            ..PageQuery::default()
        };
        let candidate = ctx
            .host()
            .query_pages(&query)
            .await?
            .into_iter()
            .filter(|p| !ctx.is_placeholder(&p.url))
            .max_by_key(|p| p.last_accessed);

        match candidate {
            Some(page) => {
                ctx.host().activate_page(page.id).await?;
                debug!(target: "dormant::controller", "Moved focus to page {}", page.id);
                Ok(page.id)
            }
            None => {
                let page = ctx
                    .host()
                    .create_page(CreatePage {
                        url: ctx.config().blank_page_url.clone(),
                        active: true,
                        window_id: Some(window_id),
                    })
                    .await?;
                debug!(target: "dormant::controller", "Opened blank page {} to hold focus", page.id);
                Ok(page.id)
            }
        }
    }
}
