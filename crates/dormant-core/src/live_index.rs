//! Snapshot of the pages currently open on the host.

use crate::context::Activation;
use crate::host::HostPlatform;
use crate::placeholder::PlaceholderParams;
use crate::state::SuspensionState;
use crate::Result;
use chrono::{DateTime, Utc};
use dormant_types::{LivePage, PageId, PageQuery, SuspendedPageRecord};
use std::collections::HashSet;
use tracing::{debug, info};

/// A live placeholder page together with its decoded parameters.
#[derive(Debug, Clone)]
pub struct PlaceholderPage {
    pub page: LivePage,
    pub params: PlaceholderParams,
}

/// Live pages partitioned into placeholders and ordinary pages.
#[derive(Debug, Clone, Default)]
pub struct LiveTabIndex {
    ids: HashSet<PageId>,
    pub placeholders: Vec<PlaceholderPage>,
    pub ordinary: Vec<LivePage>,
    /// Records rebuilt from placeholder parameters during the refresh.
    pub healed: usize,
    /// Whether the healed records were written back.
    pub persisted: bool,
}

impl LiveTabIndex {
    /// Enumerate the host's pages and rebuild missing records from placeholder parameters.
    ///
    /// Self-healed records are written to `state` and persisted immediately.
    pub async fn refresh<H: HostPlatform>(
        ctx: &Activation<H>,
        state: &mut SuspensionState,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let pages = ctx.host().query_pages(&PageQuery::all()).await?;
        let mut index = Self::partition(ctx, pages);

        for placeholder in &index.placeholders {
            let page = &placeholder.page;
            if state.active.contains_key(&page.id) || placeholder.params.url.is_empty() {
                continue;
            }
            let mut record = SuspendedPageRecord::new(
                page.id,
                placeholder.params.url.clone(),
                placeholder.params.title.clone(),
                placeholder.params.favicon.clone(),
                now,
            );
            record.recovered_at = Some(now);
            if let Some(group_id) = page.group_id {
                record.group_id = Some(group_id);
                if let Ok(group) = ctx.host().get_group(group_id).await {
                    record.group_title = Some(group.title).filter(|t| !t.is_empty());
                    record.group_color = Some(group.color);
                }
            }
            info!(
                target: "dormant::live",
                "Recovered record for placeholder {} -> {}",
                page.id,
                record.original_url
            );
            state.insert_active(record)?;
            index.healed += 1;
        }

        if index.healed > 0 {
            index.persisted = ctx.store().persist_or_log(state);
        }

        debug!(
            target: "dormant::live",
            "Live index: {} placeholders, {} ordinary pages, {} healed",
            index.placeholders.len(),
            index.ordinary.len(),
            index.healed
        );
        Ok(index)
    }

    /// Split pages without touching any stored metadata.
    pub fn partition<H: HostPlatform>(ctx: &Activation<H>, pages: Vec<LivePage>) -> Self {
        let mut index = Self::default();
        for page in pages {
            index.ids.insert(page.id);
            match ctx.placeholder_params(&page.url) {
                Some(params) => index.placeholders.push(PlaceholderPage { page, params }),
                None => index.ordinary.push(page),
            }
        }
        index
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.ids.contains(&id)
    }

    /// Original URL represented by a placeholder: its `url` parameter, else its record.
    pub fn represented_url(placeholder: &PlaceholderPage, state: &SuspensionState) -> Option<String> {
        if !placeholder.params.url.is_empty() {
            return Some(placeholder.params.url.clone());
        }
        state
            .record(placeholder.page.id)
            .map(|r| r.original_url.clone())
    }

    /// Original URLs represented by live placeholders.
    pub fn placeholder_urls(&self, state: &SuspensionState) -> HashSet<String> {
        self.placeholders
            .iter()
            .filter_map(|p| Self::represented_url(p, state))
            .collect()
    }

    /// URLs of live ordinary pages.
    pub fn ordinary_urls(&self) -> HashSet<String> {
        self.ordinary.iter().map(|p| p.url.clone()).collect()
    }
}
