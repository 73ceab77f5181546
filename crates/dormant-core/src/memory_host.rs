//! In-process host platform.
//!
//! Models the parts of a browser the engine talks to: pages with stable
//! ids, windows, groups that disappear with their last member, and
//! notifications. Page creation and group reattachment can be made to fail
//! on demand so recovery paths can be exercised without a real browser.

use crate::host::HostPlatform;
use crate::{DormantError, Result};
use chrono::Utc;
use dormant_types::{
    CreatePage, GroupColor, GroupId, LivePage, PageGroup, PageId, PageQuery, WindowId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Window used when a page is created without an explicit window.
pub const DEFAULT_WINDOW: WindowId = 1;

/// A notification shown through [`HostPlatform::notify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Seed description of a page, used to populate a [`MemoryHost`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedPage {
    pub url: String,
    pub title: String,
    pub fav_icon_url: Option<String>,
    pub window_id: Option<WindowId>,
    pub pinned: bool,
    pub audible: bool,
    pub active: bool,
    /// Title of the group to place the page in; pages sharing a title share a group.
    pub group: Option<String>,
}

#[derive(Debug, Default)]
struct HostState {
    pages: BTreeMap<PageId, LivePage>,
    groups: BTreeMap<GroupId, PageGroup>,
    next_page_id: PageId,
    next_group_id: GroupId,
    notifications: Vec<Notification>,
    pages_created: usize,
    fail_page_creation: bool,
    fail_group_reattach: bool,
}

impl HostState {
    fn alloc_page_id(&mut self) -> PageId {
        self.next_page_id += 1;
        self.next_page_id
    }

    fn alloc_group_id(&mut self) -> GroupId {
        self.next_group_id += 1;
        self.next_group_id
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut LivePage> {
        self.pages.get_mut(&id).ok_or(DormantError::PageNotFound(id))
    }

    /// Drop groups that no longer have any member page.
    fn collect_empty_groups(&mut self) {
        let pages = &self.pages;
        self.groups
            .retain(|gid, _| pages.values().any(|p| p.group_id == Some(*gid)));
    }

    fn focus(&mut self, id: PageId) -> Result<()> {
        let window_id = self.page_mut(id)?.window_id;
        for page in self.pages.values_mut().filter(|p| p.window_id == window_id) {
            page.active = page.id == id;
        }
        if let Some(page) = self.pages.get_mut(&id) {
            page.last_accessed = Some(Utc::now());
        }
        Ok(())
    }
}

/// Thread-safe in-memory [`HostPlatform`].
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a host populated from seed pages, in order.
    pub fn from_seed(seed: &[SeedPage]) -> Self {
        let host = Self::new();
        let mut group_by_title: BTreeMap<String, GroupId> = BTreeMap::new();
        for entry in seed {
            let id = host.open_page(&entry.url, &entry.title);
            let mut state = host.lock();
            let window_id = entry.window_id.unwrap_or(DEFAULT_WINDOW);
            let group_id = entry.group.as_ref().map(|title| {
                *group_by_title.entry(title.clone()).or_insert_with(|| {
                    let gid = state.alloc_group_id();
                    state.groups.insert(
                        gid,
                        PageGroup {
                            id: gid,
                            window_id,
                            title: title.clone(),
                            color: GroupColor::default(),
                        },
                    );
                    gid
                })
            });
            if let Some(page) = state.pages.get_mut(&id) {
                page.window_id = window_id;
                page.fav_icon_url = entry.fav_icon_url.clone();
                page.pinned = entry.pinned;
                page.audible = entry.audible;
                page.group_id = group_id;
            }
            if entry.active {
                let _ = state.focus(id);
            }
        }
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a background page directly, as if the user had done it.
    pub fn open_page(&self, url: &str, title: &str) -> PageId {
        let mut state = self.lock();
        let id = state.alloc_page_id();
        state.pages.insert(
            id,
            LivePage {
                id,
                window_id: DEFAULT_WINDOW,
                url: url.to_string(),
                title: title.to_string(),
                fav_icon_url: None,
                group_id: None,
                active: false,
                audible: false,
                pinned: false,
                last_accessed: Some(Utc::now()),
            },
        );
        id
    }

    /// Close a page out from under the engine, as if the user or the host had.
    pub fn close_page(&self, id: PageId) -> bool {
        let mut state = self.lock();
        let removed = state.pages.remove(&id).is_some();
        state.collect_empty_groups();
        removed
    }

    /// Create a labelled group containing `page_ids`.
    pub fn create_group(&self, page_ids: &[PageId], title: &str, color: GroupColor) -> Result<GroupId> {
        let mut state = self.lock();
        let first = *page_ids
            .first()
            .ok_or_else(|| DormantError::Host("cannot create an empty group".to_string()))?;
        let window_id = state.page_mut(first)?.window_id;
        let gid = state.alloc_group_id();
        state.groups.insert(
            gid,
            PageGroup {
                id: gid,
                window_id,
                title: title.to_string(),
                color,
            },
        );
        for id in page_ids {
            state.page_mut(*id)?.group_id = Some(gid);
        }
        state.collect_empty_groups();
        Ok(gid)
    }

    /// Replace a page wholesale (audible flag, last access, ...).
    pub fn edit_page(&self, id: PageId, edit: impl FnOnce(&mut LivePage)) -> Result<()> {
        let mut state = self.lock();
        edit(state.page_mut(id)?);
        state.collect_empty_groups();
        Ok(())
    }

    pub fn set_fail_page_creation(&self, fail: bool) {
        self.lock().fail_page_creation = fail;
    }

    /// Make reattaching pages to an existing group fail, as when the group vanished mid-call.
    pub fn set_fail_group_reattach(&self, fail: bool) {
        self.lock().fail_group_reattach = fail;
    }

    pub fn page(&self, id: PageId) -> Option<LivePage> {
        self.lock().pages.get(&id).cloned()
    }

    pub fn pages(&self) -> Vec<LivePage> {
        self.lock().pages.values().cloned().collect()
    }

    pub fn group(&self, id: GroupId) -> Option<PageGroup> {
        self.lock().groups.get(&id).cloned()
    }

    pub fn groups(&self) -> Vec<PageGroup> {
        self.lock().groups.values().cloned().collect()
    }

    /// Number of pages opened through [`HostPlatform::create_page`].
    pub fn pages_created(&self) -> usize {
        self.lock().pages_created
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }
}

impl HostPlatform for MemoryHost {
    async fn query_pages(&self, query: &PageQuery) -> Result<Vec<LivePage>> {
        let state = self.lock();
        Ok(state
            .pages
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect())
    }

    async fn get_page(&self, id: PageId) -> Result<LivePage> {
        self.lock()
            .pages
            .get(&id)
            .cloned()
            .ok_or(DormantError::PageNotFound(id))
    }

    async fn update_page_url(&self, id: PageId, url: &str) -> Result<LivePage> {
        let mut state = self.lock();
        let page = state.page_mut(id)?;
        page.url = url.to_string();
        Ok(page.clone())
    }

    async fn activate_page(&self, id: PageId) -> Result<()> {
        self.lock().focus(id)
    }

    async fn remove_page(&self, id: PageId) -> Result<()> {
        let mut state = self.lock();
        state
            .pages
            .remove(&id)
            .ok_or(DormantError::PageNotFound(id))?;
        state.collect_empty_groups();
        Ok(())
    }

    async fn create_page(&self, options: CreatePage) -> Result<LivePage> {
        let mut state = self.lock();
        if state.fail_page_creation {
            return Err(DormantError::Host("page creation rejected".to_string()));
        }
        let id = state.alloc_page_id();
        let page = LivePage {
            id,
            window_id: options.window_id.unwrap_or(DEFAULT_WINDOW),
            url: options.url,
            title: String::new(),
            fav_icon_url: None,
            group_id: None,
            active: false,
            audible: false,
            pinned: false,
            last_accessed: Some(Utc::now()),
        };
        state.pages.insert(id, page);
        state.pages_created += 1;
        if options.active {
            state.focus(id)?;
        }
        debug!(target: "dormant::host", "Created page {}", id);
        state
            .pages
            .get(&id)
            .cloned()
            .ok_or(DormantError::PageNotFound(id))
    }

    async fn group_pages(&self, page_ids: &[PageId], group_id: Option<GroupId>) -> Result<GroupId> {
        let mut state = self.lock();
        let first = *page_ids
            .first()
            .ok_or_else(|| DormantError::Host("no pages to group".to_string()))?;
        let window_id = state.page_mut(first)?.window_id;
        let gid = match group_id {
            Some(gid) => {
                if state.fail_group_reattach || !state.groups.contains_key(&gid) {
                    return Err(DormantError::GroupNotFound(gid));
                }
                gid
            }
            None => {
                let gid = state.alloc_group_id();
                state.groups.insert(
                    gid,
                    PageGroup {
                        id: gid,
                        window_id,
                        title: String::new(),
                        color: GroupColor::default(),
                    },
                );
                gid
            }
        };
        for id in page_ids {
            state.page_mut(*id)?.group_id = Some(gid);
        }
        state.collect_empty_groups();
        Ok(gid)
    }

    async fn ungroup_pages(&self, page_ids: &[PageId]) -> Result<()> {
        let mut state = self.lock();
        for id in page_ids {
            state.page_mut(*id)?.group_id = None;
        }
        state.collect_empty_groups();
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> Result<PageGroup> {
        self.lock()
            .groups
            .get(&id)
            .cloned()
            .ok_or(DormantError::GroupNotFound(id))
    }

    async fn update_group(
        &self,
        id: GroupId,
        title: Option<&str>,
        color: Option<GroupColor>,
    ) -> Result<PageGroup> {
        let mut state = self.lock();
        let group = state
            .groups
            .get_mut(&id)
            .ok_or(DormantError::GroupNotFound(id))?;
        if let Some(title) = title {
            group.title = title.to_string();
        }
        if let Some(color) = color {
            group.color = color;
        }
        Ok(group.clone())
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.lock().notifications.push(Notification {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
