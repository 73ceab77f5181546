//! The host platform seam: everything the engine asks of the browser.

use crate::Result;
use dormant_types::{CreatePage, GroupColor, GroupId, LivePage, PageGroup, PageId, PageQuery};
use std::future::Future;

/// Operations the engine consumes from the host platform.
///
/// Every call is non-blocking. Implementations report vanished pages and
/// groups as [`crate::DormantError::PageNotFound`] /
/// [`crate::DormantError::GroupNotFound`] and rejected operations as
/// [`crate::DormantError::Host`].
pub trait HostPlatform: Send + Sync {
    /// Enumerate open pages matching `query`, in host order.
    fn query_pages(&self, query: &PageQuery) -> impl Future<Output = Result<Vec<LivePage>>> + Send;

    fn get_page(&self, id: PageId) -> impl Future<Output = Result<LivePage>> + Send;

    /// Navigate an existing page to `url`.
    fn update_page_url(&self, id: PageId, url: &str) -> impl Future<Output = Result<LivePage>> + Send;

    /// Focus a page within its window.
    fn activate_page(&self, id: PageId) -> impl Future<Output = Result<()>> + Send;

    fn remove_page(&self, id: PageId) -> impl Future<Output = Result<()>> + Send;

    fn create_page(&self, options: CreatePage) -> impl Future<Output = Result<LivePage>> + Send;

    /// Move pages into `group_id`, or into a fresh group when `None`.
    /// Returns the id of the group the pages ended up in.
    fn group_pages(
        &self,
        page_ids: &[PageId],
        group_id: Option<GroupId>,
    ) -> impl Future<Output = Result<GroupId>> + Send;

    fn ungroup_pages(&self, page_ids: &[PageId]) -> impl Future<Output = Result<()>> + Send;

    fn get_group(&self, id: GroupId) -> impl Future<Output = Result<PageGroup>> + Send;

    /// Relabel a group. `None` leaves the corresponding attribute untouched.
    fn update_group(
        &self,
        id: GroupId,
        title: Option<&str>,
        color: Option<GroupColor>,
    ) -> impl Future<Output = Result<PageGroup>> + Send;

    /// Show a user-visible notification.
    fn notify(&self, title: &str, message: &str) -> impl Future<Output = Result<()>> + Send;
}
