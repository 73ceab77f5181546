//! Error types for Dormant.

use dormant_types::{GroupId, PageId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DormantError {
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Host platform error: {0}")]
    Host(String),

    #[error("Suspended page record for {0} has an empty original URL")]
    EmptyOriginalUrl(PageId),

    #[error("No original URL known for placeholder page {0}")]
    MissingOriginalUrl(PageId),

    #[error("Storage quota exceeded for '{key}': {size} bytes > {quota} bytes")]
    QuotaExceeded { key: String, size: usize, quota: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DormantError {
    /// Whether the error means the host no longer knows the page or group.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DormantError::PageNotFound(_) | DormantError::GroupNotFound(_))
    }
}
