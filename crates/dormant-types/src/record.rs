//! Suspension records and the persisted metadata envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{GroupColor, GroupId, PageId};

/// Current schema version of [`MetadataEnvelope`].
pub const SCHEMA_VERSION: u32 = 2;

/// Metadata for one currently-tracked suspended page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedPageRecord {
    /// Live placeholder page carrying this record.
    pub host_page_id: PageId,
    /// The page being represented. Never empty.
    pub original_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub suspended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_color: Option<GroupColor>,
    /// Set when the reconciler reopened the placeholder under a new id.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub recreated_at: Option<DateTime<Utc>>,
    /// Set when the record was rebuilt from a live placeholder's parameters.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub recovered_at: Option<DateTime<Utc>>,
}

impl SuspendedPageRecord {
    /// A fresh record with no group membership.
    pub fn new(
        host_page_id: PageId,
        original_url: impl Into<String>,
        title: impl Into<String>,
        favicon: impl Into<String>,
        suspended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            host_page_id,
            original_url: original_url.into(),
            title: title.into(),
            favicon: favicon.into(),
            suspended_at,
            group_id: None,
            group_title: None,
            group_color: None,
            recreated_at: None,
            recovered_at: None,
        }
    }

    /// Whether the record remembers any group membership worth restoring.
    pub fn has_group(&self) -> bool {
        self.group_id.is_some() || self.group_title.is_some()
    }

    /// The most recent moment this record was known to be attached to a live page.
    pub fn last_attached_at(&self) -> DateTime<Utc> {
        [self.recreated_at, self.recovered_at]
            .into_iter()
            .flatten()
            .fold(self.suspended_at, DateTime::max)
    }
}

/// A suspended page whose placeholder vanished and was not recreated in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LostPageEntry {
    #[serde(flatten)]
    pub record: SuspendedPageRecord,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub lost_at: DateTime<Utc>,
    pub last_host_page_id: PageId,
}

impl LostPageEntry {
    pub fn from_record(record: SuspendedPageRecord, lost_at: DateTime<Utc>) -> Self {
        let last_host_page_id = record.host_page_id;
        Self {
            record,
            lost_at,
            last_host_page_id,
        }
    }

    pub fn original_url(&self) -> &str {
        &self.record.original_url
    }
}

/// The versioned value persisted under the suspended state key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    pub version: u32,
    #[serde(default)]
    pub active: BTreeMap<PageId, SuspendedPageRecord>,
    /// Ordered by demotion time, oldest first.
    #[serde(default)]
    pub lost: Vec<LostPageEntry>,
}
