//! Live pages and page groups as observed on the host platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Host-assigned page identifier. Not stable across page recreation.
pub type PageId = i64;

/// Host-assigned group identifier.
pub type GroupId = i64;

/// Host-assigned window identifier.
pub type WindowId = i64;

/// A page currently open on the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePage {
    pub id: PageId,
    pub window_id: WindowId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    /// Visual group the page belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Whether the page is the focused page of its window.
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub audible: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Label colors supported for page groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    #[default]
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

#[derive(Debug, Error)]
#[error("unknown group color: {0}")]
pub struct UnknownGroupColor(pub String);

impl FromStr for GroupColor {
    type Err = UnknownGroupColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grey" | "gray" => Ok(GroupColor::Grey),
            "blue" => Ok(GroupColor::Blue),
            "red" => Ok(GroupColor::Red),
            "yellow" => Ok(GroupColor::Yellow),
            "green" => Ok(GroupColor::Green),
            "pink" => Ok(GroupColor::Pink),
            "purple" => Ok(GroupColor::Purple),
            "cyan" => Ok(GroupColor::Cyan),
            "orange" => Ok(GroupColor::Orange),
            _ => Err(UnknownGroupColor(s.to_string())),
        }
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        };
        f.write_str(name)
    }
}

/// A visual grouping of pages sharing a label and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGroup {
    pub id: GroupId,
    pub window_id: WindowId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: GroupColor,
}

/// Filters for enumerating live pages. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub window_id: Option<WindowId>,
    pub group_id: Option<GroupId>,
    pub active: Option<bool>,
    pub url_prefix: Option<String>,
    /// Only pages that do not belong to any group.
    pub ungrouped: bool,
}

impl PageQuery {
    /// Every open page.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_group(group_id: GroupId) -> Self {
        Self {
            group_id: Some(group_id),
            ..Self::default()
        }
    }

    pub fn with_url_prefix(prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Whether a page passes every filter set on this query.
    pub fn matches(&self, page: &LivePage) -> bool {
        if self.window_id.is_some_and(|w| w != page.window_id) {
            return false;
        }
        if self.group_id.is_some() && self.group_id != page.group_id {
            return false;
        }
        if self.active.is_some_and(|a| a != page.active) {
            return false;
        }
        if let Some(prefix) = &self.url_prefix {
            if !page.url.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if self.ungrouped && page.group_id.is_some() {
            return false;
        }
        true
    }
}

/// Parameters for opening a new page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePage {
    pub url: String,
    pub active: bool,
    pub window_id: Option<WindowId>,
}

impl CreatePage {
    /// A background page in the host's default window.
    pub fn background(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            active: false,
            window_id: None,
        }
    }
}
