//! User settings kept in the synchronized key-value scope.

use serde::{Deserialize, Serialize};

/// User-facing suspension preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Ordered whitelist patterns; the first match wins.
    pub whitelist: Vec<String>,
    /// Suspend ordinary pages idle for longer than this many minutes.
    pub auto_suspend_after_minutes: Option<u64>,
    /// Let automatic suspension touch pinned pages.
    pub suspend_pinned: bool,
}

impl Settings {
    /// Append a whitelist pattern. Returns false if it was blank or already present.
    pub fn add_whitelist_pattern(&mut self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty() || self.whitelist.iter().any(|p| p == pattern) {
            return false;
        }
        self.whitelist.push(pattern.to_string());
        true
    }

    /// Remove a whitelist pattern. Returns false if it was not present.
    pub fn remove_whitelist_pattern(&mut self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        let before = self.whitelist.len();
        self.whitelist.retain(|p| p != pattern);
        self.whitelist.len() != before
    }
}
