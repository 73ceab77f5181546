//! Working copy of the suspension metadata for one activation.

use crate::{DormantError, Result};
use chrono::{DateTime, Utc};
use dormant_types::{LostPageEntry, PageId, SuspendedPageRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Active records keyed by live page id, plus the ordered lost list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuspensionState {
    pub active: BTreeMap<PageId, SuspendedPageRecord>,
    pub lost: Vec<LostPageEntry>,
}

impl SuspensionState {
    pub fn record(&self, id: PageId) -> Option<&SuspendedPageRecord> {
        self.active.get(&id)
    }

    /// Track a suspended page, replacing any previous record for the same id.
    pub fn insert_active(&mut self, record: SuspendedPageRecord) -> Result<()> {
        if record.original_url.is_empty() {
            return Err(DormantError::EmptyOriginalUrl(record.host_page_id));
        }
        self.active.insert(record.host_page_id, record);
        Ok(())
    }

    pub fn remove_active(&mut self, id: PageId) -> Option<SuspendedPageRecord> {
        self.active.remove(&id)
    }

    /// Move a record to a new page id, stamping `recreated_at`.
    pub fn rekey(&mut self, old_id: PageId, new_id: PageId, now: DateTime<Utc>) -> bool {
        match self.active.remove(&old_id) {
            Some(mut record) => {
                record.host_page_id = new_id;
                record.recreated_at = Some(now);
                self.active.insert(new_id, record);
                true
            }
            None => false,
        }
    }

    pub fn lost_contains_url(&self, url: &str) -> bool {
        self.lost.iter().any(|e| e.original_url() == url)
    }

    /// Append a lost entry unless one with the same original URL exists.
    ///
    /// The earliest entry for a URL wins. Returns whether an entry was added.
    pub fn push_lost(&mut self, record: SuspendedPageRecord, now: DateTime<Utc>) -> bool {
        if self.lost_contains_url(&record.original_url) {
            return false;
        }
        self.lost.push(LostPageEntry::from_record(record, now));
        true
    }

    /// Remove an active record and demote it to the lost list.
    ///
    /// Returns true if the active map changed.
    pub fn demote(&mut self, id: PageId, now: DateTime<Utc>) -> bool {
        match self.active.remove(&id) {
            Some(record) => {
                self.push_lost(record, now);
                true
            }
            None => false,
        }
    }

    /// Drop lost entries demoted strictly before `cutoff`. Returns how many were removed.
    pub fn prune_lost_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.lost.len();
        self.lost.retain(|e| e.lost_at >= cutoff);
        before - self.lost.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: PageId, url: &str) -> SuspendedPageRecord {
        SuspendedPageRecord::new(id, url, "", "", Utc::now())
    }

    #[test]
    fn test_insert_rejects_empty_url() {
        let mut state = SuspensionState::default();
        assert!(matches!(
            state.insert_active(record(1, "")),
            Err(DormantError::EmptyOriginalUrl(1))
        ));
        assert!(state.active.is_empty());
    }

    #[test]
    fn test_rekey_moves_record() {
        let mut state = SuspensionState::default();
        state.insert_active(record(1, "https://a.test/")).unwrap();
        let now = Utc::now();

        assert!(state.rekey(1, 9, now));
        assert!(state.record(1).is_none());
        let moved = state.record(9).unwrap();
        assert_eq!(moved.host_page_id, 9);
        assert_eq!(moved.recreated_at, Some(now));
        assert!(!state.rekey(1, 10, now));
    }

    #[test]
    fn test_lost_dedup_keeps_first() {
        let mut state = SuspensionState::default();
        state.insert_active(record(1, "https://a.test/")).unwrap();
        state.insert_active(record(2, "https://a.test/")).unwrap();
        let now = Utc::now();

        assert!(state.demote(1, now));
        assert!(state.demote(2, now));
        assert!(state.active.is_empty());
        assert_eq!(state.lost.len(), 1);
        assert_eq!(state.lost[0].last_host_page_id, 1);
    }

    #[test]
    fn test_prune_lost_before_cutoff() {
        let mut state = SuspensionState::default();
        let now = Utc::now();
        state.push_lost(record(1, "https://old.test/"), now - Duration::days(8));
        state.push_lost(record(2, "https://new.test/"), now - Duration::days(1));

        assert_eq!(state.prune_lost_before(now - Duration::days(7)), 1);
        assert_eq!(state.lost.len(), 1);
        assert_eq!(state.lost[0].original_url(), "https://new.test/");
    }
}
