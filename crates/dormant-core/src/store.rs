//! Durable suspension metadata.
//!
//! The envelope lives under [`SUSPENDED_STATE_KEY`] in the local scope. Two
//! shapes may be found there: the versioned envelope, and the legacy flat
//! map of `{ "<pageId>": record }` written before versioning existed. Both
//! are readable; every write produces the current envelope.

use crate::kv::KeyValueStore;
use crate::state::SuspensionState;
use crate::Result;
use chrono::{DateTime, TimeZone, Utc};
use dormant_types::{LostPageEntry, MetadataEnvelope, PageId, SuspendedPageRecord, SCHEMA_VERSION};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local-scope key holding the [`MetadataEnvelope`].
pub const SUSPENDED_STATE_KEY: &str = "suspendedTabState";

/// Record shape found in the legacy flat map. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyRecord {
    #[serde(alias = "url")]
    original_url: String,
    title: String,
    #[serde(alias = "favIconUrl")]
    favicon: String,
    suspended_at: Option<i64>,
    group_id: Option<i64>,
    group_title: Option<String>,
}

/// Read/write-through access to the persisted suspension envelope.
#[derive(Clone)]
pub struct MetadataStore {
    kv: Arc<dyn KeyValueStore>,
}

impl MetadataStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the active map and lost list, migrating older shapes in memory.
    ///
    /// Entries are decoded one at a time: an unreadable record is logged and
    /// skipped so the rest of the envelope stays usable.
    pub fn load(&self) -> Result<SuspensionState> {
        let Some(value) = self.kv.get(SUSPENDED_STATE_KEY)? else {
            return Ok(SuspensionState::default());
        };

        let now = Utc::now();
        let state = match value {
            Value::Object(obj) if is_envelope(&obj) => state_from_envelope(obj, now),
            other => {
                info!(target: "dormant::store", "Reading legacy suspension map; it will be upgraded on next write");
                state_from_legacy(other, now)
            }
        };

        debug!(
            target: "dormant::store",
            "Loaded {} active records, {} lost entries",
            state.active.len(),
            state.lost.len()
        );
        Ok(state)
    }

    /// Write both collections as one envelope under the current schema version.
    pub fn persist(&self, state: &SuspensionState) -> Result<()> {
        let envelope = MetadataEnvelope {
            version: SCHEMA_VERSION,
            active: state
                .active
                .iter()
                .filter(|(_, r)| !r.original_url.is_empty())
                .map(|(id, r)| (*id, r.clone()))
                .collect(),
            lost: state.lost.clone(),
        };
        let value = serde_json::to_value(&envelope)?;
        self.kv.set(SUSPENDED_STATE_KEY, &value)?;
        debug!(
            target: "dormant::store",
            "Persisted {} active records, {} lost entries",
            envelope.active.len(),
            envelope.lost.len()
        );
        Ok(())
    }

    /// Persist, logging instead of failing. The in-memory transition stands
    /// either way; the next successful write catches up.
    pub fn persist_or_log(&self, state: &SuspensionState) -> bool {
        match self.persist(state) {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "dormant::store", "Failed to persist suspension state: {}", e);
                false
            }
        }
    }
}

/// An envelope carries an integer `version`, or at least its `active`/`lost` collections.
fn is_envelope(obj: &Map<String, Value>) -> bool {
    obj.get("version").is_some_and(Value::is_u64)
        || obj.get("active").is_some_and(Value::is_object)
        || obj.get("lost").is_some_and(Value::is_array)
}

/// Log how far the stored envelope is from [`SCHEMA_VERSION`].
fn check_version(version: Option<u64>) {
    let current = u64::from(SCHEMA_VERSION);
    match version {
        None => info!(
            target: "dormant::store",
            "Suspension envelope has no version; reading it as v{}",
            current
        ),
        // Every prior version shares the current shape; only the stamp changes.
        Some(v) if v < current => info!(
            target: "dormant::store",
            "Migrating suspension envelope from v{} to v{}",
            v,
            current
        ),
        Some(v) if v > current => warn!(
            target: "dormant::store",
            "Suspension envelope v{} is newer than v{}; reading known fields only",
            v,
            current
        ),
        Some(_) => {}
    }
}

fn state_from_envelope(mut obj: Map<String, Value>, now: DateTime<Utc>) -> SuspensionState {
    check_version(obj.get("version").and_then(Value::as_u64));
    let mut state = SuspensionState::default();

    match obj.remove("active") {
        Some(Value::Object(active)) => {
            for (key, raw) in active {
                let Ok(id) = key.parse::<PageId>() else {
                    warn!(target: "dormant::store", "Skipping active record under non-numeric key '{}'", key);
                    continue;
                };
                let Some(record) = decode_record(id, raw, now) else {
                    continue;
                };
                state.active.insert(id, record);
            }
        }
        None | Some(Value::Null) => {}
        Some(_) => warn!(target: "dormant::store", "Ignoring malformed active map"),
    }

    match obj.remove("lost") {
        Some(Value::Array(lost)) => {
            for raw in lost {
                if let Some(entry) = decode_lost(raw, now) {
                    state.lost.push(entry);
                }
            }
        }
        None | Some(Value::Null) => {}
        Some(_) => warn!(target: "dormant::store", "Ignoring malformed lost list"),
    }
    state
}

/// Set `field` to `value` when it is absent or null.
fn fill_missing(obj: &mut Map<String, Value>, field: &str, value: Value) {
    if obj.get(field).is_none_or(Value::is_null) {
        obj.insert(field.to_string(), value);
    }
}

fn decode_record(id: PageId, raw: Value, now: DateTime<Utc>) -> Option<SuspendedPageRecord> {
    let Value::Object(mut obj) = raw else {
        warn!(target: "dormant::store", "Skipping active record {}: not an object", id);
        return None;
    };
    // The map key is authoritative for the live page id.
    obj.insert("hostPageId".to_string(), Value::from(id));
    fill_missing(&mut obj, "suspendedAt", Value::from(now.timestamp_millis()));

    match serde_json::from_value::<SuspendedPageRecord>(Value::Object(obj)) {
        Ok(record) if record.original_url.is_empty() => {
            warn!(target: "dormant::store", "Dropping record {} with empty original URL", id);
            None
        }
        Ok(record) => Some(record),
        Err(e) => {
            warn!(target: "dormant::store", "Skipping unreadable active record {}: {}", id, e);
            None
        }
    }
}

fn decode_lost(raw: Value, now: DateTime<Utc>) -> Option<LostPageEntry> {
    let Value::Object(mut obj) = raw else {
        warn!(target: "dormant::store", "Skipping lost entry: not an object");
        return None;
    };
    if let Some(id) = obj.get("hostPageId").filter(|v| !v.is_null()).cloned() {
        fill_missing(&mut obj, "lastHostPageId", id);
    }
    if let Some(id) = obj.get("lastHostPageId").filter(|v| !v.is_null()).cloned() {
        fill_missing(&mut obj, "hostPageId", id);
    }
    fill_missing(&mut obj, "suspendedAt", Value::from(now.timestamp_millis()));
    fill_missing(&mut obj, "lostAt", Value::from(now.timestamp_millis()));

    match serde_json::from_value::<LostPageEntry>(Value::Object(obj)) {
        Ok(entry) if entry.original_url().is_empty() => {
            warn!(target: "dormant::store", "Dropping lost entry {} with empty original URL", entry.last_host_page_id);
            None
        }
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(target: "dormant::store", "Skipping unreadable lost entry: {}", e);
            None
        }
    }
}

fn state_from_legacy(value: Value, now: DateTime<Utc>) -> SuspensionState {
    let mut state = SuspensionState::default();
    let Value::Object(map) = value else {
        warn!(target: "dormant::store", "Ignoring unrecognised suspension state");
        return state;
    };
    for (key, raw) in legacy_entries(map) {
        let Ok(id) = key.parse::<PageId>() else {
            continue;
        };
        let Ok(legacy) = serde_json::from_value::<LegacyRecord>(raw) else {
            continue;
        };
        if legacy.original_url.is_empty() {
            continue;
        }
        let suspended_at = legacy
            .suspended_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now);
        let mut record =
            SuspendedPageRecord::new(id, legacy.original_url, legacy.title, legacy.favicon, suspended_at);
        record.group_id = legacy.group_id;
        record.group_title = legacy.group_title;
        state.active.insert(id, record);
    }
    state
}

fn legacy_entries(map: Map<String, Value>) -> impl Iterator<Item = (String, Value)> {
    map.into_iter().filter(|(_, v)| v.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryKvStore, SqliteKvStore, LOCAL_SCOPE};
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_store() -> (MetadataStore, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        (MetadataStore::new(kv.clone()), kv)
    }

    #[test]
    fn test_load_empty() {
        let (store, _) = memory_store();
        assert_eq!(store.load().unwrap(), SuspensionState::default());
    }

    #[test]
    fn test_persist_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let kv = Arc::new(SqliteKvStore::open(&temp_dir.path().join("s.db"), LOCAL_SCOPE).unwrap());
        let store = MetadataStore::new(kv);

        let mut state = SuspensionState::default();
        state
            .insert_active(SuspendedPageRecord::new(7, "https://a.test/", "A", "", Utc::now()))
            .unwrap();
        state.lost.push(LostPageEntry::from_record(
            SuspendedPageRecord::new(3, "https://b.test/", "B", "", Utc::now()),
            Utc::now(),
        ));
        store.persist(&state).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.active.len(), 1);
        assert!(reloaded.active.values().all(|r| !r.original_url.is_empty()));
        assert_eq!(reloaded.record(7).unwrap().title, "A");
        assert_eq!(reloaded.lost.len(), 1);
    }

    #[test]
    fn test_legacy_flat_map_is_read_and_upgraded() {
        let (store, kv) = memory_store();
        kv.set(
            SUSPENDED_STATE_KEY,
            &json!({
                "11": {"originalUrl": "https://a.test/", "title": "A", "suspendedAt": 1_700_000_000_000i64},
                "12": {"url": "https://b.test/"},
                "13": {"title": "no url"},
                "junk": {"originalUrl": "https://c.test/"}
            }),
        )
        .unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.active.len(), 2);
        assert_eq!(state.record(11).unwrap().suspended_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(state.record(12).unwrap().original_url, "https://b.test/");

        store.persist(&state).unwrap();
        let raw = kv.get(SUSPENDED_STATE_KEY).unwrap().unwrap();
        assert_eq!(raw["version"], json!(SCHEMA_VERSION));
        assert_eq!(raw["active"]["11"]["originalUrl"], "https://a.test/");
    }

    #[test]
    fn test_older_envelope_is_migrated() {
        let (store, kv) = memory_store();
        kv.set(
            SUSPENDED_STATE_KEY,
            &json!({
                "version": 1,
                "active": {"5": {"hostPageId": 99, "originalUrl": "https://a.test/", "suspendedAt": 0}},
                "lost": []
            }),
        )
        .unwrap();

        let state = store.load().unwrap();
        // The map key wins over a stale embedded id.
        assert_eq!(state.record(5).unwrap().host_page_id, 5);
    }

    #[test]
    fn test_envelope_drops_empty_urls() {
        let (store, kv) = memory_store();
        kv.set(
            SUSPENDED_STATE_KEY,
            &json!({
                "version": SCHEMA_VERSION,
                "active": {
                    "1": {"hostPageId": 1, "originalUrl": "", "suspendedAt": 0},
                    "2": {"hostPageId": 2, "originalUrl": "https://a.test/", "suspendedAt": 0}
                }
            }),
        )
        .unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.active.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_unreadable_entries_are_skipped_not_fatal() {
        let (store, kv) = memory_store();
        kv.set(
            SUSPENDED_STATE_KEY,
            &json!({
                "version": SCHEMA_VERSION,
                "active": {
                    "1": {"hostPageId": 1, "originalUrl": "https://good.test/", "title": "Good", "suspendedAt": 5_000},
                    "2": {"hostPageId": 2, "originalUrl": "https://no-timestamp.test/"},
                    "3": {"hostPageId": 3, "suspendedAt": 0},
                    "4": "not a record",
                    "five": {"originalUrl": "https://bad-key.test/", "suspendedAt": 0}
                },
                "lost": [
                    {"hostPageId": 8, "originalUrl": "https://lost.test/", "suspendedAt": 0, "lostAt": 1_000, "lastHostPageId": 8},
                    {"hostPageId": 9, "originalUrl": "https://no-last-id.test/", "suspendedAt": 0, "lostAt": 2_000},
                    {"lastHostPageId": 10, "originalUrl": "https://no-lost-at.test/"},
                    {"originalUrl": "https://no-ids.test/", "suspendedAt": 0, "lostAt": 0},
                    42
                ]
            }),
        )
        .unwrap();
        let before = Utc::now().timestamp_millis();

        let state = store.load().unwrap();
        assert_eq!(state.active.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(state.record(1).unwrap().title, "Good");
        assert_eq!(state.record(1).unwrap().suspended_at.timestamp_millis(), 5_000);
        assert!(state.record(2).unwrap().suspended_at.timestamp_millis() >= before);

        let lost: Vec<(&str, PageId)> = state
            .lost
            .iter()
            .map(|e| (e.original_url(), e.last_host_page_id))
            .collect();
        assert_eq!(
            lost,
            vec![
                ("https://lost.test/", 8),
                ("https://no-last-id.test/", 9),
                ("https://no-lost-at.test/", 10),
            ]
        );
        assert!(state.lost[2].lost_at.timestamp_millis() >= before);

        // The next write replaces the damaged value with a clean envelope.
        store.persist(&state).unwrap();
        let raw = kv.get(SUSPENDED_STATE_KEY).unwrap().unwrap();
        assert_eq!(raw["active"].as_object().unwrap().len(), 2);
        assert_eq!(raw["lost"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_unversioned_envelope_is_not_read_as_legacy() {
        let (store, kv) = memory_store();
        kv.set(
            SUSPENDED_STATE_KEY,
            &json!({
                "active": {"4": {"originalUrl": "https://a.test/", "suspendedAt": 0}},
                "lost": [{"hostPageId": 2, "originalUrl": "https://b.test/", "suspendedAt": 0, "lostAt": 0}]
            }),
        )
        .unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.record(4).unwrap().original_url, "https://a.test/");
        assert_eq!(state.lost.len(), 1);
        assert_eq!(state.lost[0].last_host_page_id, 2);
    }
}
