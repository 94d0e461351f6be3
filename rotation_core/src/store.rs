//! The append-only injection history store.
//!
//! Holds the in-memory log (most-recent-first) and writes the whole
//! document through to the key-value store on every mutation. Mutations
//! beyond append are limited to a single-level undo, explicit deletes and
//! note edits, and wholesale import.

use crate::catalog::Catalog;
use crate::kv::{KeyValueStore, KEY_HISTORY};
use crate::types::{HistoryEntry, Point, Side, UNKNOWN_REGION};
use crate::{now_ms, Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    /// Id of the last appended entry while it is still undoable. Any
    /// other mutation clears this; there is no undo stack.
    last_append: Option<String>,
    store: Box<dyn KeyValueStore>,
}

impl HistoryStore {
    /// Hydrate the store from the persisted history document.
    ///
    /// A missing or unparseable document degrades to an empty log with a
    /// warning. Timestamps are normalized on the way in: numeric values
    /// pass through, date-like strings are parsed, anything else becomes
    /// now.
    pub fn load(store: Box<dyn KeyValueStore>, catalog: &Catalog) -> Self {
        let now = now_ms();
        let entries = match store.get(KEY_HISTORY) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(items)) => {
                    let mut entries = Vec::with_capacity(items.len());
                    for item in &items {
                        match normalize_entry(item, catalog, now) {
                            Some(entry) => entries.push(entry),
                            None => {
                                tracing::warn!("Skipping non-object history element: {}", item)
                            }
                        }
                    }
                    entries
                }
                Ok(other) => {
                    tracing::warn!(
                        "Stored history is not an array ({}), starting empty",
                        type_name(&other)
                    );
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!("Failed to parse stored history: {}. Starting empty.", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read stored history: {}. Starting empty.", e);
                Vec::new()
            }
        };

        tracing::debug!("Loaded {} history entries", entries.len());
        Self {
            entries,
            last_append: None,
            store,
        }
    }

    /// The log in display order: most-recent-first, ties in store order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Record an injection at `point` right now.
    ///
    /// Prepends the new entry, persists, and arms the single-level undo.
    /// Returns the created entry.
    pub fn append(&mut self, point: &Point) -> HistoryEntry {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            point_id: point.id.clone(),
            region: point.region.clone(),
            side: point.side,
            ts: now_ms(),
            note: String::new(),
        };

        self.entries.insert(0, entry.clone());
        self.last_append = Some(entry.id.clone());
        self.persist();

        tracing::info!(point = %point.id, entry = %entry.id, "Recorded injection");
        entry
    }

    /// Re-arm the undo pointer from a caller-held "last action" record.
    ///
    /// Callers that outlive this store's memory (the CLI runs one process
    /// per command) persist the id returned by [`append`](Self::append)
    /// and hand it back here. The pointer is only restored if that entry
    /// is still the head of the log, i.e. no append happened since.
    pub fn arm_undo(&mut self, id: &str) {
        if self.entries.first().map(|e| e.id == id).unwrap_or(false) {
            self.last_append = Some(id.to_string());
        }
    }

    /// Undo the most recent append, if no other mutation happened since.
    ///
    /// Returns the removed entry, or `None` when nothing is undoable.
    pub fn undo_last(&mut self) -> Option<HistoryEntry> {
        let id = self.last_append.take()?;
        let pos = self.entries.iter().position(|e| e.id == id)?;
        let removed = self.entries.remove(pos);
        self.persist();
        tracing::info!(entry = %removed.id, "Undid last recorded injection");
        Some(removed)
    }

    /// Remove an entry unconditionally. Irreversible.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return false;
        };
        self.entries.remove(pos);
        self.last_append = None;
        self.persist();
        tracing::info!(entry = %id, "Deleted history entry");
        true
    }

    /// Replace the note on an entry. No validation on content.
    pub fn edit_note(&mut self, id: &str, note: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.note = note.to_string();
        self.last_append = None;
        self.persist();
        true
    }

    /// Replace the entire log with a normalized import payload.
    ///
    /// The payload must be a JSON array of objects; otherwise the import
    /// is rejected and the existing history is left untouched. Normalized
    /// entries are re-sorted most-recent-first (stable) before replacing
    /// the log. Returns the number of imported entries.
    pub fn import_and_replace(&mut self, raw: &str, catalog: &Catalog) -> Result<usize> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::Import(format!("payload is not valid JSON: {}", e)))?;
        let Value::Array(items) = value else {
            return Err(Error::Import("payload is not a JSON array".into()));
        };

        let now = now_ms();
        let mut entries = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let entry = normalize_entry(item, catalog, now)
                .ok_or_else(|| Error::Import(format!("element {} is not an object", i)))?;
            entries.push(entry);
        }

        // Stable sort keeps equal timestamps in payload order.
        entries.sort_by(|a, b| b.ts.cmp(&a.ts));

        let count = entries.len();
        self.entries = entries;
        self.last_append = None;
        self.persist();

        tracing::info!("Imported {} history entries (replaced log)", count);
        Ok(count)
    }

    /// Serialize the full log in its current order.
    ///
    /// The output is the same shape `import_and_replace` consumes; the
    /// round-trip is lossless.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Write-through persistence, best-effort: a failed write is reported
    /// as a warning and never fails the mutation.
    fn persist(&self) {
        let raw = match serde_json::to_string(&self.entries) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(KEY_HISTORY, &raw) {
            tracing::warn!("Failed to persist history: {}", e);
        }
    }
}

/// Normalize one raw history element.
///
/// Missing id gets a fresh uuid; missing region/side fall back to the
/// catalog's view of the point, then to the unknown sentinels; the
/// timestamp falls back to `now`. Returns `None` for non-object elements.
fn normalize_entry(value: &Value, catalog: &Catalog, now: i64) -> Option<HistoryEntry> {
    let obj = value.as_object()?;

    let point_id = obj
        .get("pointId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let known = catalog.lookup(&point_id);

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let region = obj
        .get("region")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            known
                .map(|p| p.region.clone())
                .unwrap_or_else(|| UNKNOWN_REGION.to_string())
        });

    let side = obj
        .get("side")
        .and_then(|v| serde_json::from_value::<Side>(v.clone()).ok())
        .unwrap_or_else(|| known.map(|p| p.side).unwrap_or(Side::Na));

    let ts = normalize_ts(obj.get("ts"), now);

    let note = obj
        .get("note")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(HistoryEntry {
        id,
        point_id,
        region,
        side,
        ts,
        note,
    })
}

/// Coerce a raw timestamp value to epoch milliseconds, defaulting to `now`.
fn normalize_ts(value: Option<&Value>, now: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(now),
        Some(Value::String(s)) => parse_date_like(s).unwrap_or_else(|| {
            tracing::warn!("Unparseable timestamp '{}', substituting now", s);
            now
        }),
        _ => now,
    }
}

fn parse_date_like(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::kv::FileStore;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir, catalog: &Catalog) -> HistoryStore {
        HistoryStore::load(Box::new(FileStore::new(dir.path())), catalog)
    }

    #[test]
    fn test_append_prepends_and_persists() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();

        let mut store = open_store(&temp_dir, &catalog);
        let first = store.append(catalog.lookup("abd_r1").unwrap());
        let second = store.append(catalog.lookup("th_l1").unwrap());

        assert_eq!(store.entries()[0].id, second.id);
        assert_eq!(store.entries()[1].id, first.id);
        assert_eq!(store.entries()[0].region, "thigh");
        assert_eq!(store.entries()[0].side, Side::Left);
        assert_eq!(store.entries()[0].note, "");

        // A fresh store over the same directory sees the same log.
        let reloaded = open_store(&temp_dir, &catalog);
        assert_eq!(reloaded.entries(), store.entries());
    }

    #[test]
    fn test_undo_removes_only_immediately_prior_append() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        let first = store.append(catalog.lookup("abd_r1").unwrap());
        let second = store.append(catalog.lookup("abd_l1").unwrap());

        let removed = store.undo_last().unwrap();
        assert_eq!(removed.id, second.id);
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].id, first.id);

        // Single level: a second undo has nothing to target.
        assert!(store.undo_last().is_none());
    }

    #[test]
    fn test_mutations_clear_undo_eligibility() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();

        // Edit breaks undo
        let mut store = open_store(&temp_dir, &catalog);
        let appended = store.append(catalog.lookup("abd_r1").unwrap());
        assert!(store.edit_note(&appended.id, "before breakfast"));
        assert!(store.undo_last().is_none());
        assert_eq!(store.entries().len(), 1);

        // Delete of another entry breaks undo too
        let other = store.append(catalog.lookup("abd_r2").unwrap());
        let appended = store.append(catalog.lookup("abd_r3").unwrap());
        assert!(store.delete(&other.id));
        assert!(store.undo_last().is_none());
        assert!(store.entries().iter().any(|e| e.id == appended.id));
    }

    #[test]
    fn test_delete_and_edit_note() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        let entry = store.append(catalog.lookup("arm_r1").unwrap());
        assert!(store.edit_note(&entry.id, "slight bruise"));
        assert_eq!(store.entries()[0].note, "slight bruise");

        assert!(!store.edit_note("missing", "x"));
        assert!(!store.delete("missing"));

        assert!(store.delete(&entry.id));
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        store.append(catalog.lookup("abd_r1").unwrap());
        let head = store.append(catalog.lookup("th_l2").unwrap());
        store.edit_note(&head.id, "note");

        let exported = store.export_json().unwrap();
        let before = store.entries().to_vec();

        let count = store.import_and_replace(&exported, &catalog).unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.entries(), &before[..]);

        // Idempotent on its own output
        let again = store.export_json().unwrap();
        assert_eq!(again, exported);
    }

    #[test]
    fn test_import_rejects_non_array_and_keeps_history() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        store.append(catalog.lookup("abd_r1").unwrap());
        let before = store.entries().to_vec();

        assert!(store.import_and_replace("{\"a\": 1}", &catalog).is_err());
        assert!(store.import_and_replace("not json at all", &catalog).is_err());
        assert!(store.import_and_replace("[1, 2]", &catalog).is_err());

        assert_eq!(store.entries(), &before[..]);

        // Rejected imports are not mutations; reloading still sees the log.
        let reloaded = open_store(&temp_dir, &catalog);
        assert_eq!(reloaded.entries(), &before[..]);
    }

    #[test]
    fn test_import_normalizes_sparse_entries() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        let raw = r#"[
            {"pointId": "abd_l2", "ts": "2024-03-01T08:00:00Z"},
            {"pointId": "no_such_point", "ts": "garbage"},
            {"id": "keep-me", "pointId": "th_r1", "region": "thigh", "side": "right", "ts": 1709280000000, "note": "kept"}
        ]"#;

        let count = store.import_and_replace(raw, &catalog).unwrap();
        assert_eq!(count, 3);

        let entries = store.entries();
        // Sorted most-recent-first: the "garbage" ts normalized to now.
        assert_eq!(entries[0].point_id, "no_such_point");
        assert_eq!(entries[0].region, UNKNOWN_REGION);
        assert_eq!(entries[0].side, Side::Na);
        assert!(!entries[0].id.is_empty());

        let known = entries.iter().find(|e| e.point_id == "abd_l2").unwrap();
        assert_eq!(known.region, "abdomen"); // denormalized via catalog
        assert_eq!(known.side, Side::Left);
        assert_eq!(known.ts, 1_709_280_000_000);

        let kept = entries.iter().find(|e| e.id == "keep-me").unwrap();
        assert_eq!(kept.note, "kept");
    }

    #[test]
    fn test_import_clears_undo() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&temp_dir, &catalog);

        store.append(catalog.lookup("abd_r1").unwrap());
        store.import_and_replace("[]", &catalog).unwrap();
        assert!(store.undo_last().is_none());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_arm_undo_requires_head_entry() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();

        let mut store = open_store(&temp_dir, &catalog);
        let first = store.append(catalog.lookup("abd_r1").unwrap());
        let second = store.append(catalog.lookup("abd_r2").unwrap());

        // A reloaded store has no in-memory pointer
        let mut store = open_store(&temp_dir, &catalog);
        assert!(store.undo_last().is_none());

        // Arming with a non-head id is refused
        store.arm_undo(&first.id);
        assert!(store.undo_last().is_none());

        // Arming with the head id restores undo
        store.arm_undo(&second.id);
        let removed = store.undo_last().unwrap();
        assert_eq!(removed.id, second.id);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_corrupt_stored_history_starts_empty() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();

        let kv = FileStore::new(temp_dir.path());
        kv.set(KEY_HISTORY, "{ definitely not an array").unwrap();

        let store = HistoryStore::load(Box::new(kv), &catalog);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_load_normalizes_string_timestamps() {
        let catalog = build_default_catalog();
        let temp_dir = tempfile::tempdir().unwrap();

        let kv = FileStore::new(temp_dir.path());
        kv.set(
            KEY_HISTORY,
            r#"[{"id":"e1","pointId":"abd_r1","region":"abdomen","side":"right","ts":"2024-03-01","note":""}]"#,
        )
        .unwrap();

        let store = HistoryStore::load(Box::new(kv), &catalog);
        assert_eq!(store.entries().len(), 1);
        // 2024-03-01T00:00:00Z
        assert_eq!(store.entries()[0].ts, 1_709_251_200_000);
    }
}
