//! File-backed store: a JSON array in the export shape.
//!
//! Each call re-reads the file, so every read is a fresh snapshot. Entries
//! that do not deserialize into a record surface as unreadable slots.
//! Unknown keys (for example `ai_analysis`) survive rewrites.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::Value;

use super::{NoteStore, ScanRequest, Scanned, StoreError};
use crate::criteria::Bounds;
use crate::record::{Record, format_timestamp};

pub struct FixtureStore {
    path: PathBuf,
}

impl FixtureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Value>, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            StoreError::Unavailable(format!("{}: {err}", self.path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| StoreError::Malformed(format!("{}: {err}", self.path.display())))
    }

    fn save(&self, entries: &[Value]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|err| StoreError::Malformed(err.to_string()))?;
        fs::write(&self.path, json).map_err(|err| {
            StoreError::Unavailable(format!("{}: {err}", self.path.display()))
        })
    }

    /// Walk the first `scan_cap` entries, handing each readable record (or
    /// read failure) that is inside `bounds` to `visit`. The walk ends early
    /// when `visit` returns `false`.
    fn walk(
        &self,
        bounds: &Bounds,
        scan_cap: usize,
        timeout: Duration,
        mut visit: impl FnMut(Scanned) -> bool,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        for (idx, entry) in self.load()?.into_iter().take(scan_cap).enumerate() {
            if started.elapsed() > timeout {
                return Err(StoreError::Timeout(timeout));
            }
            let more = match serde_json::from_value::<Record>(entry) {
                Ok(record) if bounds.contains(record.modified) => visit(Ok(record)),
                Ok(_) => true,
                Err(err) => visit(Err(StoreError::Unreadable(format!("entry {idx}: {err}")))),
            };
            if !more {
                break;
            }
        }
        Ok(())
    }
}

impl NoteStore for FixtureStore {
    fn scan(
        &self,
        request: &ScanRequest<'_>,
        timeout: Duration,
    ) -> Result<Vec<Scanned>, StoreError> {
        let mut out = Vec::new();
        let mut accepted = 0;
        self.walk(&request.bounds, request.scan_cap, timeout, |slot| {
            match slot {
                Ok(record) if request.accepts(&record) => {
                    accepted += 1;
                    out.push(Ok(record));
                }
                Ok(_) => {}
                Err(err) => out.push(Err(err)),
            }
            accepted < request.limit
        })?;
        Ok(out)
    }

    fn count(
        &self,
        bounds: &Bounds,
        scan_cap: usize,
        timeout: Duration,
    ) -> Result<usize, StoreError> {
        let mut total = 0;
        self.walk(bounds, scan_cap, timeout, |slot| {
            if slot.is_ok() {
                total += 1;
            }
            true
        })?;
        Ok(total)
    }

    fn rewrite(
        &self,
        original_title: &str,
        title: &str,
        body: &str,
        _timeout: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        let target = entries
            .iter_mut()
            .find(|e| e.get("title").and_then(Value::as_str) == Some(original_title))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound(original_title.to_string()))?;

        target.insert("title".into(), Value::String(title.to_string()));
        target.insert("body".into(), Value::String(body.to_string()));
        target.insert(
            "modified".into(),
            Value::String(format_timestamp(&Local::now().naive_local())),
        );
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MARKER;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;
    use tempfile::tempdir;

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn everything() -> Bounds {
        Bounds::From(at(1) - chrono::TimeDelta::days(3650))
    }

    fn request(limit: usize, tag: Option<&str>) -> ScanRequest<'_> {
        ScanRequest { bounds: everything(), scan_cap: 500, limit, tag, exclude_marked: true }
    }

    fn write(dir: &Path, entries: Value) -> FixtureStore {
        let path = dir.join("store.json");
        fs::write(&path, entries.to_string()).unwrap();
        FixtureStore::new(path)
    }

    #[test]
    fn scan_reports_unreadable_entries() {
        let tmp = tempdir().unwrap();
        let store = write(
            tmp.path(),
            json!([
                {"title": "a", "body": "", "created": "2024-01-01 10:00:00", "modified": "2024-01-02 10:00:00"},
                {"title": "broken"},
                {"title": "c", "body": "", "created": "2024-01-01 10:00:00", "modified": "2024-01-03 10:00:00"}
            ]),
        );
        let slots = store.scan(&request(10, None), Duration::from_secs(5)).unwrap();
        assert_eq!(slots.len(), 3);
        assert!(slots[1].is_err());
        assert_eq!(store.count(&everything(), 500, Duration::from_secs(5)).unwrap(), 2);
        assert_eq!(store.count(&everything(), 1, Duration::from_secs(5)).unwrap(), 1);
    }

    #[test]
    fn scan_stops_after_limit_matches() {
        let tmp = tempdir().unwrap();
        let entry = |title: &str, body: &str| {
            json!({"title": title, "body": body, "created": "2024-01-01 10:00:00", "modified": "2024-01-02 10:00:00"})
        };
        let store = write(
            tmp.path(),
            json!([
                entry("groceries", "milk"),
                entry(&format!("{MARKER} old ai"), ""),
                entry("ai one", ""),
                {"title": "broken"},
                entry("ai two", ""),
                entry("ai three", "")
            ]),
        );

        let slots = store.scan(&request(2, Some("AI")), Duration::from_secs(5)).unwrap();
        let titles: Vec<&str> =
            slots.iter().filter_map(|s| s.as_ref().ok()).map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["ai one", "ai two"]);
        assert_eq!(slots.len(), 3);

        let one = store.scan(&request(1, None), Duration::from_secs(5)).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].as_ref().unwrap().title, "groceries");
    }

    #[test]
    fn rewrite_first_match_keeps_extra_keys() {
        let tmp = tempdir().unwrap();
        let store = write(
            tmp.path(),
            json!([
                {"title": "dup", "body": "one", "created": "2024-01-01 10:00:00", "modified": "2024-01-02 10:00:00", "ai_analysis": []},
                {"title": "dup", "body": "two", "created": "2024-01-01 10:00:00", "modified": "2024-01-02 10:00:00"}
            ]),
        );
        store.rewrite("dup", "new", "<h1>new</h1>one", Duration::from_secs(5)).unwrap();

        let saved: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(saved[0]["title"], "new");
        assert_eq!(saved[0]["ai_analysis"], json!([]));
        assert_eq!(saved[1]["title"], "dup");
        assert_eq!(saved[1]["body"], "two");
    }

    #[test]
    fn rewrite_missing_title() {
        let tmp = tempdir().unwrap();
        let store = write(tmp.path(), json!([]));
        let err = store.rewrite("ghost", "x", "y", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let store = FixtureStore::new("/nonexistent/store.json");
        let err = store.scan(&request(10, None), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
