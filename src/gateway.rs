//! Bounded, fail-tolerant access to the note store.
//!
//! Every call degrades instead of failing: an unavailable or timed-out store
//! yields an empty result (or a zero count) with a warning, and a single
//! unreadable record is skipped while the scan continues.

use std::time::Duration;

use log::{debug, warn};

use crate::criteria::Predicate;
use crate::error::VoyeurError;
use crate::record::Record;
use crate::store::{NoteStore, ScanRequest, StoreError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Gateway<'a> {
    store: &'a dyn NoteStore,
    timeout: Duration,
}

/// Totals reported by `--count` and `--stats-only`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub window: String,
    /// Records inside the time window (count path).
    pub total: usize,
    /// Of those, records surviving marker exclusion and the tag filter.
    pub visible: usize,
}

impl<'a> Gateway<'a> {
    pub fn new(store: &'a dyn NoteStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Scan in native order for records inside the predicate's bounds that
    /// carry its tag, dropping marked ones when `exclude_marked` is set. The
    /// store stops once `limit` are collected; only accepted records count
    /// toward the limit.
    pub fn query(&self, predicate: &Predicate, exclude_marked: bool) -> Vec<Record> {
        let request = ScanRequest {
            bounds: predicate.bounds,
            scan_cap: predicate.scan_cap,
            limit: predicate.limit,
            tag: predicate.tag.as_deref(),
            exclude_marked,
        };
        let slots = match self.store.scan(&request, self.timeout) {
            Ok(slots) => slots,
            Err(err) => {
                warn!("query abandoned ({}): {}", predicate.bounds.describe(), VoyeurError::from(err));
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for slot in slots.into_iter().take(predicate.scan_cap) {
            let record = match slot {
                Ok(record) => record,
                Err(err) => {
                    debug!("skipping record: {}", VoyeurError::from(err));
                    continue;
                }
            };
            if !request.accepts(&record) {
                continue;
            }
            found.push(record);
            if found.len() >= predicate.limit {
                break;
            }
        }
        debug!(
            "query ({}) returned {} of limit {}",
            predicate.bounds.describe(),
            found.len(),
            predicate.limit
        );
        found
    }

    /// Same bounds as `query`, no result limit.
    pub fn count(&self, predicate: &Predicate) -> usize {
        match self.store.count(&predicate.bounds, predicate.scan_cap, self.timeout) {
            Ok(n) => n,
            Err(err) => {
                warn!("count abandoned ({}): {}", predicate.bounds.describe(), VoyeurError::from(err));
                0
            }
        }
    }

    pub fn statistics(&self, predicate: &Predicate) -> Statistics {
        let total = self.count(predicate);
        let mut wide = predicate.clone();
        wide.limit = wide.scan_cap;
        let visible = self.query(&wide, true).len();
        Statistics { window: predicate.bounds.describe(), total, visible }
    }

    /// Single write-back attempt, located by the record's title as read.
    pub fn rewrite(&self, original_title: &str, title: &str, body: &str) -> Result<(), StoreError> {
        self.store.rewrite(original_title, title, body, self.timeout)
    }
}
