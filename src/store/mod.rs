//! The external note store, seen only through its automation surface.
//!
//! A scan carries the time bounds, the marker and tag tests and the result
//! limit, so the store can stop walking once enough records matched. The
//! gateway re-applies the same tests in-process. There is no stable record
//! identifier, so writes locate their target by the exact
//! title it had when it was read. When several records share that title the
//! first one in native order wins.

use std::time::Duration;

use thiserror::Error;

use crate::criteria::Bounds;
use crate::filter;
use crate::record::Record;

pub mod fixture;
pub mod osascript;

pub use fixture::FixtureStore;
pub use osascript::OsaScriptStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("automation call failed: {0}")]
    Unavailable(String),

    #[error("automation call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Unreadable(String),

    #[error("no record titled `{0}`")]
    NotFound(String),

    #[error("malformed store output: {0}")]
    Malformed(String),
}

/// One slot of a scan: either a readable record or the reason it was not.
pub type Scanned = Result<Record, StoreError>;

/// What a scan looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest<'a> {
    pub bounds: Bounds,
    /// Source records examined at most.
    pub scan_cap: usize,
    /// Accepted records after which the walk stops.
    pub limit: usize,
    pub tag: Option<&'a str>,
    pub exclude_marked: bool,
}

impl ScanRequest<'_> {
    pub fn accepts(&self, record: &Record) -> bool {
        self.bounds.contains(record.modified)
            && filter::matches(record, self.tag, self.exclude_marked)
    }
}

pub trait NoteStore {
    /// Records in native order that `request` accepts, plus unreadable
    /// slots met on the way. Examines at most `scan_cap` source records and
    /// stops after `limit` accepted ones.
    fn scan(
        &self,
        request: &ScanRequest<'_>,
        timeout: Duration,
    ) -> Result<Vec<Scanned>, StoreError>;

    /// Number of records inside `bounds` among the first `scan_cap`.
    fn count(
        &self,
        bounds: &Bounds,
        scan_cap: usize,
        timeout: Duration,
    ) -> Result<usize, StoreError>;

    /// Overwrite title and body of the first record titled `original_title`.
    fn rewrite(
        &self,
        original_title: &str,
        title: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<(), StoreError>;
}
