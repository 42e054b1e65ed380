//! Writes the marker back into the store.
//!
//! One write per record, strictly in sequence, no retries. Idempotency rests
//! on the title prefix: a record whose title already starts with the marker
//! is never written again.

use log::{info, warn};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd, html};

use crate::error::VoyeurError;
use crate::gateway::Gateway;
use crate::record::{MARKER, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkStatus {
    Marked,
    AlreadyMarked,
    /// The store's error text, verbatim.
    WriteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub title: String,
    pub status: MarkStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkReport {
    pub outcomes: Vec<MarkOutcome>,
}

impl MarkReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn marked(&self) -> usize {
        self.count(|s| *s == MarkStatus::Marked)
    }

    pub fn already_marked(&self) -> usize {
        self.count(|s| *s == MarkStatus::AlreadyMarked)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, MarkStatus::WriteFailed(_)))
    }

    fn count(&self, pred: impl Fn(&MarkStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn summary(&self) -> String {
        format!("{} / {} marked", self.marked(), self.total())
    }
}

pub fn marked_title(title: &str) -> String {
    format!("{MARKER} {title}")
}

/// Level-1 HTML heading of `title` (escaped) followed by the original body.
pub fn marked_body(title: &str, body: &str) -> String {
    let events = [
        Event::Start(Tag::Heading {
            level: HeadingLevel::H1,
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
        }),
        Event::Text(CowStr::Borrowed(title)),
        Event::End(TagEnd::Heading(HeadingLevel::H1)),
    ];
    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out.push_str(body);
    out
}

/// Mark each record of the matched (not cleaned) set. Records are located
/// in the store by their title as read.
pub fn mark(gateway: &Gateway<'_>, records: &[Record]) -> MarkReport {
    let mut report = MarkReport::default();
    for record in records {
        let status = if record.has_marker_prefix() {
            MarkStatus::AlreadyMarked
        } else {
            let title = marked_title(&record.title);
            let body = marked_body(&title, &record.body);
            match gateway.rewrite(&record.title, &title, &body) {
                Ok(()) => {
                    info!("marked `{}`", record.title);
                    MarkStatus::Marked
                }
                Err(err) => {
                    let reason = err.to_string();
                    warn!(
                        "{}",
                        VoyeurError::MutationFailed {
                            title: record.title.clone(),
                            reason: reason.clone(),
                        }
                    );
                    MarkStatus::WriteFailed(reason)
                }
            }
        };
        report.outcomes.push(MarkOutcome { title: record.title.clone(), status });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::DEFAULT_TIMEOUT;
    use crate::gateway::tests::{MockStore, at};

    fn rec(title: &str, body: &str) -> Record {
        let t = at(2024, 1, 5, 9, 0, 0);
        Record::new(title, body, t, t)
    }

    #[test]
    fn heading_is_escaped_html() {
        let body = marked_body("A <b> & C", "<div>rest</div>");
        assert_eq!(body, "<h1>A &lt;b&gt; &amp; C</h1>\n<div>rest</div>");
    }

    #[test]
    fn marks_unmarked_and_skips_marked() {
        let store = MockStore::default();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let records = vec![rec("Plan", "<div>x</div>"), rec(&marked_title("Old"), "y")];

        let report = mark(&gw, &records);

        assert_eq!(report.summary(), "1 / 2 marked");
        assert_eq!(report.already_marked(), 1);
        let writes = store.writes.borrow();
        assert_eq!(writes.len(), 1);
        let (original, title, body) = &writes[0];
        assert_eq!(original, "Plan");
        assert_eq!(title, &format!("{MARKER} Plan"));
        assert!(body.starts_with(&format!("<h1>{MARKER} Plan</h1>")));
        assert!(body.ends_with("<div>x</div>"));
    }

    #[test]
    fn already_marked_never_writes() {
        let store = MockStore::default();
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let report = mark(&gw, &[rec(&marked_title("Done"), "")]);
        assert_eq!(report.outcomes[0].status, MarkStatus::AlreadyMarked);
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn write_failure_is_isolated() {
        let store = MockStore { reject_writes: true, ..Default::default() };
        let gw = Gateway::new(&store, DEFAULT_TIMEOUT);
        let report = mark(&gw, &[rec("a", ""), rec("b", "")]);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.summary(), "0 / 2 marked");
        match &report.outcomes[1].status {
            MarkStatus::WriteFailed(msg) => assert!(msg.contains("Notes got an error")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
