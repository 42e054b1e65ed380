use crate::record::Record;

/// Case-insensitive substring test.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Check if a record carries the tag anywhere in title or body.
pub fn record_has_tag(record: &Record, tag: &str) -> bool {
    contains_ignore_case(&record.title, tag) || contains_ignore_case(&record.body, tag)
}

/// Marker exclusion runs first, so a marked record never surfaces even when
/// it matches the tag.
pub fn matches(record: &Record, tag: Option<&str>, exclude_marked: bool) -> bool {
    if exclude_marked && record.is_marked() {
        return false;
    }
    tag.is_none_or(|t| record_has_tag(record, t))
}

pub fn filter(records: Vec<Record>, tag: Option<&str>, exclude_marked: bool) -> Vec<Record> {
    records.into_iter().filter(|r| matches(r, tag, exclude_marked)).collect()
}
