//! The export artifact: a cleaned copy of the run's records and its name.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::criteria::FilterCriteria;
use crate::error::{Result, VoyeurError};
use crate::record::{MARKER, Record};

const STEM: &str = "notes_export";

/// Strip the marker and the active tag from title and body. The export is
/// always the unmarked view, whatever happened in the store.
pub fn clean(records: &[Record], tag: Option<&str>) -> Vec<Record> {
    records
        .iter()
        .map(|r| {
            let mut out = r.clone();
            out.title = scrub(&out.title, tag).trim().to_string();
            out.body = scrub(&out.body, tag);
            out
        })
        .collect()
}

fn scrub(text: &str, tag: Option<&str>) -> String {
    let mut out = remove_all(text, MARKER);
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        out = remove_all(&out, tag);
    }
    out
}

/// Remove every case-insensitive occurrence of `needle`, repeating until
/// none remain (a removal can splice a new occurrence together).
fn remove_all(text: &str, needle: &str) -> String {
    let mut current = text.to_string();
    while let Some((start, end)) = find_ignore_case(&current, needle) {
        current.replace_range(start..end, "");
    }
    current
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let wanted: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if wanted.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        let mut matched = 0;
        for (offset, ch) in haystack[start..].char_indices() {
            for lower in ch.to_lowercase() {
                if wanted.get(matched) != Some(&lower) {
                    matched = usize::MAX;
                    break;
                }
                matched += 1;
            }
            if matched == usize::MAX {
                break;
            }
            if matched == wanted.len() {
                return Some((start, start + offset + ch.len_utf8()));
            }
        }
    }
    None
}

/// Deterministic name built only from the criteria: bound shape, dates as
/// `YYYYMMDD`, tag, mark flag, limit.
pub fn filename(criteria: &FilterCriteria) -> String {
    let day = |t: &chrono::NaiveDateTime| t.format("%Y%m%d").to_string();
    let mut name = match (&criteria.lower, &criteria.upper) {
        (None, None) => format!("{STEM}_recent"),
        (Some(lo), None) => format!("{STEM}_from_{}", day(lo)),
        (None, Some(hi)) => format!("{STEM}_to_{}", day(hi)),
        (Some(lo), Some(hi)) => format!("{STEM}_{}_to_{}", day(lo), day(hi)),
    };
    if let Some(tag) = criteria.tag.as_deref() {
        name.push_str("_tag_");
        name.push_str(&tag_slug(tag));
    }
    if criteria.mark {
        name.push_str("_marked");
    }
    name.push_str(&format!("_last_{}.json", criteria.limit));
    name
}

fn tag_slug(tag: &str) -> String {
    tag.trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// A caller-supplied name wins; `.json` is appended when missing.
pub fn resolve_output(explicit: Option<&str>, criteria: &FilterCriteria) -> PathBuf {
    match explicit {
        Some(name) if name.ends_with(".json") => PathBuf::from(name),
        Some(name) => PathBuf::from(format!("{name}.json")),
        None => PathBuf::from(filename(criteria)),
    }
}

pub fn write(records: &[Record], path: &Path) -> Result<()> {
    let failed = |source: std::io::Error| VoyeurError::ExportWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(records).map_err(|e| failed(e.into()))?;
    fs::write(path, json).map_err(failed)?;
    info!("exported {} records to {}", records.len(), path.display());
    Ok(())
}
