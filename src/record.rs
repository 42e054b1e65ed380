use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Reserved literal meaning "already processed by this tool". The store has
/// no custom metadata fields, so the flag lives in the content itself.
pub const MARKER: &str = "NOTE-VOYEUR: TARGET ACQUIRED!";

/// Timestamp layout used on the automation boundary and in exports.
pub const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Transient copy of one note owned by the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub body: String,
    #[serde(with = "timestamp")]
    pub created: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub modified: NaiveDateTime,
}

impl Record {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        created: NaiveDateTime,
        modified: NaiveDateTime,
    ) -> Self {
        Self { title: title.into(), body: body.into(), created, modified }
    }

    /// Canonical "is-marked" test for exclusion: the marker appears anywhere
    /// in title or body.
    pub fn is_marked(&self) -> bool {
        self.title.contains(MARKER) || self.body.contains(MARKER)
    }

    /// Canonical idempotency test for mutation: the title starts with the
    /// marker. A record can be `is_marked` without this holding (marker
    /// pasted into a body by hand); such records are excluded from exports
    /// but would still be marked if handed to the mutation engine.
    pub fn has_marker_prefix(&self) -> bool {
        self.title.starts_with(MARKER)
    }
}

pub fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(ts.trim(), TIME_FMT)
        .or_else(|_| NaiveDateTime::parse_from_str(ts.trim(), "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIME_FMT).to_string()
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        ts: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).ok_or_else(|| {
            de::Error::custom(format!("unrecognized timestamp `{raw}`"))
        })
    }
}
