use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Failures that end an invocation, plus the per-record kinds that are
/// collected into reports instead of aborting.
#[derive(Debug, Error)]
pub enum VoyeurError {
    #[error("invalid date `{token}`: expected N (days ago), YYYY-MM-DD, DD/MM/YYYY or MM/DD/YYYY")]
    InvalidDate { token: String },

    #[error("note store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("note store call exceeded {secs}s")]
    StoreTimeout { secs: u64 },

    #[error("record unreadable: {0}")]
    RecordUnreadable(String),

    #[error("could not mark `{title}`: {reason}")]
    MutationFailed { title: String, reason: String },

    #[error("could not write export to {}: {source}", .path.display())]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl From<StoreError> for VoyeurError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(d) => VoyeurError::StoreTimeout { secs: d.as_secs() },
            StoreError::Unreadable(msg) => VoyeurError::RecordUnreadable(msg),
            other => VoyeurError::StoreUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoyeurError>;
