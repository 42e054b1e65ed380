//! Free-form date tokens from the command line.
//!
//! Resolution order is fixed: integer day offset, `YYYY-MM-DD`, `DD/MM/YYYY`,
//! then `MM/DD/YYYY`. An ambiguous token such as `01/02/2024` therefore means
//! 1 February. All instants are naive local time.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::{Result, VoyeurError};

const CALENDAR_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Resolve `token` relative to the current local time.
pub fn resolve(token: &str) -> Result<NaiveDateTime> {
    resolve_at(token, Local::now().naive_local())
}

pub fn resolve_at(token: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let trimmed = token.trim();
    let invalid = || VoyeurError::InvalidDate { token: token.to_string() };

    if let Ok(days) = trimmed.parse::<i64>() {
        return TimeDelta::try_days(days)
            .and_then(|delta| now.checked_sub_signed(delta))
            .ok_or_else(invalid);
    }

    CALENDAR_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
        .ok_or_else(invalid)
}

/// 00:00:00 of the bound's calendar day.
pub fn start_of_day(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(NaiveTime::MIN)
}

/// 23:59:59 of the bound's calendar day.
pub fn end_of_day(instant: NaiveDateTime) -> NaiveDateTime {
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    instant.date().and_time(last)
}
