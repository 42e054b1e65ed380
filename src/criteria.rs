use chrono::{NaiveDateTime, TimeDelta};

use crate::dates::{end_of_day, start_of_day};

/// Source records examined before a scan gives up, regardless of matches.
pub const SCAN_DEPTH: usize = 500;
pub const DEFAULT_LIMIT: usize = 5;
/// Window used when neither bound is given.
pub const RECENT_DAYS: i64 = 30;

/// Everything the user asked for in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub lower: Option<NaiveDateTime>,
    pub upper: Option<NaiveDateTime>,
    pub tag: Option<String>,
    pub limit: usize,
    pub mark: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self { lower: None, upper: None, tag: None, limit: DEFAULT_LIMIT, mark: false }
    }
}

impl FilterCriteria {
    pub fn predicate(&self, now: NaiveDateTime) -> Predicate {
        build(self.lower, self.upper, self.limit, self.tag.clone(), now)
    }
}

/// Time-bound shape understood by the store. Bounds are already normalized
/// to whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    /// No bound given: modified at or after `since`.
    None { since: NaiveDateTime },
    From(NaiveDateTime),
    To(NaiveDateTime),
    Range(NaiveDateTime, NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub bounds: Bounds,
    pub limit: usize,
    pub scan_cap: usize,
    /// Post-filter metadata only; never part of the store query.
    pub tag: Option<String>,
}

/// Build the single predicate for a run. Lower bounds snap to 00:00:00 and
/// upper bounds to 23:59:59 of their day.
pub fn build(
    lower: Option<NaiveDateTime>,
    upper: Option<NaiveDateTime>,
    limit: usize,
    tag: Option<String>,
    now: NaiveDateTime,
) -> Predicate {
    let bounds = match (lower, upper) {
        (None, None) => Bounds::None {
            since: now.checked_sub_signed(TimeDelta::days(RECENT_DAYS)).unwrap_or(NaiveDateTime::MIN),
        },
        (Some(lo), None) => Bounds::From(start_of_day(lo)),
        (None, Some(hi)) => Bounds::To(end_of_day(hi)),
        (Some(lo), Some(hi)) => Bounds::Range(start_of_day(lo), end_of_day(hi)),
    };
    Predicate { bounds, limit: limit.max(1), scan_cap: SCAN_DEPTH, tag }
}

impl Bounds {
    /// Inclusive lower instant, if any.
    pub fn lower(&self) -> Option<NaiveDateTime> {
        match *self {
            Bounds::None { since } => Some(since),
            Bounds::From(lo) | Bounds::Range(lo, _) => Some(lo),
            Bounds::To(_) => None,
        }
    }

    /// Exclusive upper instant: one second past the normalized 23:59:59, so
    /// a strict comparison still keeps the whole last day. An upper bound on
    /// the last representable day has no successor and bounds nothing.
    pub fn upper_exclusive(&self) -> Option<NaiveDateTime> {
        match *self {
            Bounds::To(hi) | Bounds::Range(_, hi) => hi.checked_add_signed(TimeDelta::seconds(1)),
            Bounds::None { .. } | Bounds::From(_) => None,
        }
    }

    pub fn contains(&self, modified: NaiveDateTime) -> bool {
        self.lower().is_none_or(|lo| modified >= lo)
            && self.upper_exclusive().is_none_or(|hi| modified < hi)
    }

    pub fn describe(&self) -> String {
        let day = |t: NaiveDateTime| t.format("%Y-%m-%d").to_string();
        match *self {
            Bounds::None { .. } => format!("modified in the last {RECENT_DAYS} days"),
            Bounds::From(lo) => format!("modified since {}", day(lo)),
            Bounds::To(hi) => format!("modified up to {}", day(hi)),
            Bounds::Range(lo, hi) => {
                format!("modified between {} and {}", day(lo), day(hi))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn four_shapes() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let lo = Some(at(2024, 1, 1, 15, 0, 0));
        let hi = Some(at(2024, 1, 31, 8, 0, 0));

        let p = build(None, None, 5, None, now);
        assert_eq!(p.bounds, Bounds::None { since: at(2024, 2, 9, 12, 0, 0) });
        assert_eq!(build(lo, None, 5, None, now).bounds, Bounds::From(at(2024, 1, 1, 0, 0, 0)));
        assert_eq!(build(None, hi, 5, None, now).bounds, Bounds::To(at(2024, 1, 31, 23, 59, 59)));
        assert_eq!(
            build(lo, hi, 5, None, now).bounds,
            Bounds::Range(at(2024, 1, 1, 0, 0, 0), at(2024, 1, 31, 23, 59, 59))
        );
    }

    #[test]
    fn limit_and_cap_attached() {
        let p = build(None, None, 0, Some("AI".into()), at(2024, 3, 10, 0, 0, 0));
        assert_eq!(p.limit, 1);
        assert_eq!(p.scan_cap, SCAN_DEPTH);
        assert_eq!(p.tag.as_deref(), Some("AI"));
    }

    #[test]
    fn upper_bound_on_last_day_does_not_overflow() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let b = build(None, Some(NaiveDateTime::MAX), 5, None, now).bounds;
        assert_eq!(b.upper_exclusive(), None);
        assert!(b.contains(now));
        assert!(b.contains(NaiveDateTime::MAX));
        let all = build(Some(NaiveDateTime::MIN), Some(NaiveDateTime::MAX), 5, None, now).bounds;
        assert!(all.contains(now));
    }

    #[test]
    fn range_edges() {
        let b = Bounds::Range(at(2024, 1, 1, 0, 0, 0), at(2024, 1, 31, 23, 59, 59));
        assert!(b.contains(at(2024, 1, 1, 0, 0, 0)));
        assert!(b.contains(at(2024, 1, 31, 23, 59, 59)));
        assert!(!b.contains(at(2024, 2, 1, 0, 0, 0)));
        assert!(!b.contains(at(2023, 12, 31, 23, 59, 59)));
    }
}
