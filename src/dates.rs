//! Calendar-date arithmetic and the single UTC normalization boundary.
//!
//! Every timestamp that becomes a calendar date goes through [`day_of`], and
//! every calendar date that becomes a timestamp goes through [`midnight_ms`].
//! Both use UTC midnight; nothing else in the crate converts between the two.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::model::Ms;

pub const MS_PER_DAY: Ms = 86_400_000;

/// Calendar date (UTC) containing the instant `ms`.
pub fn day_of(ms: Ms) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Unix ms of UTC midnight at the start of `date`.
pub fn midnight_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Persisted key form: `YYYY-MM-DD`.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Half-open stay `[check_in, check_out)` in whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, EngineError> {
        if check_out <= check_in {
            return Err(EngineError::InvalidRange { check_in, check_out });
        }
        Ok(Self { check_in, check_out })
    }

    /// Build a stay from booking timestamps, normalizing both ends to UTC days.
    pub fn from_instants(check_in: Ms, check_out: Ms) -> Result<Self, EngineError> {
        let ci = day_of(check_in).ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        let co = day_of(check_out).ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        Self::new(ci, co)
    }

    pub fn night_count(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn nights(&self) -> Vec<NaiveDate> {
        std::iter::successors(Some(self.check_in), |d| d.succ_opt())
            .take_while(|d| *d < self.check_out)
            .collect()
    }

    pub fn contains_night(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Half-open overlap: a stay ending on another's arrival day does not overlap it.
    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

/// Nights of `[check_in, check_out)`, ordered. The checkout date is excluded.
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> Result<Vec<NaiveDate>, EngineError> {
    Ok(Stay::new(check_in, check_out)?.nights())
}

/// Closed-interval overlap. Sharing a single boundary date counts.
pub fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Inclusive membership in `[start, end]`.
pub fn contains(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= date && date <= end
}

#[cfg(test)]
pub(crate) fn d(s: &str) -> NaiveDate {
    parse_date_key(s).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nights_exclude_checkout() {
        let nights = nights_between(d("2025-06-17"), d("2025-06-20")).unwrap();
        assert_eq!(nights, vec![d("2025-06-17"), d("2025-06-18"), d("2025-06-19")]);
    }

    #[test]
    fn nights_cross_month_and_year() {
        let nights = nights_between(d("2025-12-30"), d("2026-01-02")).unwrap();
        assert_eq!(nights.len(), 3);
        assert_eq!(nights[2], d("2026-01-01"));
    }

    #[test]
    fn zero_length_stay_rejected() {
        let r = nights_between(d("2025-06-17"), d("2025-06-17"));
        assert!(matches!(r, Err(EngineError::InvalidRange { .. })));
        let r = nights_between(d("2025-06-18"), d("2025-06-17"));
        assert!(matches!(r, Err(EngineError::InvalidRange { .. })));
    }

    #[test]
    fn closed_overlap_counts_shared_boundary() {
        assert!(overlaps(d("2025-12-20"), d("2025-12-26"), d("2025-12-26"), d("2026-01-02")));
        assert!(!overlaps(d("2025-12-20"), d("2025-12-25"), d("2025-12-26"), d("2026-01-02")));
        // containment either way
        assert!(overlaps(d("2025-01-01"), d("2025-01-31"), d("2025-01-10"), d("2025-01-11")));
        assert!(overlaps(d("2025-01-10"), d("2025-01-11"), d("2025-01-01"), d("2025-01-31")));
    }

    #[test]
    fn contains_is_inclusive() {
        assert!(contains(d("2025-06-15"), d("2025-06-15"), d("2025-06-22")));
        assert!(contains(d("2025-06-22"), d("2025-06-15"), d("2025-06-22")));
        assert!(!contains(d("2025-06-23"), d("2025-06-15"), d("2025-06-22")));
    }

    #[test]
    fn stay_half_open_overlap() {
        let a = Stay::new(d("2025-08-01"), d("2025-08-03")).unwrap();
        let b = Stay::new(d("2025-08-03"), d("2025-08-05")).unwrap();
        let c = Stay::new(d("2025-08-02"), d("2025-08-04")).unwrap();
        assert!(!a.overlaps(&b)); // same-day turnover
        assert!(a.overlaps(&c));
        assert!(a.contains_night(d("2025-08-02")));
        assert!(!a.contains_night(d("2025-08-03")));
    }

    #[test]
    fn day_of_uses_utc_midnight() {
        let midnight = midnight_ms(d("2025-07-10"));
        assert_eq!(day_of(midnight), Some(d("2025-07-10")));
        assert_eq!(day_of(midnight + MS_PER_DAY - 1), Some(d("2025-07-10")));
        assert_eq!(day_of(midnight - 1), Some(d("2025-07-09")));
    }

    #[test]
    fn from_instants_normalizes_time_of_day() {
        // 15:00 arrival, 11:00 departure next day is still one night
        let ci = midnight_ms(d("2025-07-09")) + 15 * 3_600_000;
        let co = midnight_ms(d("2025-07-10")) + 11 * 3_600_000;
        let stay = Stay::from_instants(ci, co).unwrap();
        assert_eq!(stay.night_count(), 1);
        assert_eq!(stay.nights(), vec![d("2025-07-09")]);
    }

    #[test]
    fn date_key_roundtrip_format() {
        assert_eq!(date_key(d("2025-01-05")), "2025-01-05");
        assert_eq!(parse_date_key("2025-13-01"), None);
        assert_eq!(parse_date_key(" 2025-02-28 "), Some(d("2025-02-28")));
    }
}
