//! Hard caps on input sizes. Anything over a cap is rejected with
//! `EngineError::LimitExceeded` before it reaches the WAL.

use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const MAX_PROPERTIES: usize = 1_000;
pub const MAX_PROPERTY_NAME_LEN: usize = 256;

pub const MAX_ROOMS_PER_PROPERTY: usize = 10_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 1_024;

pub const MAX_SEASONAL_PERIODS_PER_ROOM: usize = 500;
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;

pub const MAX_STAY_NIGHTS: i64 = 365;
pub const MAX_CALENDAR_WINDOW_DAYS: i64 = 732;
pub const MAX_DATES_PER_WRITE: usize = 1_000;

pub const MAX_GUESTS: u32 = 50;

/// Nightly and base prices. Keeps a year of nights plus fee well inside `Decimal` range.
pub fn max_price() -> Decimal {
    Decimal::new(1_000_000_000, 0)
}

pub fn max_fee_percent() -> Decimal {
    Decimal::new(1_000, 0)
}

pub fn min_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn max_valid_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}
