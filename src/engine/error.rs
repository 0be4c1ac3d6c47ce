use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;

/// Every caller-facing failure carries the dates or periods it is about,
/// so a client can point at the exact night or rule that was rejected.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid range: check-out {check_out} must be after check-in {check_in}")]
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("invalid price {price}: {what} must be positive")]
    InvalidPrice { what: &'static str, price: Decimal },

    #[error(
        "seasonal period '{candidate_name}' [{candidate_start}, {candidate_end}] overlaps \
         '{existing_name}' ({existing}) [{existing_start}, {existing_end}]"
    )]
    SeasonalConflict {
        candidate: Ulid,
        candidate_name: String,
        candidate_start: NaiveDate,
        candidate_end: NaiveDate,
        existing: Ulid,
        existing_name: String,
        existing_start: NaiveDate,
        existing_end: NaiveDate,
    },

    #[error("check-in date {date} is unavailable")]
    CheckInUnavailable { date: NaiveDate },

    #[error("dates unavailable: {}", join_dates(.dates))]
    RangeUnavailable { dates: Vec<NaiveDate> },

    #[error("booking {booking_id}: dates taken before payment confirmed: {}", join_dates(.dates))]
    StaleAvailability {
        booking_id: Ulid,
        dates: Vec<NaiveDate>,
    },

    #[error("room not found: {0}")]
    RoomNotFound(Ulid),

    #[error("booking not found: {0}")]
    BookingNotFound(Ulid),

    #[error("seasonal price not found: {0}")]
    SeasonalPriceNotFound(Ulid),

    #[error("already exists: {0}")]
    AlreadyExists(Ulid),

    #[error("booking {id} is {from}; cannot {action}")]
    InvalidTransition {
        id: Ulid,
        from: BookingStatus,
        action: &'static str,
    },

    #[error("room {0} still has bookings")]
    RoomInUse(Ulid),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("WAL error: {0}")]
    WalError(String),
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| crate::dates::date_key(*d))
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    /// Dates a client should highlight, if the error is about specific nights.
    pub fn offending_dates(&self) -> Vec<NaiveDate> {
        match self {
            EngineError::CheckInUnavailable { date } => vec![*date],
            EngineError::RangeUnavailable { dates } | EngineError::StaleAvailability { dates, .. } => {
                dates.clone()
            }
            _ => Vec::new(),
        }
    }
}
