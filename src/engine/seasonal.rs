use chrono::NaiveDate;
use rust_decimal::Decimal;
use ulid::Ulid;

use crate::dates::overlaps;
use crate::limits::*;
use crate::model::{RoomState, SeasonalPricePeriod};

use super::EngineError;

/// Nightly price for `date`: the first seasonal period containing it, else the base price.
/// Periods are kept non-overlapping on write, so "first" is unambiguous.
pub fn price_for(room: &RoomState, date: NaiveDate) -> Decimal {
    room.seasonal_prices
        .iter()
        .find(|p| p.contains(date))
        .map_or(room.base_price, |p| p.price)
}

/// The period `candidate` overlaps, ignoring the one with id `excluding` (edit in place).
/// Overlap is tested on closed intervals, so a shared boundary date conflicts.
pub fn find_conflict<'a>(
    periods: &'a [SeasonalPricePeriod],
    candidate: &SeasonalPricePeriod,
    excluding: Option<Ulid>,
) -> Option<&'a SeasonalPricePeriod> {
    periods
        .iter()
        .filter(|p| Some(p.id) != excluding)
        .find(|p| overlaps(p.start_date, p.end_date, candidate.start_date, candidate.end_date))
}

pub(crate) fn validate_period(candidate: &SeasonalPricePeriod) -> Result<(), EngineError> {
    if candidate.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("seasonal period name is required"));
    }
    if candidate.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("seasonal period name too long"));
    }
    if let Some(ref desc) = candidate.description
        && desc.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("seasonal period description too long"));
        }
    if candidate.end_date < candidate.start_date {
        return Err(EngineError::InvalidRange {
            check_in: candidate.start_date,
            check_out: candidate.end_date,
        });
    }
    if candidate.price <= Decimal::ZERO {
        return Err(EngineError::InvalidPrice {
            what: "seasonal price",
            price: candidate.price,
        });
    }
    if candidate.price > max_price() {
        return Err(EngineError::LimitExceeded("seasonal price too large"));
    }
    Ok(())
}

/// Insert or replace `candidate` by id. Price is checked before overlap.
/// Returns the new set, sorted by start date.
pub fn upsert(
    periods: &[SeasonalPricePeriod],
    candidate: SeasonalPricePeriod,
) -> Result<Vec<SeasonalPricePeriod>, EngineError> {
    validate_period(&candidate)?;
    let replacing = periods.iter().any(|p| p.id == candidate.id);
    if !replacing && periods.len() >= MAX_SEASONAL_PERIODS_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many seasonal periods on room"));
    }
    if let Some(existing) = find_conflict(periods, &candidate, Some(candidate.id)) {
        return Err(EngineError::SeasonalConflict {
            candidate: candidate.id,
            candidate_name: candidate.name.clone(),
            candidate_start: candidate.start_date,
            candidate_end: candidate.end_date,
            existing: existing.id,
            existing_name: existing.name.clone(),
            existing_start: existing.start_date,
            existing_end: existing.end_date,
        });
    }

    let mut next: Vec<SeasonalPricePeriod> = periods
        .iter()
        .filter(|p| p.id != candidate.id)
        .cloned()
        .collect();
    let pos = next.partition_point(|p| p.start_date < candidate.start_date);
    next.insert(pos, candidate);
    Ok(next)
}

/// Apply an already-validated upsert in place (replay path).
pub(crate) fn apply_upsert(periods: &mut Vec<SeasonalPricePeriod>, period: SeasonalPricePeriod) {
    periods.retain(|p| p.id != period.id);
    let pos = periods.partition_point(|p| p.start_date < period.start_date);
    periods.insert(pos, period);
}
