use chrono::NaiveDate;

use crate::dates::Stay;
use crate::limits::*;
use crate::model::RoomState;

use super::EngineError;

/// A stay that is non-empty, within the supported date range, and not absurdly long.
pub(crate) fn checked_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<Stay, EngineError> {
    let stay = Stay::new(check_in, check_out)?;
    if check_in < min_valid_date() || check_out > max_valid_date() {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if stay.night_count() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// Accept or reject `[check_in, check_out)` against the room's calendar.
///
/// - The check-in night must not be blocked.
/// - No night strictly between check-in and check-out may be blocked.
/// - The checkout date is exempt on a one-night stay (same-day turnover).
///   On longer stays a blocked checkout date rejects the request.
pub fn check(room: &RoomState, check_in: NaiveDate, check_out: NaiveDate) -> Result<(), EngineError> {
    let stay = checked_stay(check_in, check_out)?;

    if room.calendar.is_blocked(stay.check_in) {
        return Err(EngineError::CheckInUnavailable { date: stay.check_in });
    }

    let mut blocked = match stay.check_in.succ_opt() {
        Some(first_interior) => room.calendar.blocked_between(first_interior, stay.check_out),
        None => Vec::new(),
    };
    if stay.night_count() != 1 && room.calendar.is_blocked(stay.check_out) {
        blocked.push(stay.check_out);
    }
    if !blocked.is_empty() {
        return Err(EngineError::RangeUnavailable { dates: blocked });
    }
    Ok(())
}
