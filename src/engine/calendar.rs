use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{CalendarDay, RoomState};

/// Sparse per-room availability map. A missing key means available;
/// `false` means blocked by an administrator or a confirmed booking;
/// `true` records an explicit unblock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calendar {
    days: BTreeMap<NaiveDate, bool>,
}

impl Calendar {
    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.days.get(&date) == Some(&false)
    }

    /// Idempotent.
    pub fn block_range(&mut self, nights: &[NaiveDate]) {
        self.set(nights, false);
    }

    pub fn unblock_range(&mut self, nights: &[NaiveDate]) {
        self.set(nights, true);
    }

    /// Flip one date; returns the new availability.
    pub fn toggle(&mut self, date: NaiveDate) -> bool {
        let available = self.is_blocked(date);
        self.days.insert(date, available);
        available
    }

    pub fn set(&mut self, dates: &[NaiveDate], available: bool) {
        for &date in dates {
            self.days.insert(date, available);
        }
    }

    /// Dates in `[from, to)` that are blocked.
    pub fn blocked_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        if to <= from {
            return Vec::new();
        }
        self.days
            .range(from..to)
            .filter(|(_, available)| !**available)
            .map(|(d, _)| *d)
            .collect()
    }

    /// Explicit entries, in date order.
    pub fn entries(&self) -> impl Iterator<Item = (NaiveDate, bool)> + '_ {
        self.days.iter().map(|(d, a)| (*d, *a))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Derived view for `[from, to)`: admin blocks plus confirmed-booking occupancy.
pub fn calendar_view(room: &RoomState, from: NaiveDate, to: NaiveDate) -> Vec<CalendarDay> {
    std::iter::successors(Some(from), |d| d.succ_opt())
        .take_while(|d| *d < to)
        .map(|date| {
            let booking_id = room.occupant(date);
            CalendarDay {
                date,
                available: !room.calendar.is_blocked(date) && booking_id.is_none(),
                booking_id,
            }
        })
        .collect()
}
