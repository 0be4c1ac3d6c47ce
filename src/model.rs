use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::dates::Stay;
use crate::engine::Calendar;

/// Unix milliseconds. The only instant type.
pub type Ms = i64;

/// Admin-defined override of the base nightly price for a closed date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalPricePeriod {
    pub id: Ulid,
    pub name: String,
    /// Inclusive.
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub price: Decimal,
    pub description: Option<String>,
}

impl SeasonalPricePeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        crate::dates::contains(date, self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    AwaitingPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Bookings in these states hold (or may yet hold) nights on the calendar.
    pub fn is_live(self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest: Guest,
    /// UTC midnight of the arrival day.
    pub check_in: Ms,
    /// UTC midnight of the departure day (exclusive).
    pub check_out: Ms,
    pub adults: u32,
    pub children: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_ref: Option<String>,
    pub special_requests: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    pub fn stay(&self) -> Option<Stay> {
        Stay::from_instants(self.check_in, self.check_out).ok()
    }
}

/// What a caller supplies to open a booking; the engine fills in price and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub guest: Guest,
    pub check_in: Ms,
    pub check_out: Ms,
    pub adults: u32,
    pub children: u32,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub name: Option<String>,
    pub base_price: Decimal,
    /// `None` = not configured (defaults to 10%); `Some(0)` = explicitly no fee.
    pub service_fee_percent: Option<Decimal>,
    /// Pairwise non-overlapping, sorted by `start_date`.
    pub seasonal_prices: Vec<SeasonalPricePeriod>,
    pub calendar: Calendar,
    /// Every booking for this room, any status. ULIDs sort by creation time.
    pub bookings: BTreeMap<Ulid, Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, name: Option<String>, base_price: Decimal, service_fee_percent: Option<Decimal>) -> Self {
        Self {
            id,
            name,
            base_price,
            service_fee_percent,
            seasonal_prices: Vec::new(),
            calendar: Calendar::default(),
            bookings: BTreeMap::new(),
        }
    }

    /// Confirmed (or completed) booking occupying `date`, if any.
    pub fn occupant(&self, date: NaiveDate) -> Option<Ulid> {
        self.bookings
            .values()
            .filter(|b| matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed))
            .find(|b| b.stay().is_some_and(|s| s.contains_night(date)))
            .map(|b| b.id)
    }

    pub fn has_live_bookings(&self) -> bool {
        self.bookings.values().any(|b| b.status.is_live())
    }
}

/// The event types. Flat, no nesting beyond the booking record. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: Option<String>,
        base_price: Decimal,
        service_fee_percent: Option<Decimal>,
    },
    RoomUpdated {
        id: Ulid,
        name: Option<String>,
        base_price: Decimal,
        service_fee_percent: Option<Decimal>,
    },
    RoomDeleted {
        id: Ulid,
    },
    SeasonalPriceUpserted {
        room_id: Ulid,
        period: SeasonalPricePeriod,
    },
    SeasonalPriceRemoved {
        id: Ulid,
        room_id: Ulid,
    },
    /// Per-date merge into the room's availability map.
    AvailabilitySet {
        room_id: Ulid,
        dates: Vec<NaiveDate>,
        available: bool,
    },
    BookingCreated {
        booking: Booking,
    },
    /// Status change and calendar block in one record.
    BookingConfirmed {
        id: Ulid,
        room_id: Ulid,
        payment_ref: String,
        total_price: Decimal,
        nights: Vec<NaiveDate>,
        at: Ms,
    },
    BookingFailed {
        id: Ulid,
        room_id: Ulid,
        reason: String,
        at: Ms,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
        released: Vec<NaiveDate>,
        at: Ms,
    },
    BookingCompleted {
        id: Ulid,
        room_id: Ulid,
        at: Ms,
    },
    BookingDeleted {
        id: Ulid,
        room_id: Ulid,
    },
}

impl Event {
    /// Room the event applies to.
    pub fn room_id(&self) -> Ulid {
        match self {
            Event::RoomCreated { id, .. } | Event::RoomUpdated { id, .. } | Event::RoomDeleted { id } => *id,
            Event::SeasonalPriceUpserted { room_id, .. }
            | Event::SeasonalPriceRemoved { room_id, .. }
            | Event::AvailabilitySet { room_id, .. }
            | Event::BookingConfirmed { room_id, .. }
            | Event::BookingFailed { room_id, .. }
            | Event::BookingCancelled { room_id, .. }
            | Event::BookingCompleted { room_id, .. }
            | Event::BookingDeleted { room_id, .. } => *room_id,
            Event::BookingCreated { booking } => booking.room_id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub base_price: Decimal,
    pub service_fee_percent: Option<Decimal>,
}

/// One date of the derived calendar view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub available: bool,
    /// Confirmed booking occupying this night, if any.
    pub booking_id: Option<Ulid>,
}
