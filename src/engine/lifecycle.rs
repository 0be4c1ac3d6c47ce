use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::dates::{midnight_ms, Stay};
use crate::limits::*;
use crate::model::*;
use crate::observability as obs;

use super::pricing::quote;
use super::validator::check;
use super::{now_ms, Engine, EngineError};

pub const STALE_AVAILABILITY_REASON: &str = "stale availability";
pub const EXPIRED_REASON: &str = "expired";

fn validate_new_booking(req: &NewBooking) -> Result<(), EngineError> {
    if req.guest.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("guest name is required"));
    }
    if req.guest.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("guest name too long"));
    }
    for field in [&req.guest.email, &req.guest.phone] {
        if field.as_ref().is_some_and(|s| s.len() > MAX_NAME_LEN) {
            return Err(EngineError::LimitExceeded("guest contact too long"));
        }
    }
    if req.special_requests.as_ref().is_some_and(|s| s.len() > MAX_TEXT_LEN) {
        return Err(EngineError::LimitExceeded("special requests too long"));
    }
    if req.adults == 0 {
        return Err(EngineError::InvalidInput("at least one adult is required"));
    }
    if req.adults.saturating_add(req.children) > MAX_GUESTS {
        return Err(EngineError::LimitExceeded("too many guests"));
    }
    Ok(())
}

fn stay_of(b: &Booking) -> Result<Stay, EngineError> {
    Stay::from_instants(b.check_in, b.check_out)
}

impl Engine {
    /// Validate, price and record a booking as `awaiting_payment`. The calendar is untouched
    /// until payment is confirmed.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, EngineError> {
        validate_new_booking(&req)?;
        let stay = Stay::from_instants(req.check_in, req.check_out)?;
        let id = req.id;
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        // Claim the id before taking any room lock; two rooms never see the same booking id.
        match self.entity_to_room.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(req.room_id);
            }
        }

        let result = self.insert_booking(req, stay).await;
        if result.is_err() {
            self.entity_to_room.remove(&id);
        }
        result
    }

    async fn insert_booking(&self, req: NewBooking, stay: Stay) -> Result<Booking, EngineError> {
        let room_id = req.room_id;
        let mut guard = self.room_write(room_id).await?;
        if guard.bookings.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        check(&guard, stay.check_in, stay.check_out)?;
        let q = quote(&guard, stay.check_in, stay.check_out)?;

        let now = now_ms();
        let booking = Booking {
            id: req.id,
            room_id,
            guest: req.guest,
            check_in: midnight_ms(stay.check_in),
            check_out: midnight_ms(stay.check_out),
            adults: req.adults,
            children: req.children,
            total_price: q.total,
            status: BookingStatus::AwaitingPayment,
            payment_status: PaymentStatus::Pending,
            payment_ref: None,
            special_requests: req.special_requests,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        let event = Event::BookingCreated { booking: booking.clone() };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(obs::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(booking = %booking.id, room = %room_id, total = %booking.total_price, "booking created");
        Ok(booking)
    }

    /// Payment succeeded. Re-checks the calendar and re-prices under the room lock,
    /// then records status change and night blocks as one event.
    pub async fn confirm_booking(&self, id: Ulid, payment_ref: String) -> Result<Booking, EngineError> {
        if payment_ref.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("payment reference too long"));
        }
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.bookings[&id].clone();

        match booking.status {
            BookingStatus::Confirmed => {
                debug!(booking = %id, "confirm on confirmed booking, nothing to do");
                return Ok(booking);
            }
            BookingStatus::Cancelled | BookingStatus::Completed => {
                return Err(EngineError::InvalidTransition {
                    id,
                    from: booking.status,
                    action: "confirm",
                });
            }
            BookingStatus::Pending | BookingStatus::AwaitingPayment => {}
        }

        let stay = stay_of(&booking)?;
        if let Err(e) = check(&guard, stay.check_in, stay.check_out) {
            let dates = e.offending_dates();
            if dates.is_empty() {
                return Err(e);
            }
            let event = Event::BookingFailed {
                id,
                room_id,
                reason: STALE_AVAILABILITY_REASON.to_string(),
                at: now_ms(),
            };
            self.persist_and_apply(room_id, &mut guard, &event).await?;
            metrics::counter!(obs::STALE_CONFIRMATIONS_TOTAL).increment(1);
            metrics::counter!(obs::BOOKINGS_FAILED_TOTAL).increment(1);
            warn!(booking = %id, room = %room_id, error = %e, "payment confirmed for dates no longer free");
            return Err(EngineError::StaleAvailability { booking_id: id, dates });
        }

        let q = quote(&guard, stay.check_in, stay.check_out)?;
        if q.total != booking.total_price {
            warn!(
                booking = %id,
                stored = %booking.total_price,
                recomputed = %q.total,
                "price changed between booking and confirmation"
            );
        }

        let event = Event::BookingConfirmed {
            id,
            room_id,
            payment_ref,
            total_price: q.total,
            nights: stay.nights(),
            at: now_ms(),
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(obs::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        info!(booking = %id, room = %room_id, nights = stay.night_count(), "booking confirmed");
        Ok(guard.bookings[&id].clone())
    }

    /// Payment failed or abandoned. The record is kept as `cancelled`.
    pub async fn fail_booking(&self, id: Ulid, reason: String) -> Result<Booking, EngineError> {
        if reason.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("failure reason too long"));
        }
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let status = guard.bookings[&id].status;
        match status {
            BookingStatus::Cancelled => return Ok(guard.bookings[&id].clone()),
            BookingStatus::Confirmed | BookingStatus::Completed => {
                return Err(EngineError::InvalidTransition { id, from: status, action: "fail" });
            }
            BookingStatus::Pending | BookingStatus::AwaitingPayment => {}
        }

        let event = Event::BookingFailed { id, room_id, reason, at: now_ms() };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(obs::BOOKINGS_FAILED_TOTAL).increment(1);
        info!(booking = %id, room = %room_id, "booking failed");
        Ok(guard.bookings[&id].clone())
    }

    /// Administrative cancel. A confirmed booking gives its nights back and is refunded.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = &guard.bookings[&id];
        let released = match booking.status {
            BookingStatus::Pending | BookingStatus::AwaitingPayment => Vec::new(),
            BookingStatus::Confirmed => stay_of(booking)?.nights(),
            from @ (BookingStatus::Cancelled | BookingStatus::Completed) => {
                return Err(EngineError::InvalidTransition { id, from, action: "cancel" });
            }
        };

        let event = Event::BookingCancelled { id, room_id, released, at: now_ms() };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        info!(booking = %id, room = %room_id, "booking cancelled");
        Ok(guard.bookings[&id].clone())
    }

    pub async fn complete_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let from = guard.bookings[&id].status;
        if from != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition { id, from, action: "complete" });
        }
        let event = Event::BookingCompleted { id, room_id, at: now_ms() };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(guard.bookings[&id].clone())
    }

    /// Remove a booking that never held nights on the calendar.
    pub async fn delete_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let from = guard.bookings[&id].status;
        if matches!(from, BookingStatus::Confirmed | BookingStatus::Completed) {
            return Err(EngineError::InvalidTransition { id, from, action: "delete" });
        }
        let event = Event::BookingDeleted { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Unpaid bookings created at or before `now - ttl`.
    pub fn collect_stale_bookings(&self, now: Ms, ttl: Ms) -> Vec<Ulid> {
        let mut stale = Vec::new();
        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for b in guard.bookings.values() {
                    if is_awaiting(b.status) && b.created_at.saturating_add(ttl) <= now {
                        stale.push(b.id);
                    }
                }
            }
        }
        stale
    }

    /// Fail a booking that is still unpaid past its TTL. Returns `false` if it was
    /// confirmed or removed in the meantime.
    pub async fn expire_booking(&self, id: Ulid, now: Ms, ttl: Ms) -> Result<bool, EngineError> {
        let (room_id, mut guard) = match self.resolve_booking_write(&id).await {
            Ok(found) => found,
            Err(EngineError::BookingNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let b = &guard.bookings[&id];
        if !is_awaiting(b.status) || b.created_at.saturating_add(ttl) > now {
            return Ok(false);
        }
        let event = Event::BookingFailed {
            id,
            room_id,
            reason: EXPIRED_REASON.to_string(),
            at: now,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(obs::BOOKINGS_EXPIRED_TOTAL).increment(1);
        Ok(true)
    }
}

fn is_awaiting(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::AwaitingPayment)
}
