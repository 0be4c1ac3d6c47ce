use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::calendar::calendar_view;
use super::pricing::{self, Quote};
use super::validator;
use super::{Engine, EngineError, SharedRoomState};

fn info_of(rs: &RoomState) -> RoomInfo {
    RoomInfo {
        id: rs.id,
        name: rs.name.clone(),
        base_price: rs.base_price,
        service_fee_percent: rs.service_fee_percent,
    }
}

impl Engine {
    fn room(&self, room_id: Ulid) -> Result<SharedRoomState, EngineError> {
        self.get_room_state(&room_id).ok_or(EngineError::RoomNotFound(room_id))
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let all: Vec<SharedRoomState> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(all.len());
        for rs in all {
            out.push(info_of(&*rs.read().await));
        }
        out.sort_by_key(|r| r.id);
        out
    }

    pub async fn get_room(&self, room_id: Ulid) -> Result<RoomInfo, EngineError> {
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        Ok(info_of(&guard))
    }

    /// Sorted by start date.
    pub async fn get_seasonal_prices(&self, room_id: Ulid) -> Result<Vec<SeasonalPricePeriod>, EngineError> {
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        Ok(guard.seasonal_prices.clone())
    }

    /// Every booking on the room, any status, oldest first.
    pub async fn get_bookings(&self, room_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        Ok(guard.bookings.values().cloned().collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .get_room_for_entity(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        guard.bookings.get(&id).cloned().ok_or(EngineError::BookingNotFound(id))
    }

    /// Per-date availability for `[from, to)`, with confirmed occupancy folded in.
    pub async fn calendar_view(
        &self,
        room_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarDay>, EngineError> {
        if to <= from {
            return Err(EngineError::InvalidRange { check_in: from, check_out: to });
        }
        if (to - from).num_days() > MAX_CALENDAR_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("calendar window too wide"));
        }
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        Ok(calendar_view(&guard, from, to))
    }

    pub async fn quote(&self, room_id: Ulid, check_in: NaiveDate, check_out: NaiveDate) -> Result<Quote, EngineError> {
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        pricing::quote(&guard, check_in, check_out)
    }

    /// `Ok(())` if the stay could be booked right now.
    pub async fn check_availability(
        &self,
        room_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<(), EngineError> {
        let rs = self.room(room_id)?;
        let guard = rs.read().await;
        validator::check(&guard, check_in, check_out)
    }
}
