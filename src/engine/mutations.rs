use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::seasonal::upsert;
use super::{unmap_room_entities, Engine, EngineError, WalCommand};

fn validate_room(name: &Option<String>, base_price: Decimal, fee: Option<Decimal>) -> Result<(), EngineError> {
    if let Some(n) = name
        && n.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
    if base_price <= Decimal::ZERO {
        return Err(EngineError::InvalidPrice { what: "base price", price: base_price });
    }
    if base_price > max_price() {
        return Err(EngineError::LimitExceeded("base price too large"));
    }
    if let Some(fee) = fee
        && fee < Decimal::ZERO {
            return Err(EngineError::InvalidPrice { what: "service fee percent", price: fee });
        }
    if let Some(fee) = fee
        && fee > max_fee_percent() {
            return Err(EngineError::LimitExceeded("service fee percent too large"));
        }
    Ok(())
}

fn validate_dates(dates: &[NaiveDate]) -> Result<(), EngineError> {
    if dates.len() > MAX_DATES_PER_WRITE {
        return Err(EngineError::LimitExceeded("too many dates in one write"));
    }
    if dates.iter().any(|d| *d < min_valid_date() || *d > max_valid_date()) {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    Ok(())
}

impl Engine {
    pub async fn create_room(
        &self,
        id: Ulid,
        name: Option<String>,
        base_price: Decimal,
        service_fee_percent: Option<Decimal>,
    ) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS_PER_PROPERTY {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        validate_room(&name, base_price, service_fee_percent)?;
        if self.rooms.contains_key(&id) || self.entity_to_room.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::RoomCreated { id, name: name.clone(), base_price, service_fee_percent };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, name, base_price, service_fee_percent);
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);
        info!(room = %id, %base_price, "room created");
        Ok(())
    }

    pub async fn update_room(
        &self,
        id: Ulid,
        name: Option<String>,
        base_price: Decimal,
        service_fee_percent: Option<Decimal>,
    ) -> Result<(), EngineError> {
        validate_room(&name, base_price, service_fee_percent)?;
        let mut guard = self.room_write(id).await?;
        let event = Event::RoomUpdated { id, name, base_price, service_fee_percent };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Rejected while any booking other than a cancelled one references the room.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let guard = self.room_write(id).await?;
        if guard.has_live_bookings() {
            return Err(EngineError::RoomInUse(id));
        }

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        unmap_room_entities(&guard, &self.entity_to_room);
        self.rooms.remove(&id);
        drop(guard);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        info!(room = %id, "room deleted");
        Ok(())
    }

    /// Insert or edit a seasonal period. Rejects non-positive prices, then overlaps.
    pub async fn upsert_seasonal_price(
        &self,
        room_id: Ulid,
        period: SeasonalPricePeriod,
    ) -> Result<(), EngineError> {
        if let Some(owner) = self.get_room_for_entity(&period.id)
            && owner != room_id {
                return Err(EngineError::AlreadyExists(period.id));
            }
        let mut guard = self.room_write(room_id).await?;
        upsert(&guard.seasonal_prices, period.clone())?;
        let event = Event::SeasonalPriceUpserted { room_id, period };
        self.persist_and_apply(room_id, &mut guard, &event).await
    }

    pub async fn remove_seasonal_price(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let room_id = self
            .get_room_for_entity(&id)
            .ok_or(EngineError::SeasonalPriceNotFound(id))?;
        let mut guard = self.room_write(room_id).await?;
        if !guard.seasonal_prices.iter().any(|p| p.id == id) {
            return Err(EngineError::SeasonalPriceNotFound(id));
        }
        let event = Event::SeasonalPriceRemoved { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Per-date merge of `available` into the room's calendar.
    pub async fn set_dates(
        &self,
        room_id: Ulid,
        mut dates: Vec<NaiveDate>,
        available: bool,
    ) -> Result<(), EngineError> {
        validate_dates(&dates)?;
        dates.sort();
        dates.dedup();
        let mut guard = self.room_write(room_id).await?;
        if dates.is_empty() {
            return Ok(());
        }
        let event = Event::AvailabilitySet { room_id, dates, available };
        self.persist_and_apply(room_id, &mut guard, &event).await
    }

    pub async fn block_dates(&self, room_id: Ulid, dates: Vec<NaiveDate>) -> Result<(), EngineError> {
        self.set_dates(room_id, dates, false).await
    }

    pub async fn unblock_dates(&self, room_id: Ulid, dates: Vec<NaiveDate>) -> Result<(), EngineError> {
        self.set_dates(room_id, dates, true).await
    }

    /// Flip one date. Returns the new availability.
    pub async fn toggle_date(&self, room_id: Ulid, date: NaiveDate) -> Result<bool, EngineError> {
        validate_dates(&[date])?;
        let mut guard = self.room_write(room_id).await?;
        let available = guard.calendar.is_blocked(date);
        let event = Event::AvailabilitySet { room_id, dates: vec![date], available };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(available)
    }

    /// Apply `available` to every date of `[from, to_inclusive]`.
    pub async fn set_range(
        &self,
        room_id: Ulid,
        from: NaiveDate,
        to_inclusive: NaiveDate,
        available: bool,
    ) -> Result<(), EngineError> {
        if to_inclusive < from {
            return Err(EngineError::InvalidRange { check_in: from, check_out: to_inclusive });
        }
        if (to_inclusive - from).num_days() >= MAX_DATES_PER_WRITE as i64 {
            return Err(EngineError::LimitExceeded("too many dates in one write"));
        }
        let dates: Vec<NaiveDate> = std::iter::successors(Some(from), |d| d.succ_opt())
            .take_while(|d| *d <= to_inclusive)
            .collect();
        self.set_dates(room_id, dates, available).await
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    ///
    /// Read locks on every room are held until the rewrite lands, so no room write can be
    /// appended to the old log between the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut room_ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort();

        let mut guards = Vec::with_capacity(room_ids.len());
        for id in &room_ids {
            if let Some(rs) = self.get_room_state(id) {
                guards.push(rs.read_owned().await);
            }
        }

        let mut events = Vec::new();
        for guard in &guards {
            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
                base_price: guard.base_price,
                service_fee_percent: guard.service_fee_percent,
            });
            for period in &guard.seasonal_prices {
                events.push(Event::SeasonalPriceUpserted { room_id: guard.id, period: period.clone() });
            }
            let (open, blocked): (Vec<_>, Vec<_>) = guard.calendar.entries().partition(|(_, a)| *a);
            for (entries, available) in [(open, true), (blocked, false)] {
                if !entries.is_empty() {
                    events.push(Event::AvailabilitySet {
                        room_id: guard.id,
                        dates: entries.into_iter().map(|(d, _)| d).collect(),
                        available,
                    });
                }
            }
            // The snapshot carries current status, payment and price.
            for booking in guard.bookings.values() {
                events.push(Event::BookingCreated { booking: booking.clone() });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guards);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
