mod calendar;
mod error;
mod lifecycle;
mod mutations;
mod pricing;
mod queries;
mod seasonal;
mod validator;

pub use calendar::{calendar_view, Calendar};
pub use error::EngineError;
pub use pricing::{effective_fee_percent, quote, NightlyPrice, PricingWarning, Quote, DEFAULT_SERVICE_FEE_PERCENT};
pub use seasonal::{find_conflict, price_for, upsert};
pub use validator::check;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            // Flush what we have before compaction or stats see the log.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even after an append error, so partial bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// One property's rooms and bookings.
///
/// Each room document sits behind its own `RwLock`. Every change to a room
/// (calendar dates, seasonal prices, booking transitions) is validated and
/// applied under that room's write lock, so read-modify-write never loses
/// a concurrent update to the same room.
pub struct Engine {
    pub rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking / seasonal period id → room id.
    pub(super) entity_to_room: DashMap<Ulid, Ulid>,
}

/// Apply an event directly to a RoomState. The caller holds the lock.
fn apply_to_room(rs: &mut RoomState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated { name, base_price, service_fee_percent, .. } => {
            rs.name = name.clone();
            rs.base_price = *base_price;
            rs.service_fee_percent = *service_fee_percent;
        }
        Event::SeasonalPriceUpserted { room_id, period } => {
            seasonal::apply_upsert(&mut rs.seasonal_prices, period.clone());
            entity_map.insert(period.id, *room_id);
        }
        Event::SeasonalPriceRemoved { id, .. } => {
            rs.seasonal_prices.retain(|p| p.id != *id);
            entity_map.remove(id);
        }
        Event::AvailabilitySet { dates, available, .. } => {
            rs.calendar.set(dates, *available);
        }
        Event::BookingCreated { booking } => {
            entity_map.insert(booking.id, booking.room_id);
            rs.bookings.insert(booking.id, booking.clone());
        }
        Event::BookingConfirmed { id, payment_ref, total_price, nights, at, .. } => {
            if let Some(b) = rs.bookings.get_mut(id) {
                b.status = BookingStatus::Confirmed;
                b.payment_status = PaymentStatus::Paid;
                b.payment_ref = Some(payment_ref.clone());
                b.total_price = *total_price;
                b.updated_at = *at;
            }
            rs.calendar.block_range(nights);
        }
        Event::BookingFailed { id, reason, at, .. } => {
            if let Some(b) = rs.bookings.get_mut(id) {
                b.status = BookingStatus::Cancelled;
                b.failure_reason = Some(reason.clone());
                b.updated_at = *at;
            }
        }
        Event::BookingCancelled { id, released, at, .. } => {
            if let Some(b) = rs.bookings.get_mut(id) {
                if b.payment_status == PaymentStatus::Paid {
                    b.payment_status = PaymentStatus::Refunded;
                }
                b.status = BookingStatus::Cancelled;
                b.updated_at = *at;
            }
            rs.calendar.unblock_range(released);
        }
        Event::BookingCompleted { id, at, .. } => {
            if let Some(b) = rs.bookings.get_mut(id) {
                b.status = BookingStatus::Completed;
                b.updated_at = *at;
            }
        }
        Event::BookingDeleted { id, .. } => {
            rs.bookings.remove(id);
            entity_map.remove(id);
        }
        // RoomCreated/Deleted are handled at the DashMap level, not here
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } => {}
    }
}

fn unmap_room_entities(rs: &RoomState, entity_map: &DashMap<Ulid, Ulid>) {
    for id in rs.bookings.keys() {
        entity_map.remove(id);
    }
    for p in &rs.seasonal_prices {
        entity_map.remove(&p.id);
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            wal_tx,
            notify,
            entity_to_room: DashMap::new(),
        };

        // We're the sole owner of these Arcs during replay, so try_write always
        // succeeds. Never block here: replay may run inside an async context.
        for event in &events {
            match event {
                Event::RoomCreated { id, name, base_price, service_fee_percent } => {
                    let rs = RoomState::new(*id, name.clone(), *base_price, *service_fee_percent);
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                }
                Event::RoomDeleted { id } => {
                    if let Some((_, rs)) = engine.rooms.remove(id)
                        && let Ok(guard) = rs.try_read() {
                            unmap_room_entities(&guard, &engine.entity_to_room);
                        }
                }
                other => {
                    if let Some(entry) = engine.rooms.get(&other.room_id()) {
                        let rs_arc = entry.clone();
                        drop(entry);
                        if let Ok(mut guard) = rs_arc.try_write() {
                            apply_to_room(&mut guard, other, &engine.entity_to_room);
                        }
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn get_room_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_room.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        room_id: Ulid,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.entity_to_room);
        self.notify.send(room_id, event);
        Ok(())
    }

    /// Room lookup + write lock.
    pub(super) async fn room_write(
        &self,
        room_id: Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        Ok(rs.write_owned().await)
    }

    /// Lookup booking → room, get room, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .get_room_for_entity(booking_id)
            .ok_or(EngineError::BookingNotFound(*booking_id))?;
        let guard = self.room_write(room_id).await?;
        if !guard.bookings.contains_key(booking_id) {
            return Err(EngineError::BookingNotFound(*booking_id));
        }
        Ok((room_id, guard))
    }
}
