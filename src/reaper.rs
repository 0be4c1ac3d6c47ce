use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{now_ms, Engine};
use crate::model::Ms;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// One sweep: fail every booking still unpaid `ttl` ms after creation.
/// Returns how many were expired.
pub async fn sweep_expired(engine: &Engine, now: Ms, ttl: Ms) -> usize {
    let mut expired = 0;
    for booking_id in engine.collect_stale_bookings(now, ttl) {
        match engine.expire_booking(booking_id, now, ttl).await {
            Ok(true) => {
                info!(booking = %booking_id, "expired unpaid booking");
                expired += 1;
            }
            // Paid or removed since collection
            Ok(false) => debug!(booking = %booking_id, "expiry skipped"),
            Err(e) => warn!(booking = %booking_id, error = %e, "expiry failed"),
        }
    }
    expired
}

/// Background task that expires unpaid bookings.
pub async fn run_expiry_sweeper(engine: Arc<Engine>, ttl: Ms) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        sweep_expired(&engine, now_ms(), ttl).await;
    }
}

/// Background task that compacts the WAL once enough events have piled up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!(appends, "compacted WAL"),
            Err(e) => warn!(error = %e, "WAL compaction failed"),
        }
    }
}
