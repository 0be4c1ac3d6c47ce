use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "innkeep_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "innkeep_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "innkeep_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "innkeep_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "innkeep_connections_rejected_total";

/// Gauge: number of open properties (loaded engines).
pub const PROPERTIES_ACTIVE: &str = "innkeep_properties_active";

/// Counter: connections that ended in an error, failed startup and auth included.
pub const CONNECTION_ERRORS_TOTAL: &str = "innkeep_connection_errors_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

// ── Booking lifecycle ───────────────────────────────────────────

pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "innkeep_bookings_confirmed_total";
pub const BOOKINGS_FAILED_TOTAL: &str = "innkeep_bookings_failed_total";

/// Counter: unpaid bookings failed by the expiry sweeper.
pub const BOOKINGS_EXPIRED_TOTAL: &str = "innkeep_bookings_expired_total";

/// Counter: payments that arrived after the stay's nights were taken.
pub const STALE_CONFIRMATIONS_TOTAL: &str = "innkeep_stale_confirmations_total";

/// Counter: quotes that fell back to base pricing.
pub const PRICING_FALLBACKS_TOTAL: &str = "innkeep_pricing_fallbacks_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::DeleteRoom { .. } => "delete_room",
        Command::UpsertSeasonalPrice { .. } => "upsert_seasonal_price",
        Command::DeleteSeasonalPrice { .. } => "delete_seasonal_price",
        Command::SetAvailability { .. } => "set_availability",
        Command::ToggleDate { .. } => "toggle_date",
        Command::InsertBooking(_) => "insert_booking",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::PaymentSucceeded { .. } => "payment_succeeded",
        Command::PaymentFailed { .. } => "payment_failed",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::CompleteBooking { .. } => "complete_booking",
        Command::SelectRooms => "select_rooms",
        Command::SelectSeasonalPrices { .. } => "select_seasonal_prices",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectCalendar { .. } => "select_calendar",
        Command::SelectQuote { .. } => "select_quote",
        Command::SelectAvailability { .. } => "select_availability",
    }
}
