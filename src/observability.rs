use std::net::SocketAddr;

use crate::engine::EngineError;
use crate::model::Reservation;
use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "caravanshare_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "caravanshare_query_duration_seconds";

/// Counter: reservation attempts. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "caravanshare_reservations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "caravanshare_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "caravanshare_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "caravanshare_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
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
        Command::InsertUser { .. } => "insert_user",
        Command::InsertResource { .. } => "insert_resource",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::SelectUsers { .. } => "select_users",
        Command::SelectResources { .. } => "select_resources",
        Command::SelectReservations { .. } => "select_reservations",
        Command::SelectQuote { .. } => "select_quote",
    }
}

/// Outcome label for a reservation attempt.
pub fn reservation_outcome(result: &Result<Reservation, EngineError>) -> &'static str {
    match result {
        Ok(_) => "created",
        Err(EngineError::NotFound { .. }) => "not_found",
        Err(EngineError::InvalidDate(_)) => "invalid_date",
        Err(EngineError::ResourceUnavailable { .. }) => "unavailable",
        Err(EngineError::BookingConflict { .. }) => "conflict",
        Err(EngineError::DuplicateKey { .. }) => "duplicate",
        Err(EngineError::InvalidReservation(_) | EngineError::InvalidResource(_)) => "invalid",
        Err(EngineError::LimitExceeded(_)) => "limit",
    }
}
