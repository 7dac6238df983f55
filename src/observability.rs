use std::net::SocketAddr;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: admission attempts. Labels: outcome.
pub const ADMISSIONS_TOTAL: &str = "courtbook_admissions_total";

/// Histogram: admission latency in seconds.
pub const ADMISSION_DURATION_SECONDS: &str = "courtbook_admission_duration_seconds";

/// Counter: cancellation attempts. Labels: outcome.
pub const CANCELLATIONS_TOTAL: &str = "courtbook_cancellations_total";

/// Counter: administrative hard deletions.
pub const ADMIN_DELETES_TOTAL: &str = "courtbook_admin_deletes_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of (court, date) partitions held in memory.
pub const PARTITIONS_ACTIVE: &str = "courtbook_partitions_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "courtbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "courtbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map an admission/cancellation result to a short outcome label.
pub fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(EngineError::OutOfWindow { .. }) => "out_of_window",
        Err(EngineError::HouseCapExceeded { .. }) => "house_cap_exceeded",
        Err(EngineError::SlotTaken(_)) => "slot_taken",
        Err(EngineError::InvalidToken) => "invalid_token",
        Err(EngineError::NotFound(_)) => "not_found",
        Err(EngineError::UnknownCourt(_)) => "unknown_court",
        Err(EngineError::UnknownHouse(_)) => "unknown_house",
        Err(EngineError::OffGrid(_)) => "off_grid",
        Err(EngineError::InvalidInput(_)) => "invalid_input",
        Err(EngineError::LimitExceeded(_)) => "limit_exceeded",
        Err(EngineError::Storage(_)) => "storage",
    }
}
