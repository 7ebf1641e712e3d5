use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::model::{BookingStatus, Failure};

// ── Run metrics ─────────────────────────────────────────────────

/// Counter: bookings that reached a terminal state. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "campsync_bookings_total";

/// Counter: duplicate booking ids skipped within a run.
pub const DUPLICATES_TOTAL: &str = "campsync_duplicates_total";

/// Histogram: time to find (or restore) a unit for one booking, in seconds.
pub const ALLOCATION_DURATION_SECONDS: &str = "campsync_allocation_duration_seconds";

/// Histogram: wall time of a whole pipeline run, in seconds.
pub const RUN_DURATION_SECONDS: &str = "campsync_run_duration_seconds";

// ── Downstream writes ───────────────────────────────────────────

/// Counter: failed collaborator calls. Labels: store.
pub const WRITE_FAILURES_TOTAL: &str = "campsync_write_failures_total";

/// Counter: document inserts skipped because the booking already existed.
pub const DOCUMENT_SKIPS_TOTAL: &str = "campsync_document_skips_total";

/// Counter: journaled reservations re-applied at startup.
pub const OCCUPANCY_RESTORED_TOTAL: &str = "campsync_occupancy_restored_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a booking status to a short label for metrics.
pub fn outcome_label(status: &BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Allocated => "allocated",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Failed(Failure::Validation) => "failed_validation",
        BookingStatus::Failed(Failure::NoCapacity) => "failed_no_capacity",
        BookingStatus::Failed(Failure::WriteError) => "failed_write_error",
    }
}
