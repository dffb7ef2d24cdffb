//! Metric instrument factories for fieldops.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"fieldops"` meter; without a
//! provider they are no-ops.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for fieldops instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("fieldops")
}

/// Counter: job status transitions.
/// Labels: `from`, `to`.
pub fn job_transitions() -> Counter<u64> {
    meter()
        .u64_counter("fieldops.job.transitions")
        .with_description("Number of job status transitions")
        .build()
}

/// Counter: inventory request decisions.
/// Labels: `status` ("approved" | "rejected").
pub fn inventory_decisions() -> Counter<u64> {
    meter()
        .u64_counter("fieldops.inventory.decisions")
        .with_description("Number of inventory request decisions")
        .build()
}

/// Counter: notifications appended to the feed.
/// Labels: `type`.
pub fn notifications_emitted() -> Counter<u64> {
    meter()
        .u64_counter("fieldops.notifications.emitted")
        .with_description("Number of notifications appended")
        .build()
}

/// Counter: audit entries appended.
/// Labels: `action`, `entity_type`.
pub fn audit_entries() -> Counter<u64> {
    meter()
        .u64_counter("fieldops.audit.entries")
        .with_description("Number of audit entries appended")
        .build()
}

/// Counter: engine transactions.
/// Labels: `operation`, `result` ("committed" | "rolled_back").
pub fn transactions() -> Counter<u64> {
    meter()
        .u64_counter("fieldops.transactions")
        .with_description("Number of engine transactions by outcome")
        .build()
}
