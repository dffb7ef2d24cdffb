//! Workflow span helpers.
//!
//! Every engine transaction runs inside a span; state changes inside it are
//! recorded as events on that span.

use tracing::Span;

/// Start a span for one engine operation.
///
/// The `fieldops.outcome` field is declared empty and filled by
/// [`record_outcome`].
pub fn start_operation_span(operation: &str) -> Span {
    tracing::info_span!(
        "fieldops.operation",
        "fieldops.operation" = operation,
        "fieldops.outcome" = tracing::field::Empty,
    )
}

/// Record how the operation ended.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("fieldops.outcome", outcome);
}

/// Record a state transition of a job or request.
pub fn record_state_transition(entity: &str, id: &str, from: &str, to: &str) {
    tracing::info!(entity = entity, id = id, from = from, to = to, "state_transition");
}
