//! Integration tests for telemetry initialization and span helpers.

use fieldops::engine::Engine;
use fieldops::model::*;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    let config = fieldops::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "fieldops-test".to_string(),
        log_level: "debug".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = fieldops::telemetry::init_telemetry(config);
}

#[test]
fn telemetry_config_follows_engine_config() {
    let config = fieldops::config::Config {
        otel_endpoint: Some("http://collector:4317".to_string()),
        log_level: "debug".to_string(),
        ..Default::default()
    };
    let telemetry = fieldops::telemetry::TelemetryConfig::from_config(&config);
    assert_eq!(telemetry.service_name, "fieldops");
    assert_eq!(telemetry.endpoint.as_deref(), Some("http://collector:4317"));
    assert_eq!(telemetry.log_level, "debug");
}

#[test]
fn malformed_log_level_is_a_config_error() {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    assert!(fieldops::telemetry::log_filter("fieldops=debug,warn").is_ok());
    assert!(matches!(
        fieldops::telemetry::log_filter("fieldops=loud"),
        Err(fieldops::error::Error::Config(_))
    ));
}

#[test]
fn operation_span_records_outcome() {
    let span = fieldops::telemetry::workflow::start_operation_span("approve_completion");
    fieldops::telemetry::workflow::record_outcome(&span, "committed");
    let _enter = span.enter();
    fieldops::telemetry::workflow::record_state_transition(
        "job",
        "JOB-1",
        "pending_approval",
        "completed",
    );
}

#[test]
fn metric_counters_are_noops_without_provider() {
    fieldops::telemetry::metrics::job_transitions().add(1, &[]);
    fieldops::telemetry::metrics::transactions().add(1, &[]);
}

#[test]
fn engine_operations_run_with_telemetry_installed() {
    let _guard = fieldops::telemetry::init_telemetry(fieldops::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "fieldops-test".to_string(),
        log_level: "info".to_string(),
    });

    let mut engine = Engine::in_memory().unwrap();
    let job = JobId::from("JOB-1002");
    engine
        .request_job_completion(&job, &UserId::from("U-EMP2"), "data:image/png;base64,AAAA")
        .unwrap();
    assert!(
        engine
            .request_job_completion(&job, &UserId::from("U-EMP2"), "data:image/png;base64,AAAA")
            .is_err()
    );
}
