//! Integration tests for the audit log.

use fieldops::engine::Engine;
use fieldops::model::*;
use serde_json::json;

fn test_engine() -> Engine {
    Engine::in_memory().expect("failed to create in-memory engine")
}

fn report_entry(n: usize) -> NewAuditEntry {
    NewAuditEntry::new(
        AuditAction::Create,
        EntityType::Report,
        format!("R-{n}"),
        format!("Weekly report {n}"),
        "U-LEAD1",
    )
    .details("submitted")
    .metadata(json!({ "week": n }))
}

#[test]
fn add_audit_log_assigns_id_and_timestamp() {
    let mut engine = test_engine();

    let id = engine.add_audit_log(report_entry(1)).unwrap();

    let entries = engine.audit_logs();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);
    assert_eq!(entries[0].entity_type, EntityType::Report);
    assert_eq!(entries[0].performed_by, UserId::from("U-LEAD1"));
    assert_eq!(entries[0].metadata, Some(json!({ "week": 1 })));
}

#[test]
fn n_appends_give_n_entries_newest_first_and_stable() {
    let mut engine = test_engine();

    let ids: Vec<AuditId> = (0..5)
        .map(|n| engine.add_audit_log(report_entry(n)).unwrap())
        .collect();
    let snapshot: Vec<AuditEntry> = engine.audit_logs().into_iter().cloned().collect();
    assert_eq!(snapshot.len(), 5);

    let newest_first: Vec<_> = snapshot.iter().map(|e| e.id.clone()).collect();
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(newest_first, expected);
    for pair in snapshot.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    // Later activity never rewrites earlier entries.
    engine
        .start_job(&JobId::from("JOB-1002"), &UserId::from("U-EMP2"))
        .unwrap();
    let after: Vec<AuditEntry> = engine.audit_logs().into_iter().cloned().collect();
    assert_eq!(after.len(), 6);
    assert_eq!(&after[1..], &snapshot[..]);
}

#[test]
fn queries_by_entity_user_and_action() {
    let mut engine = test_engine();
    let job = JobId::from("JOB-1001");
    engine
        .request_job_completion(&job, &UserId::from("U-EMP1"), "data:image/png;base64,AAAA")
        .unwrap();
    engine
        .approve_completion(&job, &UserId::from("U-LEAD1"))
        .unwrap();
    engine.add_audit_log(report_entry(7)).unwrap();

    assert_eq!(
        engine
            .audit_logs_by_entity(EntityType::Job, Some("JOB-1001"))
            .len(),
        2
    );
    assert_eq!(engine.audit_logs_by_entity(EntityType::Report, None).len(), 1);
    assert!(
        engine
            .audit_logs_by_entity(EntityType::Job, Some("JOB-1002"))
            .is_empty()
    );

    let by_lead = engine.audit_logs_by_user(&UserId::from("U-LEAD1"));
    assert_eq!(by_lead.len(), 2);
    assert_eq!(by_lead[0].entity_type, EntityType::Report);

    let approvals = engine.audit_logs_by_action(AuditAction::Approve);
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].entity_id, "JOB-1001");
}

#[test]
fn clear_audit_logs_resets_everything() {
    let mut engine = test_engine();
    engine.add_audit_log(report_entry(1)).unwrap();
    engine.add_audit_log(report_entry(2)).unwrap();

    engine.clear_audit_logs().unwrap();

    assert!(engine.audit_logs().is_empty());
    assert!(
        engine
            .audit_logs_by_entity(EntityType::Report, Some("R-1"))
            .is_empty()
    );
}
