//! Integration tests for the inventory ledger and request workflow.

use fieldops::engine::Engine;
use fieldops::error::Error;
use fieldops::model::*;

fn test_engine() -> Engine {
    Engine::in_memory().expect("failed to create in-memory engine")
}

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

fn item(engine: &Engine, id: &str) -> InventoryItem {
    engine.inventory_item(&ItemId::from(id)).unwrap().clone()
}

/// Request `qty` of `item_id` for JOB-1001 as the assigned employee.
fn request(engine: &mut Engine, item_id: &str, qty: u32) -> RequestId {
    engine
        .add_inventory_request(NewInventoryRequest::new("JOB-1001", "U-EMP1").item(item_id, qty))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn approve_request_emits_one_linked_notification() {
    let mut engine = test_engine();
    let job = JobId::from("JOB-1001");

    let id = request(&mut engine, "INV1", 3);
    assert_eq!(
        engine.inventory_request(&id).unwrap().status,
        RequestStatus::Pending
    );

    engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-LEAD1"), None)
        .unwrap();

    let latest = engine.inventory_request_by_job_id(&job).unwrap();
    assert_eq!(latest.id, id);
    assert_eq!(latest.status, RequestStatus::Approved);
    assert_eq!(latest.approved_by, Some(uid("U-LEAD1")));
    assert!(latest.approved_at.is_some());

    let approved: Vec<_> = engine
        .all_notifications()
        .into_iter()
        .filter(|n| n.kind == NotificationType::InventoryRequestApproved)
        .collect();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].link.as_deref(), Some("/jobs/JOB-1001"));

    // Approval alone does not touch the ledger.
    assert_eq!(item(&engine, "INV1").quantity, 120);
}

#[test]
fn create_request_is_audited_and_visible_to_the_job_team() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV2", 2);

    let audit = engine.audit_logs_by_entity(EntityType::InventoryRequest, Some(id.as_str()));
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AuditAction::Create);

    let created = |viewer: &str| {
        engine
            .notifications_for(&uid(viewer))
            .unwrap()
            .iter()
            .any(|n| n.kind == NotificationType::InventoryRequestCreated)
    };
    assert!(created("U-LEAD1"));
    assert!(created("U-MGR"));
    assert!(created("U-ADMIN"));
    assert!(!created("U-EMP2"));
}

#[test]
fn create_request_validates_input() {
    let mut engine = test_engine();

    let err = engine
        .add_inventory_request(NewInventoryRequest::new("JOB-1001", "U-EMP1"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = engine
        .add_inventory_request(NewInventoryRequest::new("JOB-1001", "U-EMP1").item("INV1", 0))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = engine
        .add_inventory_request(NewInventoryRequest::new("JOB-1001", "U-EMP1").item("INV9", 1))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let err = engine
        .add_inventory_request(NewInventoryRequest::new("JOB-9999", "U-EMP1").item("INV1", 1))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "job", .. }));

    let err = engine
        .add_inventory_request(NewInventoryRequest::new("JOB-1001", "U-EMP2").item("INV1", 1))
        .unwrap_err();
    assert!(matches!(err, Error::NotPermitted { .. }));

    assert!(engine.inventory_request_by_job_id(&JobId::from("JOB-1001")).is_none());
}

#[test]
fn decisions_flip_and_keep_history() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV1", 3);

    engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-LEAD1"), None)
        .unwrap();
    engine
        .update_inventory_request_status(
            &id,
            RequestStatus::Rejected,
            &uid("U-MGR"),
            Some("use stock from van"),
        )
        .unwrap();

    let req = engine.inventory_request(&id).unwrap();
    assert_eq!(req.status, RequestStatus::Rejected);
    assert_eq!(req.rejected_by, Some(uid("U-MGR")));
    assert!(req.approved_by.is_none());
    assert!(req.approved_at.is_none());
    assert_eq!(req.note.as_deref(), Some("use stock from van"));
    let history: Vec<_> = req.decisions.iter().map(|d| d.status).collect();
    assert_eq!(
        history,
        vec![RequestStatus::Approved, RequestStatus::Rejected]
    );

    let rejected = engine
        .all_notifications()
        .into_iter()
        .find(|n| n.kind == NotificationType::InventoryRequestRejected)
        .unwrap();
    assert!(rejected.description.contains("use stock from van"));

    let actions: Vec<_> = engine
        .audit_logs_by_entity(EntityType::InventoryRequest, Some(id.as_str()))
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::Reject, AuditAction::Approve, AuditAction::Create]
    );
}

#[test]
fn at_most_one_decision_stamp_is_set() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV4", 10);

    for (status, by) in [
        (RequestStatus::Rejected, "U-LEAD1"),
        (RequestStatus::Approved, "U-MGR"),
        (RequestStatus::Rejected, "U-ADMIN"),
    ] {
        engine
            .update_inventory_request_status(&id, status, &uid(by), None)
            .unwrap();
        let req = engine.inventory_request(&id).unwrap();
        assert!(!(req.approved_by.is_some() && req.rejected_by.is_some()));
    }
}

#[test]
fn pending_and_repeated_status_are_not_transitions() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV1", 1);

    let err = engine
        .update_inventory_request_status(&id, RequestStatus::Pending, &uid("U-MGR"), None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-MGR"), None)
        .unwrap();
    let notifications = engine.all_notifications().len();

    let err = engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-MGR"), None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(engine.all_notifications().len(), notifications);
    assert_eq!(engine.inventory_request(&id).unwrap().decisions.len(), 1);
}

#[test]
fn employees_cannot_decide_requests() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV1", 1);

    let err = engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-EMP1"), None)
        .unwrap_err();
    assert!(matches!(err, Error::NotPermitted { .. }));
    assert_eq!(
        engine.inventory_request(&id).unwrap().status,
        RequestStatus::Pending
    );
}

#[test]
fn latest_request_is_returned_per_job() {
    let mut engine = test_engine();
    let _first = request(&mut engine, "INV1", 1);
    let second = request(&mut engine, "INV2", 1);

    let job = JobId::from("JOB-1001");
    assert_eq!(engine.inventory_request_by_job_id(&job).unwrap().id, second);
    assert_eq!(engine.inventory_requests_for_job(&job).len(), 2);
    assert_eq!(
        engine
            .inventory_requests_by_status(RequestStatus::Pending)
            .len(),
        2
    );
}

// ---------------------------------------------------------------------------
// Applying to the ledger
// ---------------------------------------------------------------------------

#[test]
fn apply_draws_stock_and_books_it_on_the_job() {
    let mut engine = test_engine();
    let id = request(&mut engine, "INV1", 3);

    let err = engine
        .apply_inventory_request(&id, &uid("U-MGR"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "pending cannot be applied");

    engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-LEAD1"), None)
        .unwrap();
    engine.apply_inventory_request(&id, &uid("U-MGR")).unwrap();

    assert_eq!(item(&engine, "INV1").quantity, 117);
    let job = engine.job(&JobId::from("JOB-1001")).unwrap();
    assert_eq!(job.used_inventory, vec![ItemQuantity::new("INV1", 3)]);
    assert!(engine.inventory_request(&id).unwrap().applied_at.is_some());

    // Applied requests are settled.
    assert!(matches!(
        engine.apply_inventory_request(&id, &uid("U-MGR")),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.update_inventory_request_status(&id, RequestStatus::Rejected, &uid("U-MGR"), None),
        Err(Error::Validation(_))
    ));
}

#[test]
fn apply_with_insufficient_stock_changes_nothing() {
    let mut engine = test_engine();
    let id = engine
        .add_inventory_request(
            NewInventoryRequest::new("JOB-1001", "U-EMP1")
                .item("INV1", 5)
                .item("INV3", 30),
        )
        .unwrap();
    engine
        .update_inventory_request_status(&id, RequestStatus::Approved, &uid("U-MGR"), None)
        .unwrap();

    let err = engine
        .apply_inventory_request(&id, &uid("U-MGR"))
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(item(&engine, "INV1").quantity, 120);
    assert_eq!(item(&engine, "INV3").quantity, 25);
    assert!(engine.inventory_request(&id).unwrap().applied_at.is_none());
    assert!(
        engine
            .job(&JobId::from("JOB-1001"))
            .unwrap()
            .used_inventory
            .is_empty()
    );
}

#[test]
fn apply_rejects_used_quantity_overflow_atomically() {
    let mut engine = test_engine();
    let bulk = engine
        .add_inventory_item(
            NewInventoryItem::new("Cable ties", u32::MAX).id("BULK"),
            &uid("U-MGR"),
        )
        .unwrap();
    let approve_and_apply = |engine: &mut Engine, id: &RequestId| {
        engine
            .update_inventory_request_status(id, RequestStatus::Approved, &uid("U-MGR"), None)
            .unwrap();
        engine.apply_inventory_request(id, &uid("U-MGR"))
    };

    let first = request(&mut engine, "BULK", u32::MAX);
    approve_and_apply(&mut engine, &first).unwrap();
    engine
        .adjust_inventory_quantity(&bulk, 1, &uid("U-MGR"), None)
        .unwrap();

    let second = request(&mut engine, "BULK", 1);
    let err = approve_and_apply(&mut engine, &second).unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(item(&engine, "BULK").quantity, 1);
    assert!(engine.inventory_request(&second).unwrap().applied_at.is_none());
    let job = engine.job(&JobId::from("JOB-1001")).unwrap();
    assert_eq!(job.used_inventory, vec![ItemQuantity::new("BULK", u32::MAX)]);
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[test]
fn adjusting_into_low_stock_notifies() {
    let mut engine = test_engine();
    let inv2 = ItemId::from("INV2");

    engine
        .adjust_inventory_quantity(&inv2, -31, &uid("U-MGR"), Some("leak"))
        .unwrap();

    assert_eq!(item(&engine, "INV2").quantity, 9);
    assert!(engine.low_stock_items().iter().any(|i| i.id == inv2));
    assert!(
        engine
            .all_notifications()
            .iter()
            .any(|n| n.kind == NotificationType::InventoryLowStock)
    );

    let audit = engine.audit_logs_by_entity(EntityType::InventoryItem, Some("INV2"));
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].changes[0].field, "quantity");
    assert_eq!(audit[0].details.as_deref(), Some("leak"));
}

#[test]
fn ledger_quantities_never_go_negative() {
    let mut engine = test_engine();
    let inv3 = ItemId::from("INV3");

    let err = engine
        .adjust_inventory_quantity(&inv3, -26, &uid("U-MGR"), None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(item(&engine, "INV3").quantity, 25);

    let err = engine
        .adjust_inventory_quantity(&inv3, 5, &uid("U-EMP1"), None)
        .unwrap_err();
    assert!(matches!(err, Error::NotPermitted { .. }));
}

#[test]
fn add_item_requires_a_name() {
    let mut engine = test_engine();

    let id = engine
        .add_inventory_item(
            NewInventoryItem::new("Thermostat", 12)
                .unit("pcs")
                .min_quantity(4)
                .category("HVAC"),
            &uid("U-MGR"),
        )
        .unwrap();
    assert_eq!(engine.inventory_item(&id).unwrap().name, "Thermostat");
    assert_eq!(engine.inventory_items().len(), 5);

    let err = engine
        .add_inventory_item(NewInventoryItem::new("  ", 1), &uid("U-MGR"))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
