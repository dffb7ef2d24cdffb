//! Integration tests for the notification feed and its visibility filter.

use fieldops::engine::Engine;
use fieldops::error::Error;
use fieldops::model::*;

fn test_engine() -> Engine {
    Engine::in_memory().expect("failed to create in-memory engine")
}

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

fn feed_kinds(engine: &Engine, viewer: &str) -> Vec<NotificationType> {
    engine
        .notifications_for(&uid(viewer))
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect()
}

#[test]
fn job_assigned_is_scoped_to_the_job() {
    let mut engine = test_engine();
    engine
        .assign_employee(&JobId::from("JOB-1002"), &uid("U-EMP3"), &uid("U-MGR"))
        .unwrap();

    let assigned = NotificationType::JobAssigned;
    assert!(feed_kinds(&engine, "U-ADMIN").contains(&assigned));
    assert!(feed_kinds(&engine, "U-EMP3").contains(&assigned));
    assert!(feed_kinds(&engine, "U-EMP2").contains(&assigned));
    assert!(feed_kinds(&engine, "U-LEAD2").contains(&assigned));
    // Creator of JOB-1002 is the admin, so the manager is unrelated here.
    assert!(!feed_kinds(&engine, "U-MGR").contains(&assigned));
    assert!(!feed_kinds(&engine, "U-EMP1").contains(&assigned));
}

#[test]
fn broadcasts_reach_everyone_and_read_is_idempotent() {
    let mut engine = test_engine();
    let lead = engine.user(&uid("U-LEAD1")).unwrap().clone();

    let id = engine
        .notify(|n| n.report_submitted("R-17", "Weekly HVAC report", &lead))
        .unwrap();
    engine
        .notify(|n| n.system("Maintenance", "Dashboard offline at 22:00"))
        .unwrap();

    for viewer in ["U-ADMIN", "U-EMP1", "U-EMP3"] {
        let kinds = feed_kinds(&engine, viewer);
        assert_eq!(
            kinds,
            vec![NotificationType::System, NotificationType::ReportSubmitted],
            "{viewer}"
        );
    }

    assert!(engine.mark_notification_read(&id).unwrap());
    assert!(!engine.mark_notification_read(&id).unwrap());

    let read: Vec<_> = engine
        .all_notifications()
        .into_iter()
        .filter(|n| n.read)
        .collect();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].id, id);
    assert_eq!(engine.unread_count(&uid("U-EMP3")).unwrap(), 1);
}

#[test]
fn unread_count_and_mark_all_read_follow_the_viewer() {
    let mut engine = test_engine();
    engine
        .request_job_completion(
            &JobId::from("JOB-1001"),
            &uid("U-EMP1"),
            "data:image/png;base64,AAAA",
        )
        .unwrap();
    engine
        .add_notification(NewNotification::new(
            NotificationType::Message,
            "Heads up",
            "Parking lot closed",
        ))
        .unwrap();

    assert_eq!(engine.unread_count(&uid("U-LEAD1")).unwrap(), 2);
    assert_eq!(engine.unread_count(&uid("U-EMP2")).unwrap(), 1);

    assert_eq!(engine.mark_all_read(&uid("U-EMP2")).unwrap(), 1);
    assert_eq!(engine.unread_count(&uid("U-EMP2")).unwrap(), 0);
    // The job notification stays unread for the people who can see it.
    assert_eq!(engine.unread_count(&uid("U-LEAD1")).unwrap(), 1);
}

#[test]
fn low_stock_is_only_for_admins() {
    let mut engine = test_engine();
    engine
        .adjust_inventory_quantity(&ItemId::from("INV4"), -450, &uid("U-MGR"), None)
        .unwrap();

    assert!(feed_kinds(&engine, "U-ADMIN").contains(&NotificationType::InventoryLowStock));
    assert!(!feed_kinds(&engine, "U-MGR").contains(&NotificationType::InventoryLowStock));
}

#[test]
fn delete_and_clear() {
    let mut engine = test_engine();
    let id = engine
        .notify(|n| n.system("Welcome", "Fieldops is live"))
        .unwrap();
    engine.notify(|n| n.system("Reminder", "Timesheets due")).unwrap();

    engine.delete_notification(&id).unwrap();
    assert_eq!(engine.all_notifications().len(), 1);
    assert!(matches!(
        engine.delete_notification(&id),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        engine.mark_notification_read(&id),
        Err(Error::NotFound { .. })
    ));

    engine.clear_notifications().unwrap();
    assert!(engine.all_notifications().is_empty());
}

#[test]
fn unknown_viewer_is_an_error() {
    let engine = test_engine();
    assert!(matches!(
        engine.notifications_for(&uid("U-GHOST")),
        Err(Error::NotFound { entity: "user", .. })
    ));
}
