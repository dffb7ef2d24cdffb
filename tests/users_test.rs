//! Integration tests for the user directory.

use fieldops::engine::{Bootstrap, Engine};
use fieldops::error::Error;
use fieldops::model::*;
use fieldops::storage::MemoryKv;

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

#[test]
fn first_user_bootstraps_an_empty_directory() {
    let mut engine = Engine::with_backend(Box::new(MemoryKv::new()), Bootstrap::Empty).unwrap();
    assert!(engine.users().is_empty());
    assert!(engine.jobs().is_empty());

    let owner = engine
        .create_user(
            NewUser::new("Dana Fox", "dana@example.com", Role::Admin),
            &uid("nobody-yet"),
        )
        .unwrap();

    let audit = engine.audit_logs_by_entity(EntityType::User, Some(owner.as_str()));
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].performed_by, owner);

    // From now on only admins and managers may add people.
    let err = engine
        .create_user(
            NewUser::new("Eve", "eve@example.com", Role::Employee),
            &uid("nobody-yet"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn create_user_checks_role_and_email() {
    let mut engine = Engine::in_memory().unwrap();

    let err = engine
        .create_user(
            NewUser::new("Kim", "kim@example.com", Role::Employee),
            &uid("U-EMP1"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotPermitted { .. }));

    let err = engine
        .create_user(
            NewUser::new("Sam Again", "SAM.OKAFOR@fieldops.example", Role::Employee),
            &uid("U-MGR"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Duplicate { field: "email", .. }));

    let id = engine
        .create_user(
            NewUser::new("Kim Park", "kim@example.com", Role::Employee).department("HVAC"),
            &uid("U-MGR"),
        )
        .unwrap();
    assert_eq!(engine.users_by_role(Role::Employee).len(), 4);
    assert!(
        engine
            .available_employees(None)
            .iter()
            .any(|u| u.id == id)
    );
    assert!(
        engine
            .all_notifications()
            .iter()
            .any(|n| n.kind == NotificationType::UserCreated)
    );
}

#[test]
fn users_edit_themselves_but_not_their_role() {
    let mut engine = Engine::in_memory().unwrap();
    let me = uid("U-EMP3");

    engine
        .update_user(
            &me,
            UserUpdate {
                phone: Some(Some("+1-555-0199".into())),
                ..Default::default()
            },
            &me,
        )
        .unwrap();
    assert_eq!(
        engine.user(&me).unwrap().phone.as_deref(),
        Some("+1-555-0199")
    );

    let err = engine
        .update_user(
            &me,
            UserUpdate {
                role: Some(Role::Manager),
                ..Default::default()
            },
            &me,
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotPermitted { .. }));

    engine
        .update_user(
            &me,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
            &uid("U-ADMIN"),
        )
        .unwrap();
    assert!(
        !engine
            .available_employees(None)
            .iter()
            .any(|u| u.id == me)
    );

    let changes: Vec<_> = engine
        .audit_logs_by_entity(EntityType::User, Some("U-EMP3"))
        .iter()
        .flat_map(|e| e.changes.iter().map(|c| c.field.clone()))
        .collect();
    assert_eq!(changes, vec!["active".to_string(), "phone".to_string()]);
}
