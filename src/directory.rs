//! User directory.

use chrono::Utc;
use serde_json::json;

use crate::audit::AuditLog;
use crate::error::{Error, Result};
use crate::model::*;
use crate::notify::NotificationStore;

/// Authoritative roster of users.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<User>,
    dirty: bool,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_users(users: Vec<User>) -> Self {
        Self {
            users,
            dirty: false,
        }
    }

    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    /// Like `get`, but unknown ids are an error.
    pub fn require(&self, id: &UserId) -> Result<&User> {
        self.get(id).ok_or_else(|| Error::not_found("user", id))
    }

    pub fn all(&self) -> &[User] {
        &self.users
    }

    pub fn by_role(&self, role: Role) -> Vec<&User> {
        self.users.iter().filter(|u| u.role == role).collect()
    }

    pub fn by_department(&self, department: &str) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.department.as_deref() == Some(department))
            .collect()
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Validate and add a user. No side effects beyond the roster.
    pub fn insert(&mut self, new: NewUser) -> Result<&User> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("user name is required".into()));
        }
        let email = new.email.trim();
        if !is_plausible_email(email) {
            return Err(Error::Validation(format!("invalid email: {email}")));
        }
        if self.find_by_email(email).is_some() {
            return Err(Error::Duplicate {
                field: "email",
                value: email.to_string(),
            });
        }
        let id = new.id.unwrap_or_default();
        if self.get(&id).is_some() {
            return Err(Error::Duplicate {
                field: "id",
                value: id.to_string(),
            });
        }

        self.users.push(User {
            id,
            name: name.to_string(),
            role: new.role,
            department: new.department,
            email: email.to_string(),
            phone: new.phone,
            active: true,
            created_at: Utc::now(),
        });
        self.dirty = true;
        let last = self.users.len() - 1;
        Ok(&self.users[last])
    }

    /// Apply a profile edit. Returns the changed fields.
    pub fn apply_update(&mut self, id: &UserId, update: UserUpdate) -> Result<Vec<FieldChange>> {
        if let Some(email) = update.email.as_deref() {
            let email = email.trim();
            if !is_plausible_email(email) {
                return Err(Error::Validation(format!("invalid email: {email}")));
            }
            if self.find_by_email(email).is_some_and(|other| &other.id != id) {
                return Err(Error::Duplicate {
                    field: "email",
                    value: email.to_string(),
                });
            }
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::Validation("user name is required".into()));
        }

        let user = self
            .users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or_else(|| Error::not_found("user", id))?;

        let mut changes = Vec::new();
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name != user.name {
                changes.push(field_change("name", json!(user.name), json!(name)));
                user.name = name;
            }
        }
        if let Some(email) = update.email {
            let email = email.trim().to_string();
            if email != user.email {
                changes.push(field_change("email", json!(user.email), json!(email)));
                user.email = email;
            }
        }
        if let Some(role) = update.role {
            if role != user.role {
                changes.push(field_change("role", json!(user.role), json!(role)));
                user.role = role;
            }
        }
        if let Some(department) = update.department {
            if department != user.department {
                changes.push(field_change(
                    "department",
                    json!(user.department),
                    json!(department),
                ));
                user.department = department;
            }
        }
        if let Some(phone) = update.phone {
            if phone != user.phone {
                changes.push(field_change("phone", json!(user.phone), json!(phone)));
                user.phone = phone;
            }
        }
        if let Some(active) = update.active {
            if active != user.active {
                changes.push(field_change("active", json!(user.active), json!(active)));
                user.active = active;
            }
        }

        if !changes.is_empty() {
            self.dirty = true;
        }
        Ok(changes)
    }

    pub(crate) fn snapshot(&self) -> &[User] {
        &self.users
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

pub(crate) fn field_change(
    field: &str,
    old_value: serde_json::Value,
    new_value: serde_json::Value,
) -> FieldChange {
    FieldChange {
        field: field.to_string(),
        old_value,
        new_value,
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// User administration with its audit and notification side effects.
pub struct DirectoryService<'a> {
    pub(crate) users: &'a mut UserDirectory,
    pub(crate) audit: &'a mut AuditLog,
    pub(crate) notifications: &'a mut NotificationStore,
}

impl DirectoryService<'_> {
    /// Add a user on behalf of `actor`.
    ///
    /// Only admins and managers may add users, except for the very first
    /// user of an empty directory, who is recorded as having created
    /// themselves.
    pub fn create_user(&mut self, new: NewUser, actor: &UserId) -> Result<UserId> {
        let bootstrap = self.users.is_empty();
        if !bootstrap {
            let actor_user = self.users.require(actor)?;
            if !matches!(actor_user.role, Role::Admin | Role::Manager) {
                return Err(Error::not_permitted(actor, "create users"));
            }
        }

        let user = self.users.insert(new)?.clone();
        let performed_by = if bootstrap { user.id.clone() } else { actor.clone() };

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Create,
                EntityType::User,
                &user.id,
                &user.name,
                performed_by,
            )
            .details(format!("added as {}", user.role))
            .metadata(json!({ "email": user.email, "department": user.department })),
        );
        self.notifications.user_created(&user);

        tracing::info!(user = %user.id, role = %user.role, "user created");
        Ok(user.id)
    }

    /// Edit a profile. Admins and managers may edit anyone; other users only
    /// themselves and never their own role.
    pub fn update_user(&mut self, id: &UserId, update: UserUpdate, actor: &UserId) -> Result<()> {
        let actor_user = self.users.require(actor)?;
        let privileged = matches!(actor_user.role, Role::Admin | Role::Manager);
        if !privileged && (actor != id || update.role.is_some() || update.active.is_some()) {
            return Err(Error::not_permitted(actor, "edit this user"));
        }

        let changes = self.users.apply_update(id, update)?;
        if changes.is_empty() {
            return Ok(());
        }

        let name = self.users.require(id)?.name.clone();
        self.audit.add_audit_log(
            NewAuditEntry::new(AuditAction::Update, EntityType::User, id, name, actor.clone())
                .changes(changes),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_unique_ignoring_case() {
        let mut dir = UserDirectory::new();
        dir.insert(NewUser::new("Ana", "ana@example.com", Role::Employee))
            .unwrap();

        let err = dir
            .insert(NewUser::new("Ana Two", "ANA@example.com", Role::Employee))
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate { field: "email", .. }));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn rejects_blank_names_and_bad_emails() {
        let mut dir = UserDirectory::new();
        assert!(matches!(
            dir.insert(NewUser::new("  ", "a@example.com", Role::Employee)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            dir.insert(NewUser::new("Bo", "not-an-email", Role::Employee)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn update_reports_only_real_changes() {
        let mut dir = UserDirectory::new();
        let id = dir
            .insert(NewUser::new("Cy", "cy@example.com", Role::Employee).department("HVAC"))
            .unwrap()
            .id
            .clone();

        let changes = dir
            .apply_update(
                &id,
                UserUpdate {
                    name: Some("Cy".into()),
                    department: Some(Some("Electrical".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "department");
        assert_eq!(dir.get(&id).unwrap().department.as_deref(), Some("Electrical"));
    }
}
