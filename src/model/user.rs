//! Users and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Role of a user. Decides what workflow actions they may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    LeadTechnician,
    Employee,
}

impl Role {
    /// May approve or reject completion requests and inventory requests.
    pub fn is_approver(self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::LeadTechnician)
    }

    /// May create, cancel and re-staff jobs.
    pub fn can_manage_jobs(self) -> bool {
        self.is_approver()
    }

    /// Sees everything regardless of assignment.
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::LeadTechnician => "lead_technician",
            Role::Employee => "employee",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "lead_technician" => Ok(Role::LeadTechnician),
            "employee" => Ok(Role::Employee),
            _ => Err(crate::error::Error::Validation(format!("unknown role: {s}"))),
        }
    }
}

/// A member of the organisation.
///
/// Jobs keep a snapshot of the users attached to them; later edits in the
/// directory do not rewrite existing jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Inactive users stay resolvable but are never offered for assignment.
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Builder for adding a user to the directory.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub(crate) id: Option<UserId>,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: Role,
    pub(crate) department: Option<String>,
    pub(crate) phone: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            role,
            department: None,
            phone: None,
        }
    }

    /// Use a fixed id instead of a generated one.
    pub fn id(mut self, id: impl Into<UserId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Partial profile edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub department: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub active: Option<bool>,
}
