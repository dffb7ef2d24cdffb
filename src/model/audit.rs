//! Audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuditId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    Assign,
    Unassign,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Assign => "assign",
            AuditAction::Unassign => "unassign",
        };
        f.pad(s)
    }
}

/// Kind of entity an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Job,
    InventoryItem,
    InventoryRequest,
    User,
    Notification,
    Report,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Job => "job",
            EntityType::InventoryItem => "inventory_item",
            EntityType::InventoryRequest => "inventory_request",
            EntityType::User => "user",
            EntityType::Notification => "notification",
            EntityType::Report => "report",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for EntityType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(EntityType::Job),
            "inventory_item" => Ok(EntityType::InventoryItem),
            "inventory_request" => Ok(EntityType::InventoryRequest),
            "user" => Ok(EntityType::User),
            "notification" => Ok(EntityType::Notification),
            "report" => Ok(EntityType::Report),
            _ => Err(crate::error::Error::Validation(format!(
                "unknown entity type: {s}"
            ))),
        }
    }
}

/// One changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

/// An immutable record of a mutating action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub performed_by: UserId,
    /// Assigned by the store on insertion.
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    pub metadata: Option<serde_json::Value>,
}

/// What a caller supplies to the audit log. Id and timestamp are not part of
/// it; the store assigns both.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub(crate) action: AuditAction,
    pub(crate) entity_type: EntityType,
    pub(crate) entity_id: String,
    pub(crate) entity_name: String,
    pub(crate) performed_by: UserId,
    pub(crate) details: Option<String>,
    pub(crate) changes: Vec<FieldChange>,
    pub(crate) metadata: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl std::fmt::Display,
        entity_name: impl Into<String>,
        performed_by: impl Into<UserId>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            entity_name: entity_name.into(),
            performed_by: performed_by.into(),
            details: None,
            changes: Vec::new(),
            metadata: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn change(
        mut self,
        field: impl Into<String>,
        old_value: serde_json::Value,
        new_value: serde_json::Value,
    ) -> Self {
        self.changes.push(FieldChange {
            field: field.into(),
            old_value,
            new_value,
        });
        self
    }

    pub fn changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes.extend(changes);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
