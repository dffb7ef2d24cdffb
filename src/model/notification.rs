//! Notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NotificationId;

/// Closed set of notification kinds.
///
/// Kinds prefixed `job_` or `inventory_` are scoped to a job and filtered per
/// viewer; every other kind is a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    JobCreated,
    JobAssigned,
    JobUpdated,
    JobCompletionRequested,
    JobCompleted,
    JobRejected,
    JobCancelled,
    JobDeleted,
    InventoryRequestCreated,
    InventoryRequestApproved,
    InventoryRequestRejected,
    InventoryLowStock,
    ReportSubmitted,
    ReportApproved,
    ReportRejected,
    UserCreated,
    Message,
    Comment,
    System,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::JobCreated => "job_created",
            NotificationType::JobAssigned => "job_assigned",
            NotificationType::JobUpdated => "job_updated",
            NotificationType::JobCompletionRequested => "job_completion_requested",
            NotificationType::JobCompleted => "job_completed",
            NotificationType::JobRejected => "job_rejected",
            NotificationType::JobCancelled => "job_cancelled",
            NotificationType::JobDeleted => "job_deleted",
            NotificationType::InventoryRequestCreated => "inventory_request_created",
            NotificationType::InventoryRequestApproved => "inventory_request_approved",
            NotificationType::InventoryRequestRejected => "inventory_request_rejected",
            NotificationType::InventoryLowStock => "inventory_low_stock",
            NotificationType::ReportSubmitted => "report_submitted",
            NotificationType::ReportApproved => "report_approved",
            NotificationType::ReportRejected => "report_rejected",
            NotificationType::UserCreated => "user_created",
            NotificationType::Message => "message",
            NotificationType::Comment => "comment",
            NotificationType::System => "system",
        }
    }

    /// Job- or inventory-scoped, visible only to people involved in the job.
    pub fn is_scoped(self) -> bool {
        let s = self.as_str();
        s.starts_with("job_") || s.starts_with("inventory_")
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// An entry in the shared notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub related_entity_id: Option<String>,
}

/// What a caller supplies when appending a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub(crate) kind: NotificationType,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) link: Option<String>,
    pub(crate) related_entity_id: Option<String>,
}

impl NewNotification {
    pub fn new(
        kind: NotificationType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            link: None,
            related_entity_id: None,
        }
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn related(mut self, id: impl std::fmt::Display) -> Self {
        self.related_entity_id = Some(id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_kinds_follow_prefix() {
        assert!(NotificationType::JobAssigned.is_scoped());
        assert!(NotificationType::InventoryRequestApproved.is_scoped());
        assert!(NotificationType::InventoryLowStock.is_scoped());
        assert!(!NotificationType::ReportSubmitted.is_scoped());
        assert!(!NotificationType::UserCreated.is_scoped());
        assert!(!NotificationType::System.is_scoped());
    }

    #[test]
    fn serialized_type_matches_as_str() {
        let json = serde_json::to_string(&NotificationType::JobCompletionRequested).unwrap();
        assert_eq!(json, "\"job_completion_requested\"");
    }
}
