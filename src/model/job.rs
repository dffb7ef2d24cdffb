//! Jobs and their lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemQuantity, JobId, User, UserId};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, nobody has started yet.
    Pending,
    /// Assigned staff are working on it.
    InProgress,
    /// Signed off by the field team, waiting for an approver.
    PendingApproval,
    /// Approver sent it back with a reason.
    Rejected,
    /// Approved. Terminal.
    Completed,
    /// Called off. Terminal.
    Cancelled,
}

impl JobStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Rejected, InProgress)     // rework after rejection
                | (Pending, PendingApproval)
                | (InProgress, PendingApproval)
                | (Rejected, PendingApproval) // resubmission
                | (PendingApproval, Completed)
                | (PendingApproval, Rejected)
                | (Pending, Cancelled)
                | (InProgress, Cancelled)
                | (PendingApproval, Cancelled)
                | (Rejected, Cancelled)
        )
    }

    /// Is this a terminal state?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Does a job in this state still hold its assigned employees?
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::InProgress | JobStatus::PendingApproval
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::PendingApproval => "pending_approval",
            JobStatus::Rejected => "rejected",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "pending_approval" => Ok(JobStatus::PendingApproval),
            "rejected" => Ok(JobStatus::Rejected),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(crate::error::Error::Validation(format!(
                "unknown job status: {s}"
            ))),
        }
    }
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.pad(s)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A file attached to a job, already encoded as a data URL by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub data_url: String,
}

/// Where the work happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A note appended to a job by someone working on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLog {
    pub at: DateTime<Utc>,
    pub by: UserId,
    pub note: String,
}

/// A unit of field work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub departments: Vec<String>,

    /// Snapshot of the user who created the job.
    pub creator: User,
    /// Snapshot of the approving lead technician, if one is set.
    pub lead_technician: Option<User>,
    /// Snapshots taken when each employee was assigned.
    #[serde(default)]
    pub assigned_employees: Vec<User>,

    /// Inventory drawn for this job.
    #[serde(default)]
    pub used_inventory: Vec<ItemQuantity>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub location: Option<Location>,

    /// Signature image captured with the last completion request.
    pub signature: Option<String>,
    /// Set exactly while the job is rejected.
    pub rejection_reason: Option<String>,
    pub completion_requested_by: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub work_logs: Vec<WorkLog>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_assigned(&self, user: &UserId) -> bool {
        self.assigned_employees.iter().any(|u| &u.id == user)
    }

    pub fn is_lead(&self, user: &UserId) -> bool {
        self.lead_technician.as_ref().is_some_and(|u| &u.id == user)
    }

    /// Assigned, created it, or leads it.
    pub fn involves(&self, user: &UserId) -> bool {
        self.is_assigned(user) || &self.creator.id == user || self.is_lead(user)
    }

    pub fn assigned_ids(&self) -> Vec<UserId> {
        self.assigned_employees.iter().map(|u| u.id.clone()).collect()
    }

    /// Path the dashboard uses for this job. Notifications link here.
    pub fn link(&self) -> String {
        job_link(&self.id)
    }
}

pub fn job_link(id: &JobId) -> String {
    format!("/jobs/{id}")
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builder for creating a job. Users are given by id and resolved on create.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub(crate) id: Option<JobId>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) creator_id: UserId,
    pub(crate) priority: Priority,
    pub(crate) departments: Vec<String>,
    pub(crate) lead_technician_id: Option<UserId>,
    pub(crate) assigned_employee_ids: Vec<UserId>,
    pub(crate) start_date: Option<DateTime<Utc>>,
    pub(crate) end_date: Option<DateTime<Utc>>,
    pub(crate) location: Option<Location>,
    pub(crate) attachments: Vec<Attachment>,
}

impl NewJob {
    pub fn new(title: impl Into<String>, creator_id: impl Into<UserId>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            creator_id: creator_id.into(),
            priority: Priority::default(),
            departments: Vec::new(),
            lead_technician_id: None,
            assigned_employee_ids: Vec::new(),
            start_date: None,
            end_date: None,
            location: None,
            attachments: Vec::new(),
        }
    }

    /// Use a fixed id instead of a generated one.
    pub fn id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.departments.push(department.into());
        self
    }

    pub fn lead_technician(mut self, id: impl Into<UserId>) -> Self {
        self.lead_technician_id = Some(id.into());
        self
    }

    pub fn assign(mut self, id: impl Into<UserId>) -> Self {
        self.assigned_employee_ids.push(id.into());
        self
    }

    pub fn schedule(mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = Some(start);
        self.end_date = end;
        self
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn attachment(mut self, name: impl Into<String>, data_url: impl Into<String>) -> Self {
        self.attachments.push(Attachment {
            name: name.into(),
            data_url: data_url.into(),
        });
        self
    }
}

/// Partial job edit. `None` leaves a field untouched; the `*_id` fields are
/// resolved against the user directory and never stored as-is.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<JobStatus>,
    pub priority: Option<Priority>,
    pub departments: Option<Vec<String>>,
    pub lead_technician_id: Option<Option<UserId>>,
    pub assigned_employee_ids: Option<Vec<UserId>>,
    pub used_inventory: Option<Vec<ItemQuantity>>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub location: Option<Option<Location>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn departments(mut self, departments: Vec<String>) -> Self {
        self.departments = Some(departments);
        self
    }

    pub fn lead_technician(mut self, id: Option<UserId>) -> Self {
        self.lead_technician_id = Some(id);
        self
    }

    pub fn assigned_employees(mut self, ids: Vec<UserId>) -> Self {
        self.assigned_employee_ids = Some(ids);
        self
    }

    pub fn used_inventory(mut self, items: Vec<ItemQuantity>) -> Self {
        self.used_inventory = Some(items);
        self
    }

    pub fn location(mut self, location: Option<Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.departments.is_none()
            && self.lead_technician_id.is_none()
            && self.assigned_employee_ids.is_none()
            && self.used_inventory.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.location.is_none()
            && self.attachments.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_only_from_working_states() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(PendingApproval));
        assert!(InProgress.can_transition_to(PendingApproval));
        assert!(Rejected.can_transition_to(PendingApproval));
        assert!(!Completed.can_transition_to(PendingApproval));
        assert!(!Cancelled.can_transition_to(PendingApproval));
    }

    #[test]
    fn approval_decisions_only_from_pending_approval() {
        use JobStatus::*;
        for from in [Pending, InProgress, Rejected, Completed, Cancelled] {
            assert!(!from.can_transition_to(Completed), "{from} -> completed");
        }
        for from in [Pending, InProgress, Completed, Cancelled] {
            assert!(!from.can_transition_to(Rejected), "{from} -> rejected");
        }
    }

    #[test]
    fn terminal_states_go_nowhere() {
        use JobStatus::*;
        let all = [
            Pending,
            InProgress,
            PendingApproval,
            Rejected,
            Completed,
            Cancelled,
        ];
        for to in all {
            assert!(!Completed.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn status_round_trips_through_display() {
        for s in ["pending", "in_progress", "pending_approval", "rejected", "completed", "cancelled"] {
            let status: JobStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }
}
