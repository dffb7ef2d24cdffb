//! Job lifecycle engine.
//!
//! `JobLifecycle` validates every precondition before touching anything, then
//! mutates the job and emits its audit entry and notifications. It runs on a
//! transaction's working set, so a failure anywhere discards all of it.

use chrono::Utc;
use opentelemetry::KeyValue;
use serde::Serialize;
use serde_json::json;

use crate::audit::AuditLog;
use crate::directory::{UserDirectory, field_change};
use crate::error::{Error, Result};
use crate::inventory::{InventoryLedger, RequestBook};
use crate::model::*;
use crate::notify::{JobLookup, NotificationStore};
use crate::telemetry::{metrics, workflow};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// All jobs, in creation order.
#[derive(Debug, Clone, Default)]
pub struct JobBook {
    jobs: Vec<Job>,
    dirty: bool,
}

impl JobBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_jobs(jobs: Vec<Job>) -> Self {
        Self { jobs, dirty: false }
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    /// Like `get`, but unknown ids are an error.
    pub fn require(&self, id: &JobId) -> Result<&Job> {
        self.get(id).ok_or_else(|| Error::not_found("job", id))
    }

    /// Newest first.
    pub fn all(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().rev()
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<&Job> {
        self.all().filter(|j| j.status == status).collect()
    }

    /// Jobs the user is assigned to, created, or leads.
    pub fn for_user(&self, user: &UserId) -> Vec<&Job> {
        self.all().filter(|j| j.involves(user)).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn insert(&mut self, job: Job) -> Result<()> {
        if self.get(&job.id).is_some() {
            return Err(Error::Duplicate {
                field: "job id",
                value: job.id.to_string(),
            });
        }
        self.jobs.push(job);
        self.dirty = true;
        Ok(())
    }

    /// Replace a stored job with an edited copy.
    pub(crate) fn put(&mut self, job: Job) -> Result<()> {
        let slot = self
            .jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| Error::not_found("job", &job.id))?;
        *slot = job;
        self.dirty = true;
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &JobId) -> Result<Job> {
        let pos = self
            .jobs
            .iter()
            .position(|j| &j.id == id)
            .ok_or_else(|| Error::not_found("job", id))?;
        self.dirty = true;
        Ok(self.jobs.remove(pos))
    }

    pub(crate) fn snapshot(&self) -> &[Job] {
        &self.jobs
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl JobLookup for JobBook {
    fn find_job(&self, id: &JobId) -> Option<&Job> {
        self.get(id)
    }
}

/// Candidates for assignment.
///
/// Active employees who are not on any pending, in-progress or
/// awaiting-approval job (assignment on `for_job` itself does not count),
/// plus every active lead technician, who may run any number of jobs.
pub fn available_employees<'a>(
    users: &'a UserDirectory,
    jobs: &JobBook,
    for_job: Option<&JobId>,
) -> Vec<&'a User> {
    users
        .all()
        .iter()
        .filter(|u| u.active)
        .filter(|u| match u.role {
            Role::LeadTechnician => true,
            Role::Employee => !jobs.jobs.iter().any(|j| {
                j.status.is_active() && Some(&j.id) != for_job && j.is_assigned(&u.id)
            }),
            Role::Admin | Role::Manager => false,
        })
        .collect()
}

/// A signature must be an image data URL with a non-empty payload.
pub fn validate_signature(signature: &str) -> Result<()> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(Error::Validation("a signature is required".into()));
    }
    let valid = signature
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(','))
        .is_some_and(|(_, payload)| !payload.trim().is_empty());
    if !valid {
        return Err(Error::Validation(
            "signature must be an image data URL".into(),
        ));
    }
    Ok(())
}

fn change<T: Serialize + ?Sized>(field: &str, old: &T, new: &T) -> Result<FieldChange> {
    Ok(field_change(
        field,
        serde_json::to_value(old)?,
        serde_json::to_value(new)?,
    ))
}

fn record_transition(job: &Job, from: JobStatus) {
    metrics::job_transitions().add(
        1,
        &[
            KeyValue::new("from", from.to_string()),
            KeyValue::new("to", job.status.to_string()),
        ],
    );
    workflow::record_state_transition(
        "job",
        job.id.as_str(),
        &from.to_string(),
        &job.status.to_string(),
    );
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The job state machine and its side effects.
pub struct JobLifecycle<'a> {
    pub(crate) jobs: &'a mut JobBook,
    pub(crate) users: &'a UserDirectory,
    pub(crate) ledger: &'a InventoryLedger,
    pub(crate) requests: &'a mut RequestBook,
    pub(crate) audit: &'a mut AuditLog,
    pub(crate) notifications: &'a mut NotificationStore,
}

impl JobLifecycle<'_> {
    /// Create a job in `pending`. Creator, lead and assignees are resolved
    /// against the directory and stored as snapshots.
    pub fn create(&mut self, new: NewJob) -> Result<JobId> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("job title is required".into()));
        }
        let creator = self.users.require(&new.creator_id)?.clone();
        if !creator.role.can_manage_jobs() {
            return Err(Error::not_permitted(&creator.id, "create jobs"));
        }
        let lead = new
            .lead_technician_id
            .as_ref()
            .map(|id| self.resolve_lead(id))
            .transpose()?;
        let assigned = self.resolve_assignees(&new.assigned_employee_ids)?;
        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if end < start {
                return Err(Error::Validation("end date is before start date".into()));
            }
        }

        let now = Utc::now();
        let job = Job {
            id: new.id.unwrap_or_default(),
            title,
            description: new.description,
            status: JobStatus::Pending,
            priority: new.priority,
            departments: new.departments,
            creator,
            lead_technician: lead,
            assigned_employees: assigned,
            used_inventory: Vec::new(),
            start_date: new.start_date,
            end_date: new.end_date,
            attachments: new.attachments,
            location: new.location,
            signature: None,
            rejection_reason: None,
            completion_requested_by: None,
            completed_at: None,
            work_logs: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Create,
                EntityType::Job,
                &job.id,
                &job.title,
                job.creator.id.clone(),
            )
            .metadata(json!({
                "lead_technician": job.lead_technician.as_ref().map(|u| &u.id),
                "assigned_employees": job.assigned_ids(),
            })),
        );
        self.notifications.job_created(&job);
        if !job.assigned_employees.is_empty() {
            self.notifications.job_assigned(&job, &job.assigned_employees);
        }

        tracing::info!(job = %job.id, creator = %job.creator.id, "job created");
        Ok(job.id)
    }

    /// Generic field merge.
    ///
    /// Assignment changes are audited per employee as `assign`/`unassign`;
    /// all other edits go into one `update` entry. A substantive edit by an
    /// assigned employee moves a pending job to `in_progress`.
    pub fn update(&mut self, id: &JobId, update: JobUpdate, actor: &UserId) -> Result<()> {
        let actor_user = self.users.require(actor)?.clone();
        let original = self.jobs.require(id)?.clone();
        if update.is_empty() {
            return Ok(());
        }
        if original.status.is_terminal() {
            return Err(Error::Validation(format!(
                "job {id} is {} and can no longer be edited",
                original.status
            )));
        }

        let is_member = original.involves(actor);
        let restaffing = update.lead_technician_id.is_some()
            || update.assigned_employee_ids.is_some()
            || update.status == Some(JobStatus::Cancelled);
        if !actor_user.role.can_manage_jobs() && (!is_member || restaffing) {
            return Err(Error::not_permitted(actor, "edit this job"));
        }

        // Resolve helper ids and validate everything before mutating.
        let lead = match &update.lead_technician_id {
            Some(Some(lead_id)) => Some(Some(self.resolve_lead(lead_id)?)),
            Some(None) => Some(None),
            None => None,
        };
        let assigned = update
            .assigned_employee_ids
            .as_deref()
            .map(|ids| self.resolve_assignees(ids))
            .transpose()?;
        if let Some(items) = &update.used_inventory {
            self.validate_items(items)?;
        }
        if let Some(target) = update.status {
            if target != original.status {
                if !matches!(target, JobStatus::InProgress | JobStatus::Cancelled) {
                    return Err(Error::transition(original.status, target));
                }
                if !original.status.can_transition_to(target) {
                    return Err(Error::transition(original.status, target));
                }
            }
        }
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("job title is required".into()));
            }
        }

        let mut job = original.clone();
        let mut changes = Vec::new();

        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title != job.title {
                changes.push(change("title", &job.title, &title)?);
                job.title = title;
            }
        }
        if let Some(description) = update.description {
            if description != job.description {
                changes.push(change("description", &job.description, &description)?);
                job.description = description;
            }
        }
        if let Some(priority) = update.priority {
            if priority != job.priority {
                changes.push(change("priority", &job.priority, &priority)?);
                job.priority = priority;
            }
        }
        if let Some(departments) = update.departments {
            if departments != job.departments {
                changes.push(change("departments", &job.departments, &departments)?);
                job.departments = departments;
            }
        }
        if let Some(lead) = lead {
            let old = job.lead_technician.as_ref().map(|u| &u.id);
            let new = lead.as_ref().map(|u| &u.id);
            if old != new {
                changes.push(change("lead_technician", &old, &new)?);
                job.lead_technician = lead;
            }
        }
        if let Some(items) = update.used_inventory {
            if items != job.used_inventory {
                changes.push(change("used_inventory", &job.used_inventory, &items)?);
                job.used_inventory = items;
            }
        }
        if let Some(start) = update.start_date {
            if start != job.start_date {
                changes.push(change("start_date", &job.start_date, &start)?);
                job.start_date = start;
            }
        }
        if let Some(end) = update.end_date {
            if end != job.end_date {
                changes.push(change("end_date", &job.end_date, &end)?);
                job.end_date = end;
            }
        }
        if let (Some(start), Some(end)) = (job.start_date, job.end_date) {
            if end < start {
                return Err(Error::Validation("end date is before start date".into()));
            }
        }
        if let Some(location) = update.location {
            if location != job.location {
                changes.push(change("location", &job.location, &location)?);
                job.location = location;
            }
        }
        if let Some(attachments) = update.attachments {
            if attachments != job.attachments {
                let old: Vec<&str> = job.attachments.iter().map(|a| a.name.as_str()).collect();
                let new: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
                changes.push(change("attachments", &old, &new)?);
                job.attachments = attachments;
            }
        }

        let (added, removed) = match assigned {
            Some(assigned) => {
                let added: Vec<User> = assigned
                    .iter()
                    .filter(|u| !original.is_assigned(&u.id))
                    .cloned()
                    .collect();
                let removed: Vec<User> = original
                    .assigned_employees
                    .iter()
                    .filter(|u| !assigned.iter().any(|a| a.id == u.id))
                    .cloned()
                    .collect();
                // Keep existing snapshots for people who stay on the job.
                job.assigned_employees = assigned
                    .into_iter()
                    .map(|u| {
                        original
                            .assigned_employees
                            .iter()
                            .find(|o| o.id == u.id)
                            .cloned()
                            .unwrap_or(u)
                    })
                    .collect();
                (added, removed)
            }
            None => (Vec::new(), Vec::new()),
        };

        let mut target = update.status.filter(|s| *s != original.status);
        if target.is_none()
            && original.status == JobStatus::Pending
            && original.is_assigned(actor)
            && !changes.is_empty()
        {
            target = Some(JobStatus::InProgress);
        }
        if let Some(target) = target {
            changes.push(change("status", &job.status, &target)?);
            job.status = target;
            if target != JobStatus::Rejected && job.rejection_reason.is_some() {
                let cleared: Option<String> = None;
                changes.push(change("rejection_reason", &job.rejection_reason, &cleared)?);
                job.rejection_reason = None;
            }
        }

        if changes.is_empty() && added.is_empty() && removed.is_empty() {
            return Ok(());
        }
        job.updated_at = Utc::now();
        self.jobs.put(job.clone())?;

        if !changes.is_empty() {
            let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
            let summary = format!("updated {}", fields.join(", "));
            self.audit.add_audit_log(
                NewAuditEntry::new(
                    AuditAction::Update,
                    EntityType::Job,
                    &job.id,
                    &job.title,
                    actor.clone(),
                )
                .details(summary.clone())
                .changes(changes),
            );
            if job.status == JobStatus::Cancelled {
                self.notifications.job_cancelled(&job, None);
            } else {
                self.notifications.job_updated(&job, &summary);
            }
        }
        self.record_assignment(&job, &added, &removed, actor);
        if job.status != original.status {
            record_transition(&job, original.status);
        }

        tracing::info!(job = %job.id, actor = %actor, "job updated");
        Ok(())
    }

    /// Put one more employee on the job.
    pub fn assign_employee(&mut self, id: &JobId, employee: &UserId, actor: &UserId) -> Result<()> {
        let job = self.jobs.require(id)?;
        if job.is_assigned(employee) {
            return Err(Error::Validation(format!(
                "{employee} is already assigned to {id}"
            )));
        }
        let mut ids = job.assigned_ids();
        ids.push(employee.clone());
        self.update(id, JobUpdate::new().assigned_employees(ids), actor)
    }

    /// Take one employee off the job.
    pub fn unassign_employee(
        &mut self,
        id: &JobId,
        employee: &UserId,
        actor: &UserId,
    ) -> Result<()> {
        let job = self.jobs.require(id)?;
        if !job.is_assigned(employee) {
            return Err(Error::Validation(format!("{employee} is not assigned to {id}")));
        }
        let ids = job
            .assigned_ids()
            .into_iter()
            .filter(|u| u != employee)
            .collect();
        self.update(id, JobUpdate::new().assigned_employees(ids), actor)
    }

    /// Explicit `pending|rejected -> in_progress`.
    pub fn start(&mut self, id: &JobId, actor: &UserId) -> Result<()> {
        let actor_user = self.users.require(actor)?.clone();
        let mut job = self.jobs.require(id)?.clone();
        if !job.status.can_transition_to(JobStatus::InProgress) {
            return Err(Error::transition(job.status, JobStatus::InProgress));
        }
        if !job.involves(actor) && !actor_user.role.can_manage_jobs() {
            return Err(Error::not_permitted(actor, "start this job"));
        }

        let from = job.status;
        job.status = JobStatus::InProgress;
        job.rejection_reason = None;
        job.updated_at = Utc::now();
        self.jobs.put(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Update,
                EntityType::Job,
                &job.id,
                &job.title,
                actor.clone(),
            )
            .details("work started")
            .changes(vec![change("status", &from, &job.status)?]),
        );
        self.notifications.job_updated(&job, "work started");
        record_transition(&job, from);
        Ok(())
    }

    /// Submit the job for approval with a signature image.
    pub fn request_completion(
        &mut self,
        id: &JobId,
        requester: &UserId,
        signature: &str,
    ) -> Result<()> {
        let mut job = self.jobs.require(id)?.clone();
        validate_signature(signature)?;
        if !job.status.can_transition_to(JobStatus::PendingApproval) {
            return Err(Error::transition(job.status, JobStatus::PendingApproval));
        }
        let requester_user = self.users.require(requester)?.clone();
        let allowed = job.is_assigned(requester)
            || job.is_lead(requester)
            || matches!(requester_user.role, Role::Admin | Role::Manager);
        if !allowed {
            return Err(Error::not_permitted(requester, "request completion of this job"));
        }

        let from = job.status;
        let now = Utc::now();
        let resubmission = from == JobStatus::Rejected;
        job.status = JobStatus::PendingApproval;
        job.signature = Some(signature.trim().to_string());
        job.rejection_reason = None;
        job.completion_requested_by = Some(requester.clone());
        job.work_logs.push(WorkLog {
            at: now,
            by: requester.clone(),
            note: if resubmission {
                "completion resubmitted after rejection".to_string()
            } else {
                "completion requested".to_string()
            },
        });
        job.updated_at = now;
        self.jobs.put(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Update,
                EntityType::Job,
                &job.id,
                &job.title,
                requester.clone(),
            )
            .details("completion requested")
            .changes(vec![change("status", &from, &job.status)?])
            .metadata(json!({ "resubmission": resubmission })),
        );
        self.notifications
            .job_completion_requested(&job, &requester_user);
        record_transition(&job, from);

        tracing::info!(job = %job.id, requester = %requester, "completion requested");
        Ok(())
    }

    /// `pending_approval -> completed`.
    pub fn approve_completion(&mut self, id: &JobId, approver: &UserId) -> Result<()> {
        let mut job = self.jobs.require(id)?.clone();
        if !job.status.can_transition_to(JobStatus::Completed) {
            return Err(Error::transition(job.status, JobStatus::Completed));
        }
        let approver_user = self.require_approver(approver, "approve job completion")?;

        let from = job.status;
        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.completed_at = Some(now);
        job.updated_at = now;
        self.jobs.put(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Approve,
                EntityType::Job,
                &job.id,
                &job.title,
                approver.clone(),
            )
            .details("completion approved")
            .changes(vec![change("status", &from, &job.status)?])
            .metadata(json!({ "requested_by": job.completion_requested_by })),
        );
        self.notifications.job_completed(&job, &approver_user);
        record_transition(&job, from);

        tracing::info!(job = %job.id, approver = %approver, "completion approved");
        Ok(())
    }

    /// `pending_approval -> rejected`, with a mandatory reason.
    pub fn reject_completion(&mut self, id: &JobId, approver: &UserId, reason: &str) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation("a rejection reason is required".into()));
        }
        let mut job = self.jobs.require(id)?.clone();
        if !job.status.can_transition_to(JobStatus::Rejected) {
            return Err(Error::transition(job.status, JobStatus::Rejected));
        }
        let approver_user = self.require_approver(approver, "reject job completion")?;

        let from = job.status;
        job.status = JobStatus::Rejected;
        job.rejection_reason = Some(reason.to_string());
        job.updated_at = Utc::now();
        self.jobs.put(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Reject,
                EntityType::Job,
                &job.id,
                &job.title,
                approver.clone(),
            )
            .details(reason)
            .changes(vec![change("status", &from, &job.status)?])
            .metadata(json!({ "requested_by": job.completion_requested_by })),
        );
        self.notifications.job_rejected(&job, &approver_user, reason);
        record_transition(&job, from);

        tracing::info!(job = %job.id, approver = %approver, "completion rejected");
        Ok(())
    }

    /// Call the job off.
    pub fn cancel(&mut self, id: &JobId, actor: &UserId, reason: Option<&str>) -> Result<()> {
        let mut job = self.jobs.require(id)?.clone();
        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(Error::transition(job.status, JobStatus::Cancelled));
        }
        let actor_user = self.users.require(actor)?;
        if !actor_user.role.can_manage_jobs() {
            return Err(Error::not_permitted(actor, "cancel jobs"));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let from = job.status;
        job.status = JobStatus::Cancelled;
        job.rejection_reason = None;
        job.updated_at = Utc::now();
        self.jobs.put(job.clone())?;

        let mut entry = NewAuditEntry::new(
            AuditAction::Update,
            EntityType::Job,
            &job.id,
            &job.title,
            actor.clone(),
        )
        .changes(vec![change("status", &from, &job.status)?]);
        if let Some(reason) = reason {
            entry = entry.details(reason);
        }
        self.audit.add_audit_log(entry);
        self.notifications.job_cancelled(&job, reason);
        record_transition(&job, from);
        Ok(())
    }

    /// Append a work log note.
    pub fn add_work_log(&mut self, id: &JobId, author: &UserId, note: &str) -> Result<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(Error::Validation("work log note is empty".into()));
        }
        let mut job = self.jobs.require(id)?.clone();
        let author_user = self.users.require(author)?;
        if !job.involves(author) && !matches!(author_user.role, Role::Admin | Role::Manager) {
            return Err(Error::not_permitted(author, "log work on this job"));
        }
        if job.status.is_terminal() {
            return Err(Error::Validation(format!("job {id} is {}", job.status)));
        }

        let now = Utc::now();
        job.work_logs.push(WorkLog {
            at: now,
            by: author.clone(),
            note: note.to_string(),
        });
        job.updated_at = now;
        self.jobs.put(job.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Update,
                EntityType::Job,
                &job.id,
                &job.title,
                author.clone(),
            )
            .details("work log added")
            .metadata(json!({ "note": note })),
        );
        Ok(())
    }

    /// Hard removal.
    ///
    /// Inventory requests of the job and notifications linking to it go with
    /// it; the audit history stays.
    pub fn delete(&mut self, id: &JobId, actor: &UserId) -> Result<()> {
        let actor_user = self.users.require(actor)?.clone();
        if !matches!(actor_user.role, Role::Admin | Role::Manager) {
            return Err(Error::not_permitted(actor, "delete jobs"));
        }
        let job = self.jobs.remove(id)?;
        let requests = self.requests.remove_for_job(id);
        let notifications = self.notifications.remove_linked_to(id);

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Delete,
                EntityType::Job,
                &job.id,
                &job.title,
                actor.clone(),
            )
            .metadata(json!({
                "status": job.status,
                "removed_inventory_requests": requests,
                "removed_notifications": notifications,
            })),
        );
        self.notifications.job_deleted(&job, &actor_user);

        tracing::info!(job = %job.id, actor = %actor, requests, notifications, "job deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn resolve_lead(&self, id: &UserId) -> Result<User> {
        let user = self.users.require(id)?;
        if !matches!(user.role, Role::LeadTechnician | Role::Admin | Role::Manager) {
            return Err(Error::Validation(format!(
                "{} is a {} and cannot lead a job",
                user.name, user.role
            )));
        }
        Ok(user.clone())
    }

    fn resolve_assignees(&self, ids: &[UserId]) -> Result<Vec<User>> {
        let mut resolved: Vec<User> = Vec::with_capacity(ids.len());
        for id in ids {
            let user = self.users.require(id)?;
            if !user.active {
                return Err(Error::Validation(format!("{} is inactive", user.name)));
            }
            if !resolved.iter().any(|u| u.id == user.id) {
                resolved.push(user.clone());
            }
        }
        Ok(resolved)
    }

    fn validate_items(&self, items: &[ItemQuantity]) -> Result<()> {
        for item in items {
            self.ledger.require(&item.id)?;
        }
        Ok(())
    }

    fn require_approver(&self, id: &UserId, action: &'static str) -> Result<User> {
        let user = self.users.require(id)?;
        if !user.role.is_approver() {
            return Err(Error::not_permitted(id, action));
        }
        Ok(user.clone())
    }

    fn record_assignment(&mut self, job: &Job, added: &[User], removed: &[User], actor: &UserId) {
        for user in added {
            self.audit.add_audit_log(
                NewAuditEntry::new(
                    AuditAction::Assign,
                    EntityType::Job,
                    &job.id,
                    &job.title,
                    actor.clone(),
                )
                .details(format!("assigned {}", user.name))
                .metadata(json!({ "employee": user.id })),
            );
        }
        for user in removed {
            self.audit.add_audit_log(
                NewAuditEntry::new(
                    AuditAction::Unassign,
                    EntityType::Job,
                    &job.id,
                    &job.title,
                    actor.clone(),
                )
                .details(format!("unassigned {}", user.name))
                .metadata(json!({ "employee": user.id })),
            );
        }
        if !added.is_empty() {
            self.notifications.job_assigned(job, added);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_must_be_image_data_url() {
        assert!(validate_signature("").is_err());
        assert!(validate_signature("   ").is_err());
        assert!(validate_signature("hello").is_err());
        assert!(validate_signature("data:image/png;base64,").is_err());
        assert!(validate_signature("data:text/plain;base64,aGk=").is_err());
        assert!(validate_signature("data:image/png;base64,iVBORw0KGgo=").is_ok());
    }
}
