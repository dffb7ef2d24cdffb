//! Notification feed and the per-viewer visibility filter.
//!
//! The feed is a single shared list. Who sees what is decided when the feed
//! is read, from the viewer's role and the current state of the linked job;
//! nothing is stored per recipient.

use chrono::Utc;
use opentelemetry::KeyValue;

use crate::error::{Error, Result};
use crate::model::*;
use crate::telemetry::metrics;

/// Job lookup used by the visibility filter.
pub trait JobLookup {
    fn find_job(&self, id: &JobId) -> Option<&Job>;
}

/// Extract the job id from a dashboard link: the path segment after `/jobs/`.
pub fn job_id_from_link(link: &str) -> Option<JobId> {
    let (_, rest) = link.split_once("/jobs/")?;
    let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(JobId::from(id))
    }
}

/// Can `viewer` see `notification`?
///
/// Admins see everything. Kinds outside `job_*`/`inventory_*` are broadcasts.
/// Scoped kinds are visible to the assigned employees, the creator and the
/// lead technician of the linked job, and to nobody else when the link does
/// not resolve.
pub fn is_visible(notification: &Notification, viewer: &User, jobs: &dyn JobLookup) -> bool {
    if viewer.role.is_admin() {
        return true;
    }
    if !notification.kind.is_scoped() {
        return true;
    }
    notification
        .link
        .as_deref()
        .and_then(job_id_from_link)
        .and_then(|id| jobs.find_job(&id))
        .is_some_and(|job| job.involves(&viewer.id))
}

/// The shared notification feed.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    /// Oldest first; readers reverse.
    items: Vec<Notification>,
    dirty: bool,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_items(items: Vec<Notification>) -> Self {
        Self {
            items,
            dirty: false,
        }
    }

    /// Append a notification.
    pub fn add_notification(&mut self, new: NewNotification) -> &Notification {
        let notification = Notification {
            id: NotificationId::new(),
            kind: new.kind,
            title: new.title,
            description: new.description,
            link: new.link,
            read: false,
            created_at: Utc::now(),
            related_entity_id: new.related_entity_id,
        };

        metrics::notifications_emitted()
            .add(1, &[KeyValue::new("type", notification.kind.as_str())]);
        tracing::debug!(kind = %notification.kind, id = %notification.id, "notification added");

        self.items.push(notification);
        self.dirty = true;
        let last = self.items.len() - 1;
        &self.items[last]
    }

    /// Unfiltered feed, newest first.
    pub fn all(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter().rev()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The feed as `viewer` sees it, newest first.
    pub fn visible_to<'a>(
        &'a self,
        viewer: &'a User,
        jobs: &'a dyn JobLookup,
    ) -> impl Iterator<Item = &'a Notification> + 'a {
        self.all().filter(move |n| is_visible(n, viewer, jobs))
    }

    /// Unread count within the viewer's filtered feed.
    pub fn unread_count(&self, viewer: &User, jobs: &dyn JobLookup) -> usize {
        self.visible_to(viewer, jobs).filter(|n| !n.read).count()
    }

    /// Mark one notification read. Returns whether it was unread before.
    pub fn mark_read(&mut self, id: &NotificationId) -> Result<bool> {
        let notification = self
            .items
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| Error::not_found("notification", id))?;
        if notification.read {
            return Ok(false);
        }
        notification.read = true;
        self.dirty = true;
        Ok(true)
    }

    /// Mark everything the viewer can see as read. Returns how many changed.
    pub fn mark_all_read(&mut self, viewer: &User, jobs: &dyn JobLookup) -> usize {
        let mut changed = 0;
        for notification in self.items.iter_mut() {
            if !notification.read && is_visible(notification, viewer, jobs) {
                notification.read = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    pub fn delete(&mut self, id: &NotificationId) -> Result<Notification> {
        let pos = self
            .items
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| Error::not_found("notification", id))?;
        self.dirty = true;
        Ok(self.items.remove(pos))
    }

    /// Remove every notification linking to a job. Returns how many went.
    pub fn remove_linked_to(&mut self, job: &JobId) -> usize {
        let before = self.items.len();
        self.items.retain(|n| {
            n.link
                .as_deref()
                .and_then(job_id_from_link)
                .is_none_or(|id| &id != job)
        });
        let removed = before - self.items.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Drop the whole feed. Development reset only.
    pub fn clear(&mut self) {
        self.items.clear();
        self.dirty = true;
    }

    pub(crate) fn snapshot(&self) -> &[Notification] {
        &self.items
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // -----------------------------------------------------------------------
    // Constructors, one per event kind
    // -----------------------------------------------------------------------

    pub fn job_created(&mut self, job: &Job) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobCreated,
                "New job created",
                format!("{} was created by {}", job.title, job.creator.name),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    pub fn job_assigned(&mut self, job: &Job, employees: &[User]) -> &Notification {
        let names: Vec<&str> = employees.iter().map(|u| u.name.as_str()).collect();
        self.add_notification(
            NewNotification::new(
                NotificationType::JobAssigned,
                "Job assigned",
                format!("{} assigned to {}", job.title, names.join(", ")),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    pub fn job_updated(&mut self, job: &Job, summary: &str) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobUpdated,
                "Job updated",
                format!("{}: {summary}", job.title),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    /// Addressed to the approver of the job.
    pub fn job_completion_requested(&mut self, job: &Job, requester: &User) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobCompletionRequested,
                "Completion requested",
                format!("{} asked to close {}", requester.name, job.title),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    /// Addressed to whoever requested completion.
    pub fn job_completed(&mut self, job: &Job, approver: &User) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobCompleted,
                "Job completed",
                format!("{} approved completion of {}", approver.name, job.title),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    /// Addressed to whoever requested completion, with the reason.
    pub fn job_rejected(&mut self, job: &Job, approver: &User, reason: &str) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobRejected,
                "Completion rejected",
                format!("{} rejected {}: {reason}", approver.name, job.title),
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    pub fn job_cancelled(&mut self, job: &Job, reason: Option<&str>) -> &Notification {
        let description = match reason {
            Some(reason) => format!("{} was cancelled: {reason}", job.title),
            None => format!("{} was cancelled", job.title),
        };
        self.add_notification(
            NewNotification::new(NotificationType::JobCancelled, "Job cancelled", description)
                .link(job.link())
                .related(&job.id),
        )
    }

    /// The job is gone, so this carries no link and only admins see it.
    pub fn job_deleted(&mut self, job: &Job, by: &User) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::JobDeleted,
                "Job deleted",
                format!("{} deleted {}", by.name, job.title),
            )
            .related(&job.id),
        )
    }

    pub fn inventory_request_created(
        &mut self,
        request: &InventoryRequest,
        job: &Job,
        requester: &User,
    ) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::InventoryRequestCreated,
                "Inventory requested",
                format!(
                    "{} requested {} item(s) for {}",
                    requester.name,
                    request.requested_items.len(),
                    job.title
                ),
            )
            .link(job.link())
            .related(&request.id),
        )
    }

    pub fn inventory_request_approved(
        &mut self,
        request: &InventoryRequest,
        job: &Job,
        approver: &User,
    ) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::InventoryRequestApproved,
                "Inventory request approved",
                format!("{} approved the inventory request for {}", approver.name, job.title),
            )
            .link(job.link())
            .related(&request.id),
        )
    }

    pub fn inventory_request_rejected(
        &mut self,
        request: &InventoryRequest,
        job: &Job,
        approver: &User,
    ) -> &Notification {
        let description = match request.note.as_deref() {
            Some(note) => format!(
                "{} rejected the inventory request for {}: {note}",
                approver.name, job.title
            ),
            None => format!(
                "{} rejected the inventory request for {}",
                approver.name, job.title
            ),
        };
        self.add_notification(
            NewNotification::new(
                NotificationType::InventoryRequestRejected,
                "Inventory request rejected",
                description,
            )
            .link(job.link())
            .related(&request.id),
        )
    }

    /// Not tied to a job; only admins see it.
    pub fn inventory_low_stock(&mut self, item: &InventoryItem) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::InventoryLowStock,
                "Low stock",
                format!(
                    "{} is down to {} {} (minimum {})",
                    item.name, item.quantity, item.unit, item.min_quantity
                ),
            )
            .link(format!("/inventory/{}", item.id))
            .related(&item.id),
        )
    }

    pub fn report_submitted(
        &mut self,
        report_id: &str,
        title: &str,
        submitted_by: &User,
    ) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::ReportSubmitted,
                "Report submitted",
                format!("{} submitted {title}", submitted_by.name),
            )
            .link(format!("/reports/{report_id}"))
            .related(report_id),
        )
    }

    pub fn report_approved(&mut self, report_id: &str, title: &str) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::ReportApproved,
                "Report approved",
                format!("{title} was approved"),
            )
            .link(format!("/reports/{report_id}"))
            .related(report_id),
        )
    }

    pub fn report_rejected(&mut self, report_id: &str, title: &str, reason: &str) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::ReportRejected,
                "Report rejected",
                format!("{title} was rejected: {reason}"),
            )
            .link(format!("/reports/{report_id}"))
            .related(report_id),
        )
    }

    pub fn user_created(&mut self, user: &User) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::UserCreated,
                "New team member",
                format!("{} joined as {}", user.name, user.role),
            )
            .link(format!("/users/{}", user.id))
            .related(&user.id),
        )
    }

    pub fn message(&mut self, from: &User, text: &str, link: Option<&str>) -> &Notification {
        let mut new = NewNotification::new(
            NotificationType::Message,
            format!("Message from {}", from.name),
            text,
        )
        .related(&from.id);
        if let Some(link) = link {
            new = new.link(link);
        }
        self.add_notification(new)
    }

    pub fn comment(&mut self, author: &User, job: &Job, text: &str) -> &Notification {
        self.add_notification(
            NewNotification::new(
                NotificationType::Comment,
                format!("{} commented on {}", author.name, job.title),
                text,
            )
            .link(job.link())
            .related(&job.id),
        )
    }

    pub fn system(&mut self, title: &str, description: &str) -> &Notification {
        self.add_notification(NewNotification::new(
            NotificationType::System,
            title,
            description,
        ))
    }
}
