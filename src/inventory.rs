//! Inventory ledger and the request/approval workflow.

use chrono::Utc;
use opentelemetry::KeyValue;
use serde_json::json;

use crate::audit::AuditLog;
use crate::directory::{UserDirectory, field_change};
use crate::error::{Error, Result};
use crate::jobs::JobBook;
use crate::model::*;
use crate::notify::NotificationStore;
use crate::telemetry::{metrics, workflow};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Stock on hand, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {
    items: Vec<InventoryItem>,
    dirty: bool,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_items(items: Vec<InventoryItem>) -> Self {
        Self {
            items,
            dirty: false,
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&InventoryItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn require(&self, id: &ItemId) -> Result<&InventoryItem> {
        self.get(id)
            .ok_or_else(|| Error::not_found("inventory item", id))
    }

    pub fn all(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn low_stock(&self) -> Vec<&InventoryItem> {
        self.items.iter().filter(|i| i.is_low_stock()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn insert(&mut self, new: NewInventoryItem) -> Result<&InventoryItem> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("item name is required".into()));
        }
        let id = new.id.unwrap_or_default();
        if self.get(&id).is_some() {
            return Err(Error::Duplicate {
                field: "item id",
                value: id.to_string(),
            });
        }
        self.items.push(InventoryItem {
            id,
            name: name.to_string(),
            sku: new.sku,
            category: new.category,
            unit: new.unit,
            quantity: new.quantity,
            min_quantity: new.min_quantity,
            location: new.location,
            updated_at: Utc::now(),
        });
        self.dirty = true;
        let last = self.items.len() - 1;
        Ok(&self.items[last])
    }

    /// Shift a quantity by `delta`. Returns `(old, new)`.
    pub(crate) fn adjust(&mut self, id: &ItemId, delta: i64) -> Result<(u32, u32)> {
        let item = self
            .items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| Error::not_found("inventory item", id))?;
        let old = item.quantity;
        let new = i64::from(old) + delta;
        if new < 0 {
            return Err(Error::Validation(format!(
                "not enough {}: {old} {} on hand, {} needed",
                item.name,
                item.unit,
                -delta
            )));
        }
        let new = u32::try_from(new)
            .map_err(|_| Error::Validation(format!("quantity of {} overflows", item.name)))?;
        item.quantity = new;
        item.updated_at = Utc::now();
        self.dirty = true;
        Ok((old, new))
    }

    pub(crate) fn snapshot(&self) -> &[InventoryItem] {
        &self.items
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Inventory requests, in filing order.
#[derive(Debug, Clone, Default)]
pub struct RequestBook {
    requests: Vec<InventoryRequest>,
    dirty: bool,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_requests(requests: Vec<InventoryRequest>) -> Self {
        Self {
            requests,
            dirty: false,
        }
    }

    pub fn get(&self, id: &RequestId) -> Option<&InventoryRequest> {
        self.requests.iter().find(|r| &r.id == id)
    }

    pub fn require(&self, id: &RequestId) -> Result<&InventoryRequest> {
        self.get(id)
            .ok_or_else(|| Error::not_found("inventory request", id))
    }

    /// Newest first.
    pub fn all(&self) -> impl Iterator<Item = &InventoryRequest> {
        self.requests.iter().rev()
    }

    /// Requests for one job, newest first.
    pub fn for_job(&self, job: &JobId) -> Vec<&InventoryRequest> {
        self.all().filter(|r| &r.job_id == job).collect()
    }

    /// The most recently filed request for a job.
    pub fn latest_for_job(&self, job: &JobId) -> Option<&InventoryRequest> {
        self.all().find(|r| &r.job_id == job)
    }

    pub fn by_status(&self, status: RequestStatus) -> Vec<&InventoryRequest> {
        self.all().filter(|r| r.status == status).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn insert(&mut self, request: InventoryRequest) {
        self.requests.push(request);
        self.dirty = true;
    }

    pub(crate) fn put(&mut self, request: InventoryRequest) -> Result<()> {
        let slot = self
            .requests
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or_else(|| Error::not_found("inventory request", &request.id))?;
        *slot = request;
        self.dirty = true;
        Ok(())
    }

    /// Drop every request of a job. Returns how many went.
    pub(crate) fn remove_for_job(&mut self, job: &JobId) -> usize {
        let before = self.requests.len();
        self.requests.retain(|r| &r.job_id != job);
        let removed = before - self.requests.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn snapshot(&self) -> &[InventoryRequest] {
        &self.requests
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Ledger edits and the request state machine, with their side effects.
pub struct InventoryWorkflow<'a> {
    pub(crate) ledger: &'a mut InventoryLedger,
    pub(crate) requests: &'a mut RequestBook,
    pub(crate) jobs: &'a mut JobBook,
    pub(crate) users: &'a UserDirectory,
    pub(crate) audit: &'a mut AuditLog,
    pub(crate) notifications: &'a mut NotificationStore,
}

impl InventoryWorkflow<'_> {
    /// Stock a new item.
    pub fn add_item(&mut self, new: NewInventoryItem, actor: &UserId) -> Result<ItemId> {
        self.require_manager(actor, "add inventory items")?;
        let item = self.ledger.insert(new)?.clone();

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Create,
                EntityType::InventoryItem,
                &item.id,
                &item.name,
                actor.clone(),
            )
            .metadata(json!({ "quantity": item.quantity, "unit": item.unit })),
        );
        if item.is_low_stock() {
            self.notifications.inventory_low_stock(&item);
        }
        Ok(item.id)
    }

    /// Manual correction or restock. The result may not go negative.
    pub fn adjust_quantity(
        &mut self,
        id: &ItemId,
        delta: i64,
        actor: &UserId,
        reason: Option<&str>,
    ) -> Result<()> {
        self.require_manager(actor, "adjust inventory")?;
        if delta == 0 {
            return Err(Error::Validation("quantity change must not be zero".into()));
        }
        let (old, new) = self.ledger.adjust(id, delta)?;
        let item = self.ledger.require(id)?.clone();

        let mut entry = NewAuditEntry::new(
            AuditAction::Update,
            EntityType::InventoryItem,
            &item.id,
            &item.name,
            actor.clone(),
        )
        .change("quantity", json!(old), json!(new));
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            entry = entry.details(reason);
        }
        self.audit.add_audit_log(entry);
        if delta < 0 && item.is_low_stock() {
            self.notifications.inventory_low_stock(&item);
        }
        Ok(())
    }

    /// File a request against a job. Starts in `pending`.
    pub fn create_request(&mut self, new: NewInventoryRequest) -> Result<RequestId> {
        let job = self.jobs.require(&new.job_id)?.clone();
        let requester = self.users.require(&new.requested_by)?.clone();
        if new.items.is_empty() {
            return Err(Error::Validation("request at least one item".into()));
        }
        for item in &new.items {
            if item.qty == 0 {
                return Err(Error::Validation(format!(
                    "quantity for {} must be positive",
                    item.id
                )));
            }
            self.ledger.require(&item.id)?;
        }
        if !job.involves(&requester.id) && !requester.role.can_manage_jobs() {
            return Err(Error::not_permitted(
                &requester.id,
                "request inventory for this job",
            ));
        }
        if job.status.is_terminal() {
            return Err(Error::Validation(format!("job {} is {}", job.id, job.status)));
        }

        let request = InventoryRequest {
            id: RequestId::new(),
            job_id: job.id.clone(),
            status: RequestStatus::Pending,
            requested_items: new.items,
            requested_by: requester.id.clone(),
            requested_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            note: new.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            decisions: Vec::new(),
            applied_at: None,
        };
        self.requests.insert(request.clone());

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Create,
                EntityType::InventoryRequest,
                &request.id,
                &job.title,
                requester.id.clone(),
            )
            .metadata(json!({
                "job_id": job.id,
                "items": request.requested_items,
            })),
        );
        self.notifications
            .inventory_request_created(&request, &job, &requester);

        tracing::info!(request = %request.id, job = %job.id, "inventory request filed");
        Ok(request.id)
    }

    /// Approve or reject a request.
    ///
    /// Decisions may be overturned until the request is applied; returning
    /// to `pending` or repeating the current status is not a transition.
    pub fn set_status(
        &mut self,
        id: &RequestId,
        status: RequestStatus,
        updated_by: &UserId,
        note: Option<&str>,
    ) -> Result<()> {
        let mut request = self.requests.require(id)?.clone();
        if !request.status.can_transition_to(status) {
            return Err(Error::transition(request.status, status));
        }
        if request.applied_at.is_some() {
            return Err(Error::Validation(format!(
                "request {id} was already applied to the ledger"
            )));
        }
        let decider = self.users.require(updated_by)?.clone();
        if !decider.role.is_approver() {
            return Err(Error::not_permitted(updated_by, "decide inventory requests"));
        }
        let job = self.jobs.require(&request.job_id)?.clone();

        let from = request.status;
        let now = Utc::now();
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        request.status = status;
        match status {
            RequestStatus::Approved => {
                request.approved_by = Some(updated_by.clone());
                request.approved_at = Some(now);
                request.rejected_by = None;
                request.rejected_at = None;
            }
            RequestStatus::Rejected => {
                request.rejected_by = Some(updated_by.clone());
                request.rejected_at = Some(now);
                request.approved_by = None;
                request.approved_at = None;
            }
            RequestStatus::Pending => return Err(Error::transition(from, status)),
        }
        if let Some(note) = note {
            request.note = Some(note.to_string());
        }
        request.decisions.push(Decision {
            status,
            by: updated_by.clone(),
            at: now,
            note: note.map(str::to_string),
        });
        self.requests.put(request.clone())?;

        let action = match status {
            RequestStatus::Approved => AuditAction::Approve,
            _ => AuditAction::Reject,
        };
        let mut entry = NewAuditEntry::new(
            action,
            EntityType::InventoryRequest,
            &request.id,
            &job.title,
            updated_by.clone(),
        )
        .change("status", json!(from), json!(status))
        .metadata(json!({ "job_id": job.id }));
        if let Some(note) = note {
            entry = entry.details(note);
        }
        self.audit.add_audit_log(entry);

        match status {
            RequestStatus::Approved => {
                self.notifications
                    .inventory_request_approved(&request, &job, &decider);
            }
            _ => {
                self.notifications
                    .inventory_request_rejected(&request, &job, &decider);
            }
        }

        metrics::inventory_decisions().add(1, &[KeyValue::new("status", status.to_string())]);
        workflow::record_state_transition(
            "inventory_request",
            request.id.as_str(),
            &from.to_string(),
            &status.to_string(),
        );
        Ok(())
    }

    /// Draw an approved request's quantities from the ledger and book them
    /// on the job.
    pub fn apply_request(&mut self, id: &RequestId, actor: &UserId) -> Result<()> {
        let mut request = self.requests.require(id)?.clone();
        if request.status != RequestStatus::Approved {
            return Err(Error::Validation(format!(
                "request {id} is {}, only approved requests can be applied",
                request.status
            )));
        }
        if request.applied_at.is_some() {
            return Err(Error::Validation(format!("request {id} was already applied")));
        }
        self.require_manager(actor, "apply inventory requests")?;
        let mut job = self.jobs.require(&request.job_id)?.clone();

        // Check every line before touching the ledger.
        for line in &request.requested_items {
            let item = self.ledger.require(&line.id)?;
            if item.quantity < line.qty {
                return Err(Error::Validation(format!(
                    "not enough {}: {} {} on hand, {} requested",
                    item.name, item.quantity, item.unit, line.qty
                )));
            }
        }

        let mut changes = Vec::new();
        for line in &request.requested_items {
            let (old, new) = self.ledger.adjust(&line.id, -i64::from(line.qty))?;
            changes.push(field_change(line.id.as_str(), json!(old), json!(new)));
            match job.used_inventory.iter_mut().find(|u| u.id == line.id) {
                Some(used) => {
                    used.qty = used.qty.checked_add(line.qty).ok_or_else(|| {
                        Error::Validation(format!("used {} on {} overflows", line.id, job.id))
                    })?;
                }
                None => job.used_inventory.push(line.clone()),
            }
        }
        let now = Utc::now();
        job.updated_at = now;
        self.jobs.put(job.clone())?;
        request.applied_at = Some(now);
        self.requests.put(request.clone())?;

        self.audit.add_audit_log(
            NewAuditEntry::new(
                AuditAction::Update,
                EntityType::InventoryRequest,
                &request.id,
                &job.title,
                actor.clone(),
            )
            .details("applied to ledger")
            .changes(changes)
            .metadata(json!({ "job_id": job.id })),
        );
        for line in &request.requested_items {
            let item = self.ledger.require(&line.id)?.clone();
            if item.is_low_stock() {
                self.notifications.inventory_low_stock(&item);
            }
        }

        tracing::info!(request = %request.id, job = %job.id, "inventory request applied");
        Ok(())
    }

    fn require_manager(&self, id: &UserId, action: &'static str) -> Result<()> {
        let user = self.users.require(id)?;
        if !user.role.is_approver() {
            return Err(Error::not_permitted(id, action));
        }
        Ok(())
    }
}
