//! Core engine. The public API for jobs, inventory, users, audit and
//! notifications.
//!
//! The engine owns the storage backend and the in-memory stores. Every
//! mutation runs through `with_transaction`: the operation works on a clone
//! of the stores, and only when it succeeds are the touched namespaces
//! written in one batch and the clone swapped in.

use opentelemetry::KeyValue;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::directory::{DirectoryService, UserDirectory};
use crate::error::Result;
use crate::inventory::{InventoryLedger, InventoryWorkflow, RequestBook};
use crate::jobs::{self, JobBook, JobLifecycle};
use crate::model::*;
use crate::notify::NotificationStore;
use crate::seed;
use crate::storage::{KvStore, MemoryKv, Namespace, Operation, SqliteKv, load_snapshot, snapshot_op};
use crate::telemetry::{metrics, workflow};

/// Whether an empty store is filled from the built-in dataset on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Seed,
    Empty,
}

/// Every store, as one unit that can be cloned and swapped.
#[derive(Debug, Clone, Default)]
pub(crate) struct Stores {
    users: UserDirectory,
    jobs: JobBook,
    ledger: InventoryLedger,
    requests: RequestBook,
    audit: AuditLog,
    notifications: NotificationStore,
}

impl Stores {
    fn load(kv: &dyn KvStore) -> Result<Self> {
        let users: Vec<User> = load_snapshot(kv, Namespace::Users)?.unwrap_or_default();
        let jobs: Vec<Job> = load_snapshot(kv, Namespace::Jobs)?.unwrap_or_default();
        let items: Vec<InventoryItem> =
            load_snapshot(kv, Namespace::Inventory)?.unwrap_or_default();
        let requests: Vec<InventoryRequest> =
            load_snapshot(kv, Namespace::InventoryRequests)?.unwrap_or_default();
        let audit: Vec<AuditEntry> = load_snapshot(kv, Namespace::Audit)?.unwrap_or_default();
        let notifications: Vec<Notification> =
            load_snapshot(kv, Namespace::Notifications)?.unwrap_or_default();

        tracing::debug!(
            users = users.len(),
            jobs = jobs.len(),
            items = items.len(),
            requests = requests.len(),
            audit = audit.len(),
            notifications = notifications.len(),
            "stores loaded"
        );

        Ok(Self {
            users: UserDirectory::from_users(users),
            jobs: JobBook::from_jobs(jobs),
            ledger: InventoryLedger::from_items(items),
            requests: RequestBook::from_requests(requests),
            audit: AuditLog::from_entries(audit),
            notifications: NotificationStore::from_items(notifications),
        })
    }

    /// One put per touched namespace.
    fn dirty_ops(&self) -> Result<Vec<Operation>> {
        let mut ops = Vec::new();
        if self.users.is_dirty() {
            ops.push(snapshot_op(Namespace::Users, &self.users.snapshot())?);
        }
        if self.jobs.is_dirty() {
            ops.push(snapshot_op(Namespace::Jobs, &self.jobs.snapshot())?);
        }
        if self.ledger.is_dirty() {
            ops.push(snapshot_op(Namespace::Inventory, &self.ledger.snapshot())?);
        }
        if self.requests.is_dirty() {
            ops.push(snapshot_op(
                Namespace::InventoryRequests,
                &self.requests.snapshot(),
            )?);
        }
        if self.audit.is_dirty() {
            ops.push(snapshot_op(Namespace::Audit, &self.audit.snapshot())?);
        }
        if self.notifications.is_dirty() {
            ops.push(snapshot_op(
                Namespace::Notifications,
                &self.notifications.snapshot(),
            )?);
        }
        Ok(ops)
    }

    fn mark_clean(&mut self) {
        self.users.mark_clean();
        self.jobs.mark_clean();
        self.ledger.mark_clean();
        self.requests.mark_clean();
        self.audit.mark_clean();
        self.notifications.mark_clean();
    }
}

/// Mutable view of the working set inside a transaction.
///
/// Hands out the service objects, each borrowing exactly the stores it
/// coordinates.
pub struct TxContext<'a> {
    stores: &'a mut Stores,
}

impl TxContext<'_> {
    pub fn jobs(&mut self) -> JobLifecycle<'_> {
        let s = &mut *self.stores;
        JobLifecycle {
            jobs: &mut s.jobs,
            users: &s.users,
            ledger: &s.ledger,
            requests: &mut s.requests,
            audit: &mut s.audit,
            notifications: &mut s.notifications,
        }
    }

    pub fn inventory(&mut self) -> InventoryWorkflow<'_> {
        let s = &mut *self.stores;
        InventoryWorkflow {
            ledger: &mut s.ledger,
            requests: &mut s.requests,
            jobs: &mut s.jobs,
            users: &s.users,
            audit: &mut s.audit,
            notifications: &mut s.notifications,
        }
    }

    pub fn directory(&mut self) -> DirectoryService<'_> {
        let s = &mut *self.stores;
        DirectoryService {
            users: &mut s.users,
            audit: &mut s.audit,
            notifications: &mut s.notifications,
        }
    }

    pub fn audit(&mut self) -> &mut AuditLog {
        &mut self.stores.audit
    }

    pub fn notifications(&mut self) -> &mut NotificationStore {
        &mut self.stores.notifications
    }

    pub fn users(&self) -> &UserDirectory {
        &self.stores.users
    }

    pub fn job_book(&self) -> &JobBook {
        &self.stores.jobs
    }

    /// Mark every notification the viewer can see as read.
    fn mark_all_read(&mut self, viewer: &UserId) -> Result<usize> {
        let s = &mut *self.stores;
        let viewer = s.users.require(viewer)?;
        Ok(s.notifications.mark_all_read(viewer, &s.jobs))
    }
}

/// The field-service engine. Owns all state and enforces all invariants.
pub struct Engine {
    kv: Box<dyn KvStore>,
    stores: Stores,
}

impl Engine {
    /// Engine on a volatile backend, seeded with the built-in dataset.
    pub fn in_memory() -> Result<Self> {
        Self::with_backend(Box::new(MemoryKv::new()), Bootstrap::Seed)
    }

    /// Engine on a SQLite file, seeded if the file is new.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::with_backend(Box::new(SqliteKv::open(path)?), Bootstrap::Seed)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let bootstrap = if config.seed {
            Bootstrap::Seed
        } else {
            Bootstrap::Empty
        };
        let kv: Box<dyn KvStore> = match &config.data_path {
            Some(path) => Box::new(SqliteKv::open(path)?),
            None => Box::new(MemoryKv::new()),
        };
        Self::with_backend(kv, bootstrap)
    }

    /// Load every store from `kv`, seeding empty ones if asked to.
    pub fn with_backend(mut kv: Box<dyn KvStore>, bootstrap: Bootstrap) -> Result<Self> {
        let mut stores = Stores::load(kv.as_ref())?;

        if bootstrap == Bootstrap::Seed {
            let dataset = seed::dataset()?;
            let added = seed::apply(
                &dataset,
                &mut stores.users,
                &mut stores.ledger,
                &mut stores.jobs,
            )?;
            if added > 0 {
                tracing::info!(records = added, "seeded built-in dataset");
            }
        }

        let ops = stores.dirty_ops()?;
        if !ops.is_empty() {
            kv.write_batch(ops)?;
        }
        stores.mark_clean();

        Ok(Self { kv, stores })
    }

    /// Run `f` against a working copy of the stores.
    ///
    /// On `Ok` every touched namespace is written in one batch and the copy
    /// becomes the live state. On `Err`, or if the write fails, the copy is
    /// dropped and nothing changes.
    pub fn with_transaction<F, T>(&mut self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut TxContext) -> Result<T>,
    {
        let span = workflow::start_operation_span(operation);
        let _guard = span.enter();

        let mut working = self.stores.clone();
        let result = f(&mut TxContext {
            stores: &mut working,
        })
        .and_then(|value| {
            let ops = working.dirty_ops()?;
            if !ops.is_empty() {
                tracing::debug!(operation, namespaces = ops.len(), "committing");
                self.kv.write_batch(ops)?;
            }
            Ok(value)
        });

        match result {
            Ok(value) => {
                working.mark_clean();
                self.stores = working;
                workflow::record_outcome(&span, "committed");
                metrics::transactions().add(
                    1,
                    &[
                        KeyValue::new("operation", operation.to_string()),
                        KeyValue::new("result", "committed"),
                    ],
                );
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "operation rolled back");
                workflow::record_outcome(&span, "rolled_back");
                metrics::transactions().add(
                    1,
                    &[
                        KeyValue::new("operation", operation.to_string()),
                        KeyValue::new("result", "rolled_back"),
                    ],
                );
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    pub fn create_job(&mut self, new: NewJob) -> Result<JobId> {
        self.with_transaction("create_job", |tx| tx.jobs().create(new))
    }

    pub fn update_job(&mut self, id: &JobId, update: JobUpdate, actor: &UserId) -> Result<()> {
        self.with_transaction("update_job", |tx| tx.jobs().update(id, update, actor))
    }

    pub fn assign_employee(
        &mut self,
        id: &JobId,
        employee: &UserId,
        actor: &UserId,
    ) -> Result<()> {
        self.with_transaction("assign_employee", |tx| {
            tx.jobs().assign_employee(id, employee, actor)
        })
    }

    pub fn unassign_employee(
        &mut self,
        id: &JobId,
        employee: &UserId,
        actor: &UserId,
    ) -> Result<()> {
        self.with_transaction("unassign_employee", |tx| {
            tx.jobs().unassign_employee(id, employee, actor)
        })
    }

    pub fn start_job(&mut self, id: &JobId, actor: &UserId) -> Result<()> {
        self.with_transaction("start_job", |tx| tx.jobs().start(id, actor))
    }

    pub fn cancel_job(&mut self, id: &JobId, actor: &UserId, reason: Option<&str>) -> Result<()> {
        self.with_transaction("cancel_job", |tx| tx.jobs().cancel(id, actor, reason))
    }

    pub fn add_work_log(&mut self, id: &JobId, author: &UserId, note: &str) -> Result<()> {
        self.with_transaction("add_work_log", |tx| {
            tx.jobs().add_work_log(id, author, note)
        })
    }

    pub fn request_job_completion(
        &mut self,
        id: &JobId,
        requester: &UserId,
        signature: &str,
    ) -> Result<()> {
        self.with_transaction("request_job_completion", |tx| {
            tx.jobs().request_completion(id, requester, signature)
        })
    }

    pub fn approve_completion(&mut self, id: &JobId, approver: &UserId) -> Result<()> {
        self.with_transaction("approve_completion", |tx| {
            tx.jobs().approve_completion(id, approver)
        })
    }

    pub fn reject_completion(&mut self, id: &JobId, approver: &UserId, reason: &str) -> Result<()> {
        self.with_transaction("reject_completion", |tx| {
            tx.jobs().reject_completion(id, approver, reason)
        })
    }

    pub fn delete_job(&mut self, id: &JobId, actor: &UserId) -> Result<()> {
        self.with_transaction("delete_job", |tx| tx.jobs().delete(id, actor))
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.stores.jobs.get(id)
    }

    /// Newest first.
    pub fn jobs(&self) -> Vec<&Job> {
        self.stores.jobs.all().collect()
    }

    pub fn jobs_by_status(&self, status: JobStatus) -> Vec<&Job> {
        self.stores.jobs.by_status(status)
    }

    pub fn jobs_for_user(&self, user: &UserId) -> Vec<&Job> {
        self.stores.jobs.for_user(user)
    }

    pub fn available_employees(&self, for_job: Option<&JobId>) -> Vec<&User> {
        jobs::available_employees(&self.stores.users, &self.stores.jobs, for_job)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn create_user(&mut self, new: NewUser, actor: &UserId) -> Result<UserId> {
        self.with_transaction("create_user", |tx| tx.directory().create_user(new, actor))
    }

    pub fn update_user(&mut self, id: &UserId, update: UserUpdate, actor: &UserId) -> Result<()> {
        self.with_transaction("update_user", |tx| {
            tx.directory().update_user(id, update, actor)
        })
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.stores.users.get(id)
    }

    pub fn users(&self) -> &[User] {
        self.stores.users.all()
    }

    pub fn users_by_role(&self, role: Role) -> Vec<&User> {
        self.stores.users.by_role(role)
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    pub fn add_inventory_item(&mut self, new: NewInventoryItem, actor: &UserId) -> Result<ItemId> {
        self.with_transaction("add_inventory_item", |tx| {
            tx.inventory().add_item(new, actor)
        })
    }

    pub fn adjust_inventory_quantity(
        &mut self,
        id: &ItemId,
        delta: i64,
        actor: &UserId,
        reason: Option<&str>,
    ) -> Result<()> {
        self.with_transaction("adjust_inventory_quantity", |tx| {
            tx.inventory().adjust_quantity(id, delta, actor, reason)
        })
    }

    pub fn inventory_item(&self, id: &ItemId) -> Option<&InventoryItem> {
        self.stores.ledger.get(id)
    }

    pub fn inventory_items(&self) -> &[InventoryItem] {
        self.stores.ledger.all()
    }

    pub fn low_stock_items(&self) -> Vec<&InventoryItem> {
        self.stores.ledger.low_stock()
    }

    pub fn add_inventory_request(&mut self, new: NewInventoryRequest) -> Result<RequestId> {
        self.with_transaction("add_inventory_request", |tx| {
            tx.inventory().create_request(new)
        })
    }

    pub fn update_inventory_request_status(
        &mut self,
        id: &RequestId,
        status: RequestStatus,
        updated_by: &UserId,
        note: Option<&str>,
    ) -> Result<()> {
        self.with_transaction("update_inventory_request_status", |tx| {
            tx.inventory().set_status(id, status, updated_by, note)
        })
    }

    pub fn apply_inventory_request(&mut self, id: &RequestId, actor: &UserId) -> Result<()> {
        self.with_transaction("apply_inventory_request", |tx| {
            tx.inventory().apply_request(id, actor)
        })
    }

    pub fn inventory_request(&self, id: &RequestId) -> Option<&InventoryRequest> {
        self.stores.requests.get(id)
    }

    /// The most recent request filed for a job.
    pub fn inventory_request_by_job_id(&self, job: &JobId) -> Option<&InventoryRequest> {
        self.stores.requests.latest_for_job(job)
    }

    pub fn inventory_requests_for_job(&self, job: &JobId) -> Vec<&InventoryRequest> {
        self.stores.requests.for_job(job)
    }

    pub fn inventory_requests_by_status(&self, status: RequestStatus) -> Vec<&InventoryRequest> {
        self.stores.requests.by_status(status)
    }

    // -----------------------------------------------------------------------
    // Audit
    // -----------------------------------------------------------------------

    /// Record an entry that no engine operation produces, such as a report
    /// action.
    pub fn add_audit_log(&mut self, new: NewAuditEntry) -> Result<AuditId> {
        self.with_transaction("add_audit_log", |tx| {
            Ok(tx.audit().add_audit_log(new).id.clone())
        })
    }

    /// Newest first.
    pub fn audit_logs(&self) -> Vec<&AuditEntry> {
        self.stores.audit.entries().collect()
    }

    pub fn audit_logs_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Option<&str>,
    ) -> Vec<&AuditEntry> {
        self.stores.audit.by_entity(entity_type, entity_id)
    }

    pub fn audit_logs_by_user(&self, user: &UserId) -> Vec<&AuditEntry> {
        self.stores.audit.by_user(user)
    }

    pub fn audit_logs_by_action(&self, action: AuditAction) -> Vec<&AuditEntry> {
        self.stores.audit.by_action(action)
    }

    /// Wipe the audit log. Development reset only.
    pub fn clear_audit_logs(&mut self) -> Result<()> {
        self.with_transaction("clear_audit_logs", |tx| {
            tx.audit().clear();
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Append a notification built by one of the store's constructors:
    /// `engine.notify(|n| n.report_submitted("R-1", "Q3 audit", &user))`.
    pub fn notify<F>(&mut self, build: F) -> Result<NotificationId>
    where
        F: FnOnce(&mut NotificationStore) -> &Notification,
    {
        self.with_transaction("notify", |tx| Ok(build(tx.notifications()).id.clone()))
    }

    pub fn add_notification(&mut self, new: NewNotification) -> Result<NotificationId> {
        self.with_transaction("add_notification", |tx| {
            Ok(tx.notifications().add_notification(new).id.clone())
        })
    }

    /// The feed as `viewer` sees it, newest first.
    pub fn notifications_for(&self, viewer: &UserId) -> Result<Vec<&Notification>> {
        let viewer = self.stores.users.require(viewer)?;
        Ok(self
            .stores
            .notifications
            .visible_to(viewer, &self.stores.jobs)
            .collect())
    }

    pub fn unread_count(&self, viewer: &UserId) -> Result<usize> {
        let viewer = self.stores.users.require(viewer)?;
        Ok(self
            .stores
            .notifications
            .unread_count(viewer, &self.stores.jobs))
    }

    /// Unfiltered feed, newest first.
    pub fn all_notifications(&self) -> Vec<&Notification> {
        self.stores.notifications.all().collect()
    }

    /// Idempotent. Returns whether the notification was unread before.
    pub fn mark_notification_read(&mut self, id: &NotificationId) -> Result<bool> {
        self.with_transaction("mark_notification_read", |tx| {
            tx.notifications().mark_read(id)
        })
    }

    pub fn mark_all_read(&mut self, viewer: &UserId) -> Result<usize> {
        self.with_transaction("mark_all_read", |tx| tx.mark_all_read(viewer))
    }

    pub fn delete_notification(&mut self, id: &NotificationId) -> Result<()> {
        self.with_transaction("delete_notification", |tx| {
            tx.notifications().delete(id).map(|_| ())
        })
    }

    /// Wipe the feed. Development reset only.
    pub fn clear_notifications(&mut self) -> Result<()> {
        self.with_transaction("clear_notifications", |tx| {
            tx.notifications().clear();
            Ok(())
        })
    }
}
