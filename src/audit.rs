//! Append-only audit log.
//!
//! Entries are never edited or removed through the public API. The store
//! assigns ids and timestamps, and reads come back newest first.

use std::collections::HashMap;

use chrono::Utc;

use crate::model::*;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// The audit trail for every store.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    /// Oldest first; readers reverse.
    entries: Vec<AuditEntry>,
    /// Positions in `entries` per (entity type, entity id), oldest first.
    by_entity: HashMap<(EntityType, String), Vec<usize>>,
    dirty: bool,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot (oldest first).
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        let mut by_entity: HashMap<(EntityType, String), Vec<usize>> = HashMap::new();
        for (pos, entry) in entries.iter().enumerate() {
            by_entity
                .entry((entry.entity_type, entry.entity_id.clone()))
                .or_default()
                .push(pos);
        }
        Self {
            entries,
            by_entity,
            dirty: false,
        }
    }

    /// Append an entry. Id and timestamp are assigned here.
    ///
    /// Timestamps never run backwards: if the clock stepped back since the
    /// last insertion, the previous timestamp is reused.
    pub fn add_audit_log(&mut self, new: NewAuditEntry) -> &AuditEntry {
        let now = Utc::now();
        let timestamp = match self.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let entry = AuditEntry {
            id: AuditId::new(),
            action: new.action,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            entity_name: new.entity_name,
            performed_by: new.performed_by,
            timestamp,
            details: new.details,
            changes: new.changes,
            metadata: new.metadata,
        };

        metrics::audit_entries().add(
            1,
            &[
                KeyValue::new("action", entry.action.to_string()),
                KeyValue::new("entity_type", entry.entity_type.to_string()),
            ],
        );

        let pos = self.entries.len();
        self.by_entity
            .entry((entry.entity_type, entry.entity_id.clone()))
            .or_default()
            .push(pos);
        self.entries.push(entry);
        self.dirty = true;
        &self.entries[pos]
    }

    /// All entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries about one entity type, optionally narrowed to one id.
    pub fn by_entity(&self, entity_type: EntityType, entity_id: Option<&str>) -> Vec<&AuditEntry> {
        match entity_id {
            Some(id) => self
                .by_entity
                .get(&(entity_type, id.to_string()))
                .map(|positions| positions.iter().rev().map(|&p| &self.entries[p]).collect())
                .unwrap_or_default(),
            None => self
                .entries()
                .filter(|e| e.entity_type == entity_type)
                .collect(),
        }
    }

    /// Entries performed by one user.
    pub fn by_user(&self, user: &UserId) -> Vec<&AuditEntry> {
        self.entries().filter(|e| &e.performed_by == user).collect()
    }

    pub fn by_action(&self, action: AuditAction) -> Vec<&AuditEntry> {
        self.entries().filter(|e| e.action == action).collect()
    }

    /// Drop everything. Development reset only.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_entity.clear();
        self.dirty = true;
    }

    pub(crate) fn snapshot(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: AuditAction, id: &str, by: &str) -> NewAuditEntry {
        NewAuditEntry::new(action, EntityType::Job, id, format!("Job {id}"), by)
    }

    #[test]
    fn reads_are_newest_first() {
        let mut log = AuditLog::new();
        log.add_audit_log(entry(AuditAction::Create, "J1", "u1"));
        log.add_audit_log(entry(AuditAction::Update, "J1", "u1"));
        log.add_audit_log(entry(AuditAction::Approve, "J1", "u2"));

        let actions: Vec<_> = log.entries().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Approve, AuditAction::Update, AuditAction::Create]
        );
        for pair in log.entries().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn index_matches_linear_scan() {
        let mut log = AuditLog::new();
        log.add_audit_log(entry(AuditAction::Create, "J1", "u1"));
        log.add_audit_log(entry(AuditAction::Create, "J2", "u1"));
        log.add_audit_log(entry(AuditAction::Assign, "J1", "u2"));

        let j1: Vec<_> = log
            .by_entity(EntityType::Job, Some("J1"))
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(j1, vec![AuditAction::Assign, AuditAction::Create]);
        assert_eq!(log.by_entity(EntityType::Job, None).len(), 3);
        assert!(log.by_entity(EntityType::User, Some("J1")).is_empty());

        let rebuilt = AuditLog::from_entries(log.snapshot().to_vec());
        assert_eq!(rebuilt.by_entity(EntityType::Job, Some("J1")).len(), 2);
        assert_eq!(rebuilt.by_user(&UserId::from("u2")).len(), 1);
    }
}
