//! Inventory items and the requests that draw on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, ItemQuantity, JobId, RequestId, UserId};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A stocked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    /// Unit of measure ("pcs", "m", "kg").
    pub unit: String,
    pub quantity: u32,
    /// Restock threshold. At or below this the item counts as low stock.
    #[serde(default)]
    pub min_quantity: u32,
    pub location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// Builder for adding an item to the ledger.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub(crate) id: Option<ItemId>,
    pub(crate) name: String,
    pub(crate) sku: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) unit: String,
    pub(crate) quantity: u32,
    pub(crate) min_quantity: u32,
    pub(crate) location: Option<String>,
}

impl NewInventoryItem {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: None,
            name: name.into(),
            sku: None,
            category: None,
            unit: "pcs".to_string(),
            quantity,
            min_quantity: 0,
            location: None,
        }
    }

    /// Use a fixed id instead of a generated one.
    pub fn id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn min_quantity(mut self, min: u32) -> Self {
        self.min_quantity = min;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Decision state of an inventory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Decisions can be flipped, but nothing returns to pending.
    pub fn can_transition_to(self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Rejected) | (Rejected, Approved)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        f.pad(s)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(crate::error::Error::Validation(format!(
                "unknown request status: {s}"
            ))),
        }
    }
}

/// One approve/reject decision, kept even after it is overturned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub status: RequestStatus,
    pub by: UserId,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A proposed withdrawal of stock for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRequest {
    pub id: RequestId,
    pub job_id: JobId,
    pub status: RequestStatus,
    pub requested_items: Vec<ItemQuantity>,
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,

    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub note: Option<String>,

    /// Every decision in order, including overturned ones.
    #[serde(default)]
    pub decisions: Vec<Decision>,
    /// When the approved quantities were drawn from the ledger.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Builder for filing an inventory request.
#[derive(Debug, Clone)]
pub struct NewInventoryRequest {
    pub(crate) job_id: JobId,
    pub(crate) requested_by: UserId,
    pub(crate) items: Vec<ItemQuantity>,
    pub(crate) note: Option<String>,
}

impl NewInventoryRequest {
    pub fn new(job_id: impl Into<JobId>, requested_by: impl Into<UserId>) -> Self {
        Self {
            job_id: job_id.into(),
            requested_by: requested_by.into(),
            items: Vec::new(),
            note: None,
        }
    }

    pub fn item(mut self, id: impl Into<ItemId>, qty: u32) -> Self {
        self.items.push(ItemQuantity::new(id, qty));
        self
    }

    pub fn items(mut self, items: Vec<ItemQuantity>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_can_flip_but_never_reopen() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Pending));
    }
}
