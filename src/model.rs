//! Core data model.
//!
//! Every entity is referenced by a string id newtype. Users, jobs and
//! inventory items are owned by their stores; everything else refers to them
//! by id or by snapshot.

pub mod audit;
pub mod inventory;
pub mod job;
pub mod notification;
pub mod user;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use audit::*;
pub use inventory::*;
pub use job::*;
pub use notification::*;
pub use user::*;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Id of a user in the directory.
    UserId
);
string_id!(
    /// Id of a job.
    JobId
);
string_id!(
    /// Id of an inventory item in the ledger.
    ItemId
);
string_id!(
    /// Id of an inventory request.
    RequestId
);
string_id!(
    /// Id of an audit entry. Assigned by the audit store.
    AuditId
);
string_id!(
    /// Id of a notification.
    NotificationId
);

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// A quantity of one inventory item, used both for requested draws and for
/// inventory consumed by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub id: ItemId,
    pub qty: u32,
}

impl ItemQuantity {
    pub fn new(id: impl Into<ItemId>, qty: u32) -> Self {
        Self { id: id.into(), qty }
    }
}
