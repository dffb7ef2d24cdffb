//! Built-in starter dataset.
//!
//! Parsed from an embedded TOML file. Each of users, inventory and jobs is
//! loaded only into an empty store, so existing data is never touched.

use chrono::Utc;
use serde::Deserialize;

use crate::directory::UserDirectory;
use crate::error::Result;
use crate::inventory::InventoryLedger;
use crate::jobs::JobBook;
use crate::model::*;

const DATASET: &str = include_str!("seed.toml");

#[derive(Debug, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub items: Vec<SeedItem>,
    #[serde(default)]
    pub jobs: Vec<SeedJob>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedItem {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub min_quantity: u32,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedJob {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub departments: Vec<String>,
    pub creator: String,
    pub lead_technician: Option<String>,
    #[serde(default)]
    pub assigned: Vec<String>,
    pub address: Option<String>,
}

/// Parse the embedded dataset.
pub fn dataset() -> Result<Dataset> {
    Ok(toml::from_str(DATASET)?)
}

/// Fill whichever of the three stores are empty. Returns how many records
/// were added.
pub(crate) fn apply(
    dataset: &Dataset,
    users: &mut UserDirectory,
    ledger: &mut InventoryLedger,
    jobs: &mut JobBook,
) -> Result<usize> {
    let mut added = 0;

    if users.is_empty() {
        for u in &dataset.users {
            let mut new = NewUser::new(&u.name, &u.email, u.role).id(u.id.as_str());
            if let Some(department) = &u.department {
                new = new.department(department);
            }
            if let Some(phone) = &u.phone {
                new = new.phone(phone);
            }
            users.insert(new)?;
            added += 1;
        }
    }

    if ledger.is_empty() {
        for i in &dataset.items {
            let mut new = NewInventoryItem::new(&i.name, i.quantity)
                .id(i.id.as_str())
                .min_quantity(i.min_quantity);
            if let Some(sku) = &i.sku {
                new = new.sku(sku);
            }
            if let Some(category) = &i.category {
                new = new.category(category);
            }
            if let Some(unit) = &i.unit {
                new = new.unit(unit);
            }
            if let Some(location) = &i.location {
                new = new.location(location);
            }
            ledger.insert(new)?;
            added += 1;
        }
    }

    if jobs.is_empty() {
        for j in &dataset.jobs {
            match seed_job(j, users) {
                Some(job) => {
                    jobs.insert(job)?;
                    added += 1;
                }
                None => tracing::warn!(job = %j.id, "seed job skipped: unknown user"),
            }
        }
    }

    Ok(added)
}

/// Build a seed job from directory snapshots. `None` if a referenced user is
/// missing, which happens when the directory was not seeded.
fn seed_job(j: &SeedJob, users: &UserDirectory) -> Option<Job> {
    let lookup = |id: &str| users.get(&UserId::from(id)).cloned();

    let creator = lookup(j.creator.as_str())?;
    let lead_technician = match &j.lead_technician {
        Some(id) => Some(lookup(id.as_str())?),
        None => None,
    };
    let assigned_employees = j
        .assigned
        .iter()
        .map(|id| lookup(id.as_str()))
        .collect::<Option<Vec<_>>>()?;

    let now = Utc::now();
    Some(Job {
        id: JobId::from(j.id.as_str()),
        title: j.title.clone(),
        description: j.description.clone(),
        status: j.status,
        priority: j.priority,
        departments: j.departments.clone(),
        creator,
        lead_technician,
        assigned_employees,
        used_inventory: Vec::new(),
        start_date: None,
        end_date: None,
        attachments: Vec::new(),
        location: j.address.as_ref().map(|address| Location {
            address: address.clone(),
            latitude: None,
            longitude: None,
        }),
        signature: None,
        rejection_reason: None,
        completion_requested_by: None,
        completed_at: None,
        work_logs: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_dataset_parses() {
        let data = dataset().unwrap();
        assert_eq!(data.users.len(), 7);
        assert_eq!(data.items.len(), 4);
        assert_eq!(data.jobs.len(), 2);
    }

    #[test]
    fn seeds_only_empty_stores() {
        let data = dataset().unwrap();
        let mut users = UserDirectory::new();
        users
            .insert(NewUser::new("Solo", "solo@example.com", Role::Admin).id("U-SOLO"))
            .unwrap();
        let mut ledger = InventoryLedger::new();
        let mut jobs = JobBook::new();

        let added = apply(&data, &mut users, &mut ledger, &mut jobs).unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(ledger.len(), 4);
        // Seed jobs reference seed users, which were not loaded.
        assert!(jobs.is_empty());
        assert_eq!(added, 4);
    }
}
