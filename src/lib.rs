//! # fieldops
//!
//! Workflow core for a field-service operations dashboard.
//!
//! Provides the job lifecycle engine, the inventory ledger with its
//! request/approval workflow, an append-only audit log, and a shared
//! notification feed with per-viewer visibility. State lives in a local
//! key-value store (in memory or SQLite) and every operation commits
//! atomically.

pub mod audit;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod jobs;
pub mod model;
pub mod notify;
pub mod seed;
pub mod storage;
pub mod telemetry;
