#![forbid(unsafe_code)]

//! Core engine of the kcal nutrition ledger.
//!
//! This crate provides:
//! - Domain types (profile, log entries, daily summaries)
//! - Daily goal calculation from a biometric profile
//! - Per-day aggregation of the food log
//! - Idempotent upsert of per-day summary records
//! - A trigger-driven orchestrator and the tabular store boundary

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod date_key;
pub mod store;
pub mod csv_store;
pub mod metrics;
pub mod profile;
pub mod ledger;
pub mod summary;
pub mod sync;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Failure, Result};
pub use types::*;
pub use config::Config;
pub use date_key::{DateKey, DateKeyFormatter};
pub use store::{MemoryStore, TabularStore};
pub use csv_store::CsvStore;
pub use profile::{load_profile, ProfileField};
pub use ledger::aggregate;
pub use summary::SummaryUpserter;
pub use sync::{
    initialize_store, ChangeSignal, Clock, EditEvent, FixedClock, RecomputeReport, SyncOrchestrator,
    SystemClock, TodayView,
};
