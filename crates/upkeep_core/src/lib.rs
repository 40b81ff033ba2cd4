//! Core domain logic for Upkeep: accounts, assets, maintenance templates
//! and the maintenance scheduler.
//! This crate is the single source of truth for scheduling invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use config::{ConfigError, SchedulerConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::account::{Account, AccountId};
pub use model::asset::{Asset, AssetId, AssetOwner, BaselineSource};
pub use model::task::{DuePeriod, MaintenanceTask, TaskId, TaskKey, TaskStatus};
pub use model::template::{LeadTime, LeadTimeUnit, MaintenanceTemplate, TemplateId, TemplateScope};
pub use model::ValidationError;
pub use repo::catalog::CatalogRepository;
pub use repo::memory_store::InMemoryStore;
pub use repo::sqlite_store::SqliteMaintenanceStore;
pub use repo::store::{
    InsertOutcome, Loaded, MaintenanceStore, RecordKind, RejectedRecord, StoreError, StoreResult,
};
pub use schedule::lock::AccountLocks;
pub use schedule::projector::{LookaheadMonths, ProjectionIssue};
pub use schedule::SchedulerError;
pub use service::clock::{Clock, FixedClock, SystemClock};
pub use service::lookahead::resolve_lookahead;
pub use service::scheduler_service::{SchedulerRunResult, SchedulerService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
