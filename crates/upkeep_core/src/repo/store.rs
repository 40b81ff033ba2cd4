//! Scheduler-facing store contract.

use crate::db::DbError;
use crate::model::account::AccountId;
use crate::model::asset::Asset;
use crate::model::task::MaintenanceTask;
use crate::model::template::MaintenanceTemplate;
use crate::model::ValidationError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    Validation(ValidationError),
    InvalidData(String),
    /// Backend cannot serve requests right now.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Kind of persisted record the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Asset,
    Template,
    Task,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Template => "template",
            Self::Task => "task",
        }
    }
}

/// A stored row that failed to decode. Its siblings are still returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub kind: RecordKind,
    /// Raw id text as stored; may itself be the malformed value.
    pub id: String,
    pub reason: String,
}

/// Decoded records plus the rows that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Loaded<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }

    /// Sorts one decode attempt into `records` or `rejected`.
    pub(crate) fn push_decoded(
        &mut self,
        kind: RecordKind,
        id: &str,
        decoded: StoreResult<T>,
    ) -> StoreResult<()> {
        match decoded {
            Ok(record) => self.records.push(record),
            Err(StoreError::InvalidData(reason)) => self.rejected.push(RejectedRecord {
                kind,
                id: id.to_string(),
                reason,
            }),
            Err(other) => return Err(other),
        }
        Ok(())
    }
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Result of a conditional task insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A task with the same (asset, template, due-period) key exists.
    AlreadyExists,
}

/// Capability set consumed by the scheduler.
///
/// Implementations must make `insert_task_if_absent` atomic with respect to
/// the task key, so concurrent callers observe at most one `Inserted`.
pub trait MaintenanceStore: Send + Sync {
    fn account_exists(&self, account_id: AccountId) -> StoreResult<bool>;
    /// Global templates plus templates owned by `account_id`.
    fn find_templates_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Loaded<MaintenanceTemplate>>;
    /// Assets owned directly or through a parent chain.
    fn find_assets_for_account(&self, account_id: AccountId) -> StoreResult<Loaded<Asset>>;
    /// Existing tasks of every status.
    fn find_existing_tasks(&self, account_id: AccountId) -> StoreResult<Loaded<MaintenanceTask>>;
    fn insert_task_if_absent(&self, task: &MaintenanceTask) -> StoreResult<InsertOutcome>;
}

impl<S: MaintenanceStore + ?Sized> MaintenanceStore for Arc<S> {
    fn account_exists(&self, account_id: AccountId) -> StoreResult<bool> {
        (**self).account_exists(account_id)
    }

    fn find_templates_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Loaded<MaintenanceTemplate>> {
        (**self).find_templates_for_account(account_id)
    }

    fn find_assets_for_account(&self, account_id: AccountId) -> StoreResult<Loaded<Asset>> {
        (**self).find_assets_for_account(account_id)
    }

    fn find_existing_tasks(&self, account_id: AccountId) -> StoreResult<Loaded<MaintenanceTask>> {
        (**self).find_existing_tasks(account_id)
    }

    fn insert_task_if_absent(&self, task: &MaintenanceTask) -> StoreResult<InsertOutcome> {
        (**self).insert_task_if_absent(task)
    }
}
