//! Catalog CRUD contract used around the scheduler.
//!
//! These are user-driven writes (registering assets, recording service,
//! completing tasks). The scheduler itself never calls them.

use crate::model::account::{Account, AccountId};
use crate::model::asset::{Asset, AssetId};
use crate::model::task::{MaintenanceTask, TaskId, TaskStatus};
use crate::model::template::{MaintenanceTemplate, TemplateId};
use crate::repo::store::StoreResult;
use chrono::NaiveDate;

pub trait CatalogRepository {
    fn create_account(&self, account: &Account) -> StoreResult<AccountId>;
    /// Fails with `NotFound` when the owning account or parent is missing.
    fn create_asset(&self, asset: &Asset) -> StoreResult<AssetId>;
    /// Sets the last-serviced date of `asset_id` for `category`.
    fn record_service(
        &self,
        asset_id: AssetId,
        category: &str,
        serviced_on: NaiveDate,
    ) -> StoreResult<()>;
    fn create_template(&self, template: &MaintenanceTemplate) -> StoreResult<TemplateId>;
    /// Lists tasks ordered by `due_on ASC, id ASC`.
    fn list_tasks(
        &self,
        account_id: AccountId,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<MaintenanceTask>>;
    /// Fails with `NotFound` unless the task belongs to `account_id`.
    fn set_task_status(
        &self,
        account_id: AccountId,
        task_id: TaskId,
        status: TaskStatus,
    ) -> StoreResult<()>;
}
