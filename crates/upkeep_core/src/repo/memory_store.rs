//! In-memory maintenance store.
//!
//! Used by tests and embedders that do not need durability. Mirrors the
//! SQLite store's semantics, including key-level insert deduplication.

use crate::model::account::{Account, AccountId};
use crate::model::asset::{Asset, AssetId, AssetOwner};
use crate::model::task::{MaintenanceTask, TaskId, TaskKey, TaskStatus};
use crate::model::template::{MaintenanceTemplate, TemplateId, TemplateScope};
use crate::model::{normalize_tag, ValidationError};
use crate::repo::catalog::CatalogRepository;
use crate::repo::store::{InsertOutcome, Loaded, MaintenanceStore, StoreError, StoreResult};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    assets: BTreeMap<AssetId, Asset>,
    templates: BTreeMap<TemplateId, MaintenanceTemplate>,
    tasks: Vec<MaintenanceTask>,
    task_keys: HashSet<TaskKey>,
}

impl MemoryState {
    /// Walks the parent chain to the owning account.
    fn owning_account(&self, asset: &Asset) -> Option<AccountId> {
        let mut current = asset;
        for _ in 0..=self.assets.len() {
            match current.owner {
                AssetOwner::Account(account_id) => return Some(account_id),
                AssetOwner::Parent(parent_id) => current = self.assets.get(&parent_id)?,
            }
        }
        None
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every scheduler-facing call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl MaintenanceStore for InMemoryStore {
    fn account_exists(&self, account_id: AccountId) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.state.lock().accounts.contains_key(&account_id))
    }

    fn find_templates_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Loaded<MaintenanceTemplate>> {
        self.ensure_available()?;
        let state = self.state.lock();
        let mut templates: Vec<MaintenanceTemplate> = state
            .templates
            .values()
            .filter(|template| template.scope.is_visible_to(account_id))
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Loaded::new(templates))
    }

    fn find_assets_for_account(&self, account_id: AccountId) -> StoreResult<Loaded<Asset>> {
        self.ensure_available()?;
        let state = self.state.lock();
        Ok(Loaded::new(
            state
                .assets
                .values()
                .filter(|asset| state.owning_account(asset) == Some(account_id))
                .cloned()
                .collect(),
        ))
    }

    fn find_existing_tasks(&self, account_id: AccountId) -> StoreResult<Loaded<MaintenanceTask>> {
        self.ensure_available()?;
        Ok(Loaded::new(
            self.state
                .lock()
                .tasks
                .iter()
                .filter(|task| task.account_id == account_id)
                .cloned()
                .collect(),
        ))
    }

    fn insert_task_if_absent(&self, task: &MaintenanceTask) -> StoreResult<InsertOutcome> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if !state.task_keys.insert(task.key()) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        state.tasks.push(task.clone());
        Ok(InsertOutcome::Inserted)
    }
}

impl CatalogRepository for InMemoryStore {
    fn create_account(&self, account: &Account) -> StoreResult<AccountId> {
        account.validate()?;
        let mut state = self.state.lock();
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::InvalidData(format!(
                "account already exists: {}",
                account.id
            )));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account.id)
    }

    fn create_asset(&self, asset: &Asset) -> StoreResult<AssetId> {
        asset.validate()?;
        let mut state = self.state.lock();
        if state.assets.contains_key(&asset.id) {
            return Err(StoreError::InvalidData(format!(
                "asset already exists: {}",
                asset.id
            )));
        }
        match asset.owner {
            AssetOwner::Account(account_id) if !state.accounts.contains_key(&account_id) => {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: account_id,
                });
            }
            AssetOwner::Parent(parent_id) if !state.assets.contains_key(&parent_id) => {
                return Err(StoreError::NotFound {
                    entity: "asset",
                    id: parent_id,
                });
            }
            _ => {}
        }

        let mut stored = asset.clone();
        stored.asset_class = normalize_tag(&asset.asset_class);
        stored.last_serviced = asset
            .last_serviced
            .iter()
            .map(|(category, date)| (normalize_tag(category), *date))
            .collect();
        state.assets.insert(stored.id, stored);
        Ok(asset.id)
    }

    fn record_service(
        &self,
        asset_id: AssetId,
        category: &str,
        serviced_on: NaiveDate,
    ) -> StoreResult<()> {
        if category.trim().is_empty() {
            return Err(ValidationError::BlankField("category").into());
        }
        let mut state = self.state.lock();
        let asset = state.assets.get_mut(&asset_id).ok_or(StoreError::NotFound {
            entity: "asset",
            id: asset_id,
        })?;
        asset.mark_serviced(category, serviced_on);
        Ok(())
    }

    fn create_template(&self, template: &MaintenanceTemplate) -> StoreResult<TemplateId> {
        template.validate()?;
        let mut state = self.state.lock();
        if state.templates.contains_key(&template.id) {
            return Err(StoreError::InvalidData(format!(
                "template already exists: {}",
                template.id
            )));
        }
        if let TemplateScope::Account(account_id) = template.scope {
            if !state.accounts.contains_key(&account_id) {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: account_id,
                });
            }
        }
        state.templates.insert(template.id, template.clone());
        Ok(template.id)
    }

    fn list_tasks(
        &self,
        account_id: AccountId,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<MaintenanceTask>> {
        let state = self.state.lock();
        let mut tasks: Vec<MaintenanceTask> = state
            .tasks
            .iter()
            .filter(|task| task.account_id == account_id)
            .filter(|task| status.map_or(true, |status| task.status == status))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.due_on.cmp(&b.due_on).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn set_task_status(
        &self,
        account_id: AccountId,
        task_id: TaskId,
        status: TaskStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id && task.account_id == account_id)
            .ok_or(StoreError::NotFound {
                entity: "task",
                id: task_id,
            })?;
        task.status = status;
        Ok(())
    }
}
