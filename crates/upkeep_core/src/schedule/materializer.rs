//! Task materialization.
//!
//! # Responsibility
//! - Turn projected occurrences into Pending task records.
//! - Reconcile against existing tasks of every status before inserting.
//!
//! # Invariants
//! - Existing tasks are never mutated or deleted.
//! - A key already present (any status) is skipped, never recreated.
//! - A Pending task whose recurrence period still covers a candidate
//!   suppresses it, so at most one Pending task exists per period.
//! - Store insert conflicts count as skipped, not as errors.

use crate::model::account::AccountId;
use crate::model::asset::AssetId;
use crate::model::task::{MaintenanceTask, TaskId, TaskKey, TaskStatus};
use crate::model::template::TemplateId;
use crate::repo::store::{InsertOutcome, MaintenanceStore, StoreResult};
use crate::schedule::calendar::add_months;
use crate::schedule::projector::Occurrence;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Created/skipped tally of one materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub created: Vec<TaskId>,
    pub skipped: usize,
}

/// Why an occurrence did not produce a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    KeyExists,
    PendingCoversPeriod,
    InsertConflict,
}

impl SkipReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::KeyExists => "key_exists",
            Self::PendingCoversPeriod => "pending_covers_period",
            Self::InsertConflict => "insert_conflict",
        }
    }
}

/// Snapshot of what already exists for one account.
struct ExistingTasks {
    keys: HashSet<TaskKey>,
    pending_due: HashMap<(AssetId, TemplateId), Vec<NaiveDate>>,
}

impl ExistingTasks {
    fn from_tasks(tasks: &[MaintenanceTask]) -> Self {
        let mut pending_due: HashMap<(AssetId, TemplateId), Vec<NaiveDate>> = HashMap::new();
        for task in tasks.iter().filter(|task| task.is_pending()) {
            pending_due
                .entry((task.asset_id, task.template_id))
                .or_default()
                .push(task.due_on);
        }
        Self {
            keys: tasks.iter().map(MaintenanceTask::key).collect(),
            pending_due,
        }
    }

    fn skip_reason(&self, occurrence: &Occurrence, key: &TaskKey) -> Option<SkipReason> {
        if self.keys.contains(key) {
            return Some(SkipReason::KeyExists);
        }
        let covered = self
            .pending_due
            .get(&(occurrence.asset_id, occurrence.template_id))
            .is_some_and(|dues| {
                dues.iter().any(|pending_due| {
                    periods_overlap(*pending_due, occurrence.due_on, occurrence.interval_months)
                })
            });
        covered.then_some(SkipReason::PendingCoversPeriod)
    }

    fn record(&mut self, occurrence: &Occurrence, key: TaskKey) {
        self.keys.insert(key);
        self.pending_due
            .entry((occurrence.asset_id, occurrence.template_id))
            .or_default()
            .push(occurrence.due_on);
    }
}

/// Whether `[a, a + interval)` and `[b, b + interval)` intersect.
fn periods_overlap(a: NaiveDate, b: NaiveDate, interval_months: i32) -> bool {
    if a == b {
        return true;
    }
    let (earlier, later) = if a < b { (a, b) } else { (b, a) };
    add_months(earlier, interval_months).is_some_and(|period_end| later < period_end)
}

pub struct TaskMaterializer<'s, S: MaintenanceStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: MaintenanceStore + ?Sized> TaskMaterializer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Inserts a Pending task for every occurrence not yet represented.
    ///
    /// # Errors
    /// Returns the first store failure. Tasks inserted before the failure
    /// stay persisted; a retry skips them by key.
    pub fn materialize<I>(
        &self,
        account_id: AccountId,
        occurrences: I,
        existing: &[MaintenanceTask],
        created_at: DateTime<Utc>,
    ) -> StoreResult<MaterializeSummary>
    where
        I: IntoIterator<Item = Occurrence>,
    {
        let mut snapshot = ExistingTasks::from_tasks(existing);
        let mut summary = MaterializeSummary::default();

        for occurrence in occurrences {
            let key = TaskKey {
                asset_id: occurrence.asset_id,
                template_id: occurrence.template_id,
                due_period: occurrence.due_period,
            };

            let reason = match snapshot.skip_reason(&occurrence, &key) {
                Some(reason) => Some(reason),
                None => {
                    let task = new_pending_task(account_id, &occurrence, created_at);
                    match self.store.insert_task_if_absent(&task)? {
                        InsertOutcome::Inserted => {
                            summary.created.push(task.id);
                            None
                        }
                        InsertOutcome::AlreadyExists => Some(SkipReason::InsertConflict),
                    }
                }
            };

            if let Some(reason) = reason {
                debug!(
                    "event=task_skip module=scheduler account_id={} asset_id={} template_id={} due_period={} reason={}",
                    account_id,
                    occurrence.asset_id,
                    occurrence.template_id,
                    occurrence.due_period,
                    reason.as_str()
                );
                summary.skipped += 1;
            }
            snapshot.record(&occurrence, key);
        }

        Ok(summary)
    }
}

fn new_pending_task(
    account_id: AccountId,
    occurrence: &Occurrence,
    created_at: DateTime<Utc>,
) -> MaintenanceTask {
    MaintenanceTask {
        id: Uuid::new_v4(),
        account_id,
        asset_id: occurrence.asset_id,
        template_id: occurrence.template_id,
        title: occurrence.title.clone(),
        due_on: occurrence.due_on,
        due_period: occurrence.due_period,
        visible_from: occurrence.visible_from,
        status: TaskStatus::Pending,
        created_at,
    }
}
