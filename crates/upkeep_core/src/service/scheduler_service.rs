//! Scheduler run entry point.
//!
//! # Responsibility
//! - Run resolve → project → materialize for one account.
//! - Serialize runs per account; let different accounts run in parallel.
//! - Accumulate non-fatal projection issues into the run result.
//!
//! # Invariants
//! - Only `AccountNotFound` and `StoreUnavailable` abort a run. A stored row
//!   that fails to decode is reported as an `InvalidRecord` issue instead.
//! - Re-running with unchanged inputs creates nothing (dedup by key).

use crate::config::SchedulerConfig;
use crate::model::account::AccountId;
use crate::model::task::TaskId;
use crate::repo::store::{MaintenanceStore, RejectedRecord};
use crate::schedule::lock::AccountLocks;
use crate::schedule::materializer::TaskMaterializer;
use crate::schedule::projector::{
    LookaheadMonths, Occurrence, OccurrenceProjector, ProjectionIssue, ProjectionOutcome,
    ProjectionWindow,
};
use crate::schedule::resolver::TemplateResolver;
use crate::schedule::SchedulerError;
use crate::service::clock::{Clock, SystemClock};
use crate::service::lookahead::lookahead_or_default;
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Summary of one scheduler invocation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerRunResult {
    pub account_id: AccountId,
    pub lookahead_months: LookaheadMonths,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub created: usize,
    /// Occurrences already represented by an existing task.
    pub skipped: usize,
    pub templates_considered: usize,
    pub assets_considered: usize,
    pub created_task_ids: Vec<TaskId>,
    /// Non-fatal problems, deduplicated and sorted.
    pub issues: Vec<ProjectionIssue>,
}

impl SchedulerRunResult {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

pub struct SchedulerService<S: MaintenanceStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    config: SchedulerConfig,
    locks: Arc<AccountLocks>,
}

impl<S: MaintenanceStore> SchedulerService<S, SystemClock> {
    /// Service over `store` with wall-clock time and default config.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: MaintenanceStore, C: Clock> SchedulerService<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            config: SchedulerConfig::default(),
            locks: Arc::new(AccountLocks::new()),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares the per-account lock registry with other service instances
    /// over the same data.
    pub fn with_locks(mut self, locks: Arc<AccountLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedules maintenance for `account_id` as of the clock's today.
    ///
    /// `lookahead_months` of `None` or `Some(0)` uses the configured default.
    pub fn run_scheduler(
        &self,
        account_id: AccountId,
        lookahead_months: Option<u32>,
    ) -> Result<SchedulerRunResult, SchedulerError> {
        let lookahead = lookahead_or_default(lookahead_months, self.config.default_lookahead());
        self.run_scheduler_on(account_id, lookahead, self.clock.today())
    }

    /// Schedules maintenance for `account_id` as of `today`.
    ///
    /// `today` only positions the window. Created tasks are stamped with the
    /// clock's `now()`, so the audit time stays real when `today` is
    /// overridden.
    pub fn run_scheduler_on(
        &self,
        account_id: AccountId,
        lookahead: LookaheadMonths,
        today: NaiveDate,
    ) -> Result<SchedulerRunResult, SchedulerError> {
        let started_at = Instant::now();
        let lookahead = self.config.clamp_lookahead(lookahead);
        info!(
            "event=scheduler_run module=scheduler status=start account_id={} lookahead_months={} today={}",
            account_id, lookahead, today
        );

        let result = {
            let _guard = self.locks.lock(account_id);
            self.run_locked(account_id, lookahead, today)
        };

        match &result {
            Ok(summary) => info!(
                "event=scheduler_run module=scheduler status=ok account_id={} created={} skipped={} templates={} assets={} issues={} duration_ms={}",
                account_id,
                summary.created,
                summary.skipped,
                summary.templates_considered,
                summary.assets_considered,
                summary.issues.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=scheduler_run module=scheduler status=error account_id={} error_code={} duration_ms={} error={}",
                account_id,
                err.code(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn run_locked(
        &self,
        account_id: AccountId,
        lookahead: LookaheadMonths,
        today: NaiveDate,
    ) -> Result<SchedulerRunResult, SchedulerError> {
        let resolved = TemplateResolver::new(&self.store).resolve(account_id)?;

        let window = ProjectionWindow::new(today, lookahead);
        let projector = OccurrenceProjector::new(window);

        let mut occurrences: Vec<Occurrence> = Vec::new();
        let mut issues: BTreeSet<ProjectionIssue> = BTreeSet::new();
        for rejected in &resolved.rejected {
            note_rejected(account_id, rejected, &mut issues);
        }
        let mut assets_considered = 0;
        for asset in &resolved.assets {
            let mut considered = false;
            for outcome in projector.project(asset, &resolved.templates) {
                considered = true;
                match outcome {
                    ProjectionOutcome::Due(occurrence) => occurrences.push(occurrence),
                    ProjectionOutcome::OutsideWindow { .. } => {}
                    ProjectionOutcome::Issue(issue) => {
                        if issues.insert(issue.clone()) {
                            warn!(
                                "event=projection_issue module=scheduler account_id={} issue={} detail={}",
                                account_id,
                                issue.code(),
                                issue
                            );
                        }
                    }
                }
            }
            if considered {
                assets_considered += 1;
            }
        }

        // An unreadable task row still holds its key, so the insert
        // conflict keeps its period from being recreated.
        let existing = self.store.find_existing_tasks(account_id)?;
        for rejected in &existing.rejected {
            note_rejected(account_id, rejected, &mut issues);
        }
        let summary = TaskMaterializer::new(&self.store).materialize(
            account_id,
            occurrences,
            &existing.records,
            self.clock.now(),
        )?;

        Ok(SchedulerRunResult {
            account_id,
            lookahead_months: window.lookahead,
            window_start: window.today,
            window_end: window.end,
            created: summary.created.len(),
            skipped: summary.skipped,
            templates_considered: resolved.templates.len(),
            assets_considered,
            created_task_ids: summary.created,
            issues: issues.into_iter().collect(),
        })
    }
}

fn note_rejected(
    account_id: AccountId,
    rejected: &RejectedRecord,
    issues: &mut BTreeSet<ProjectionIssue>,
) {
    let issue = ProjectionIssue::InvalidRecord {
        record: rejected.kind,
        id: rejected.id.clone(),
    };
    if issues.insert(issue) {
        warn!(
            "event=projection_issue module=scheduler account_id={} issue=invalid_record record={} id={} reason={}",
            account_id,
            rejected.kind.as_str(),
            rejected.id,
            rejected.reason
        );
    }
}
