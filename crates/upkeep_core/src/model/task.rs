//! Maintenance task model.
//!
//! # Responsibility
//! - Represent one concrete, dated maintenance obligation.
//! - Define the due-period key used for deduplication.
//!
//! # Invariants
//! - A task is never duplicated for the same (asset, template, due-period).
//! - Scheduler-created tasks always start as `Pending`.

use crate::model::account::AccountId;
use crate::model::asset::AssetId;
use crate::model::template::TemplateId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;

const DUE_PERIOD_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Dismissed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// Recurrence bucket a task belongs to.
///
/// Identified by the interval-aligned due date of the occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuePeriod(NaiveDate);

impl DuePeriod {
    pub fn from_due_date(due_on: NaiveDate) -> Self {
        Self(due_on)
    }

    /// Stable storage key, `YYYY-MM-DD`.
    pub fn key(self) -> String {
        self.0.format(DUE_PERIOD_FORMAT).to_string()
    }

    pub fn parse_key(value: &str) -> Option<Self> {
        NaiveDate::parse_from_str(value, DUE_PERIOD_FORMAT)
            .ok()
            .map(Self)
    }
}

impl Display for DuePeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Deduplication key of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub asset_id: AssetId,
    pub template_id: TemplateId,
    pub due_period: DuePeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: TaskId,
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub template_id: TemplateId,
    pub title: String,
    pub due_on: NaiveDate,
    pub due_period: DuePeriod,
    /// First day the task should be shown. Equals `due_on` without lead time.
    pub visible_from: NaiveDate,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceTask {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            asset_id: self.asset_id,
            template_id: self.template_id,
            due_period: self.due_period,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}
