//! Maintenance template model.
//!
//! # Responsibility
//! - Define recurring maintenance obligations per asset class.
//!
//! # Invariants
//! - `interval_months` is expressed in calendar months. Non-positive values
//!   are persisted as-is and diagnosed at projection time.
//! - `category` and `asset_classes` are stored normalized.

use crate::model::account::AccountId;
use crate::model::{normalize_tag, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TemplateId = Uuid;

/// Visibility of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum TemplateScope {
    /// Built-in template visible to every account.
    Global,
    /// Template defined by one account.
    Account(AccountId),
}

impl TemplateScope {
    /// Whether an account may see templates with this scope.
    pub fn is_visible_to(self, account_id: AccountId) -> bool {
        match self {
            Self::Global => true,
            Self::Account(owner) => owner == account_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTimeUnit {
    Days,
    Months,
}

/// How long before the due date a task should be surfaced.
///
/// Display metadata only, never shifts the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTime {
    pub amount: u32,
    pub unit: LeadTimeUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTemplate {
    pub id: TemplateId,
    pub scope: TemplateScope,
    pub name: String,
    /// Keys the asset's `last_serviced` map.
    pub category: String,
    pub asset_classes: Vec<String>,
    pub interval_months: i32,
    pub lead_time: Option<LeadTime>,
}

impl MaintenanceTemplate {
    pub fn new(
        scope: TemplateScope,
        name: impl Into<String>,
        category: &str,
        asset_classes: &[&str],
        interval_months: i32,
    ) -> Self {
        let mut classes: Vec<String> = asset_classes
            .iter()
            .map(|class| normalize_tag(class))
            .collect();
        classes.sort();
        classes.dedup();

        Self {
            id: Uuid::new_v4(),
            scope,
            name: name.into(),
            category: normalize_tag(category),
            asset_classes: classes,
            interval_months,
            lead_time: None,
        }
    }

    pub fn with_lead_time(mut self, amount: u32, unit: LeadTimeUnit) -> Self {
        self.lead_time = Some(LeadTime { amount, unit });
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("category", &self.category)?;
        if self.asset_classes.is_empty() {
            return Err(ValidationError::NoAssetClasses);
        }
        for class in &self.asset_classes {
            require_text("asset_classes", class)?;
        }
        if matches!(self.lead_time, Some(lead) if lead.amount == 0) {
            return Err(ValidationError::ZeroLeadTime);
        }
        Ok(())
    }

    /// Returns the interval when it is a usable positive month count.
    pub fn positive_interval(&self) -> Option<i32> {
        (self.interval_months > 0).then_some(self.interval_months)
    }
}
