//! Asset domain model.
//!
//! # Responsibility
//! - Describe anything that needs maintenance: properties, vehicles,
//!   appliances and sub-items attached to them.
//! - Provide the baseline date used by occurrence projection.
//!
//! # Invariants
//! - `asset_class` and `last_serviced` keys are stored normalized
//!   (trimmed, lowercase).
//! - An asset belongs to exactly one account, directly or through its
//!   parent chain.

use crate::model::account::AccountId;
use crate::model::{normalize_tag, require_text, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type AssetId = Uuid;

/// Ownership link of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AssetOwner {
    /// Top-level asset owned by an account.
    Account(AccountId),
    /// Sub-item attached to a property, vehicle or other asset.
    Parent(AssetId),
}

/// Which date the projector used as the recurrence anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    LastServiced,
    Acquired,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub owner: AssetOwner,
    /// Class tag matched against template targets, e.g. `vehicle`.
    pub asset_class: String,
    pub name: String,
    pub acquired_on: Option<NaiveDate>,
    pub created_on: Option<NaiveDate>,
    /// Last-serviced date per maintenance category.
    pub last_serviced: BTreeMap<String, NaiveDate>,
}

impl Asset {
    /// Creates a top-level asset owned by `account_id`.
    pub fn new(account_id: AccountId, asset_class: &str, name: impl Into<String>) -> Self {
        Self::with_owner(AssetOwner::Account(account_id), asset_class, name)
    }

    /// Creates a sub-item attached to `parent_id`.
    pub fn child_of(parent_id: AssetId, asset_class: &str, name: impl Into<String>) -> Self {
        Self::with_owner(AssetOwner::Parent(parent_id), asset_class, name)
    }

    fn with_owner(owner: AssetOwner, asset_class: &str, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            asset_class: normalize_tag(asset_class),
            name: name.into(),
            acquired_on: None,
            created_on: None,
            last_serviced: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("asset_class", &self.asset_class)?;
        if self.owner == AssetOwner::Parent(self.id) {
            return Err(ValidationError::SelfParent);
        }
        if self.last_serviced.keys().any(|key| key.trim().is_empty()) {
            return Err(ValidationError::BlankField("last_serviced.category"));
        }
        Ok(())
    }

    /// Whether this asset's class is one of `classes` (case-insensitive).
    pub fn matches_any_class(&self, classes: &[String]) -> bool {
        let own = normalize_tag(&self.asset_class);
        classes.iter().any(|class| normalize_tag(class) == own)
    }

    /// Records a service date for `category`, keeping the tag normalized.
    pub fn mark_serviced(&mut self, category: &str, on: NaiveDate) {
        self.last_serviced.insert(normalize_tag(category), on);
    }

    /// Resolves the recurrence anchor for `category`.
    ///
    /// Falls back from last-serviced to acquisition to creation date.
    pub fn baseline_for(&self, category: &str) -> Option<(NaiveDate, BaselineSource)> {
        self.last_serviced
            .get(&normalize_tag(category))
            .map(|date| (*date, BaselineSource::LastServiced))
            .or_else(|| self.acquired_on.map(|date| (date, BaselineSource::Acquired)))
            .or_else(|| self.created_on.map(|date| (date, BaselineSource::Created)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Asset, BaselineSource};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn baseline_prefers_category_service_date() {
        let mut asset = Asset::new(Uuid::new_v4(), "Vehicle", "Car");
        asset.acquired_on = Some(date(2020, 1, 1));
        asset.created_on = Some(date(2021, 1, 1));
        asset.mark_serviced("Oil Change", date(2024, 1, 15));

        assert_eq!(asset.asset_class, "vehicle");
        assert_eq!(
            asset.baseline_for("oil change"),
            Some((date(2024, 1, 15), BaselineSource::LastServiced))
        );
        assert_eq!(
            asset.baseline_for("tires"),
            Some((date(2020, 1, 1), BaselineSource::Acquired))
        );
    }

    #[test]
    fn baseline_falls_back_to_creation_then_none() {
        let mut asset = Asset::new(Uuid::new_v4(), "hvac", "Furnace");
        assert_eq!(asset.baseline_for("filter"), None);

        asset.created_on = Some(date(2023, 3, 3));
        assert_eq!(
            asset.baseline_for("filter"),
            Some((date(2023, 3, 3), BaselineSource::Created))
        );
    }

    #[test]
    fn self_parent_is_rejected() {
        let mut asset = Asset::new(Uuid::new_v4(), "hvac", "Furnace");
        asset.owner = super::AssetOwner::Parent(asset.id);
        assert!(asset.validate().is_err());
    }
}
