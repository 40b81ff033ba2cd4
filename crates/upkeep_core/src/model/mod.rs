//! Domain model for accounts, assets, maintenance templates and tasks.
//!
//! # Responsibility
//! - Define canonical records consumed by the scheduler and stores.
//! - Provide write-time validation shared by every store implementation.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Every asset, template and task is scoped beneath exactly one account,
//!   except global templates which are visible to all accounts.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account;
pub mod asset;
pub mod task;
pub mod template;

/// Write-time validation failure for model records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is blank after trim.
    BlankField(&'static str),
    /// A template declares no target asset class.
    NoAssetClasses,
    /// Lead time amount must be positive when set.
    ZeroLeadTime,
    /// An asset cannot be its own parent.
    SelfParent,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::NoAssetClasses => write!(f, "template must target at least one asset class"),
            Self::ZeroLeadTime => write!(f, "lead time amount must be positive"),
            Self::SelfParent => write!(f, "asset cannot be its own parent"),
        }
    }
}

impl Error for ValidationError {}

/// Normalizes a class/category tag to its canonical lowercase form.
pub fn normalize_tag(value: &str) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}
