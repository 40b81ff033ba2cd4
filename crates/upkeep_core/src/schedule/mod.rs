//! Maintenance scheduling stages.
//!
//! # Responsibility
//! - Resolve templates applicable to an account's assets.
//! - Project the nearest upcoming occurrence per (asset, template).
//! - Materialize occurrences into Pending tasks without duplication.
//!
//! # Invariants
//! - Only store unavailability and unknown accounts abort a run; every
//!   per-asset or per-template problem is reported and skipped.
//! - The scheduler creates tasks only. It never updates or deletes them.

use crate::model::account::AccountId;
use crate::repo::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod calendar;
pub mod lock;
pub mod materializer;
pub mod projector;
pub mod resolver;

/// Fatal scheduler failures. Everything else lands in the run result.
#[derive(Debug)]
pub enum SchedulerError {
    AccountNotFound(AccountId),
    /// Store failed mid-run. Retrying the whole run is safe.
    StoreUnavailable(StoreError),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::StoreUnavailable(err) => write!(f, "maintenance store unavailable: {err}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AccountNotFound(_) => None,
            Self::StoreUnavailable(err) => Some(err),
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

impl SchedulerError {
    /// Stable error code for logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "account_not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
