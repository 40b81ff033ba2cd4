//! Occurrence projection.
//!
//! # Responsibility
//! - Compute the nearest upcoming due date per (asset, template).
//! - Decide whether that date falls inside the lookahead window.
//!
//! # Invariants
//! - Only the single nearest future occurrence is surfaced, never a backlog
//!   of missed intervals.
//! - Lead time never changes the due date.
//! - Projection is lazy, finite and restartable (`Projection: Clone`).

use crate::model::asset::{Asset, AssetId, BaselineSource};
use crate::model::task::DuePeriod;
use crate::model::template::{MaintenanceTemplate, TemplateId};
use crate::repo::store::RecordKind;
use crate::schedule::calendar::{add_months, next_due_on_or_after, subtract_lead_time};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;

/// Lookahead horizon in calendar months, always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LookaheadMonths(NonZeroU32);

impl LookaheadMonths {
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// `None` for zero.
    pub fn new(months: u32) -> Option<Self> {
        NonZeroU32::new(months).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Display for LookaheadMonths {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `[today, end]`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionWindow {
    pub today: NaiveDate,
    pub end: NaiveDate,
    pub lookahead: LookaheadMonths,
}

impl ProjectionWindow {
    /// Window end saturates at the last representable date.
    pub fn new(today: NaiveDate, lookahead: LookaheadMonths) -> Self {
        let end = i32::try_from(lookahead.get())
            .ok()
            .and_then(|months| add_months(today, months))
            .unwrap_or(NaiveDate::MAX);
        Self {
            today,
            end,
            lookahead,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.today <= date && date <= self.end
    }
}

/// A projected, not-yet-persisted due date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub asset_id: AssetId,
    pub template_id: TemplateId,
    pub title: String,
    pub due_on: NaiveDate,
    pub due_period: DuePeriod,
    pub visible_from: NaiveDate,
    pub interval_months: i32,
    pub baseline: NaiveDate,
    pub baseline_source: BaselineSource,
}

/// Non-fatal projection problem, reported in the run result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProjectionIssue {
    /// Interval is zero or negative.
    TemplateConfiguration {
        template_id: TemplateId,
        interval_months: i32,
    },
    /// Asset has no service, acquisition or creation date.
    MissingBaseline {
        asset_id: AssetId,
        template_id: TemplateId,
    },
    /// Date arithmetic left the representable calendar range.
    DateOverflow {
        asset_id: AssetId,
        template_id: TemplateId,
    },
    /// A stored row could not be decoded and was left out of the run.
    InvalidRecord { record: RecordKind, id: String },
}

impl ProjectionIssue {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateConfiguration { .. } => "template_configuration",
            Self::MissingBaseline { .. } => "missing_baseline",
            Self::DateOverflow { .. } => "date_overflow",
            Self::InvalidRecord { .. } => "invalid_record",
        }
    }
}

impl Display for ProjectionIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateConfiguration {
                template_id,
                interval_months,
            } => write!(
                f,
                "template {template_id} has non-positive interval {interval_months}"
            ),
            Self::MissingBaseline {
                asset_id,
                template_id,
            } => write!(
                f,
                "asset {asset_id} has no baseline date for template {template_id}"
            ),
            Self::DateOverflow {
                asset_id,
                template_id,
            } => write!(
                f,
                "due date for asset {asset_id} and template {template_id} overflows"
            ),
            Self::InvalidRecord { record, id } => {
                write!(f, "stored {} `{id}` could not be read", record.as_str())
            }
        }
    }
}

/// Result for one (asset, template) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionOutcome {
    Due(Occurrence),
    /// Next occurrence exists but lies after the window end.
    OutsideWindow {
        asset_id: AssetId,
        template_id: TemplateId,
        due_on: NaiveDate,
    },
    Issue(ProjectionIssue),
}

#[derive(Debug, Clone, Copy)]
pub struct OccurrenceProjector {
    window: ProjectionWindow,
}

impl OccurrenceProjector {
    pub fn new(window: ProjectionWindow) -> Self {
        Self { window }
    }

    /// Lazily projects `asset` against every template targeting its class.
    pub fn project<'a>(
        &self,
        asset: &'a Asset,
        templates: &'a [MaintenanceTemplate],
    ) -> Projection<'a> {
        Projection {
            window: self.window,
            asset,
            templates: templates.iter(),
        }
    }

    /// Projects one pair without checking class applicability.
    pub fn project_one(
        &self,
        asset: &Asset,
        template: &MaintenanceTemplate,
    ) -> ProjectionOutcome {
        project_pair(self.window, asset, template)
    }
}

/// Iterator over projection outcomes for one asset.
#[derive(Debug, Clone)]
pub struct Projection<'a> {
    window: ProjectionWindow,
    asset: &'a Asset,
    templates: std::slice::Iter<'a, MaintenanceTemplate>,
}

impl Iterator for Projection<'_> {
    type Item = ProjectionOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let asset = self.asset;
        let template = self
            .templates
            .by_ref()
            .find(|template| asset.matches_any_class(&template.asset_classes))?;
        Some(project_pair(self.window, asset, template))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.templates.size_hint().1)
    }
}

fn project_pair(
    window: ProjectionWindow,
    asset: &Asset,
    template: &MaintenanceTemplate,
) -> ProjectionOutcome {
    let Some(interval_months) = template.positive_interval() else {
        return ProjectionOutcome::Issue(ProjectionIssue::TemplateConfiguration {
            template_id: template.id,
            interval_months: template.interval_months,
        });
    };

    let Some((baseline, baseline_source)) = asset.baseline_for(&template.category) else {
        return ProjectionOutcome::Issue(ProjectionIssue::MissingBaseline {
            asset_id: asset.id,
            template_id: template.id,
        });
    };

    let overflow = ProjectionOutcome::Issue(ProjectionIssue::DateOverflow {
        asset_id: asset.id,
        template_id: template.id,
    });

    let Some(due_on) = next_due_on_or_after(baseline, interval_months, window.today) else {
        return overflow;
    };
    if !window.contains(due_on) {
        return ProjectionOutcome::OutsideWindow {
            asset_id: asset.id,
            template_id: template.id,
            due_on,
        };
    }

    let visible_from = match template.lead_time {
        Some(lead) => match subtract_lead_time(due_on, lead) {
            Some(date) => date,
            None => return overflow,
        },
        None => due_on,
    };

    ProjectionOutcome::Due(Occurrence {
        asset_id: asset.id,
        template_id: template.id,
        title: format!("{}: {}", asset.name.trim(), template.name.trim()),
        due_on,
        due_period: DuePeriod::from_due_date(due_on),
        visible_from,
        interval_months,
        baseline,
        baseline_source,
    })
}
