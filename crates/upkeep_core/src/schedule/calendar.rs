//! Calendar-aware month arithmetic.
//!
//! All recurrence math goes through these helpers so intervals never drift
//! with month length or leap years. Adding months clamps to the last day of
//! the target month (Jan 31 + 1 month = Feb 28 or Feb 29).

use crate::model::template::{LeadTime, LeadTimeUnit};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Adds a signed number of calendar months. `None` on date overflow.
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let magnitude = Months::new(months.unsigned_abs());
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// Whole calendar months from `from` to `to`.
///
/// The largest `m` with `add_months(from, m) <= to`; zero when `to` is not
/// after `from`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    if to <= from {
        return 0;
    }
    let raw = (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32);
    match add_months(from, raw) {
        Some(candidate) if candidate <= to => raw,
        _ => raw - 1,
    }
}

/// First day a task with `lead` should be shown for `due_on`.
pub fn subtract_lead_time(due_on: NaiveDate, lead: LeadTime) -> Option<NaiveDate> {
    match lead.unit {
        LeadTimeUnit::Days => due_on.checked_sub_days(Days::new(u64::from(lead.amount))),
        LeadTimeUnit::Months => due_on.checked_sub_months(Months::new(lead.amount)),
    }
}

/// Smallest `baseline + k * interval` (k >= 1) that is on or after `today`.
///
/// `interval_months` must be positive.
pub fn next_due_on_or_after(
    baseline: NaiveDate,
    interval_months: i32,
    today: NaiveDate,
) -> Option<NaiveDate> {
    debug_assert!(interval_months > 0);
    let first = add_months(baseline, interval_months)?;
    if first >= today {
        return Some(first);
    }

    // Each step is computed from the baseline, not from the previous step,
    // so month-end clamping does not accumulate.
    let steps = months_between(baseline, today) / interval_months;
    let candidate = add_months(baseline, steps.checked_mul(interval_months)?)?;
    if candidate >= today {
        return Some(candidate);
    }
    add_months(baseline, steps.checked_add(1)?.checked_mul(interval_months)?)
}

#[cfg(test)]
mod tests {
    use super::{add_months, months_between, next_due_on_or_after, subtract_lead_time};
    use crate::model::template::{LeadTime, LeadTimeUnit};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adding_one_month_to_january_31_clamps_to_february_end() {
        assert_eq!(add_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months(date(2024, 1, 31), 13), Some(date(2025, 2, 28)));
    }

    #[test]
    fn negative_months_subtract_with_clamping() {
        assert_eq!(add_months(date(2024, 3, 31), -1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2024, 1, 15), -12), Some(date(2023, 1, 15)));
    }

    #[test]
    fn leap_day_rolls_to_february_28() {
        assert_eq!(add_months(date(2024, 2, 29), 12), Some(date(2025, 2, 28)));
        assert_eq!(add_months(date(2024, 2, 29), 48), Some(date(2028, 2, 29)));
    }

    #[test]
    fn months_between_counts_whole_months_only() {
        assert_eq!(months_between(date(2024, 1, 15), date(2024, 7, 14)), 5);
        assert_eq!(months_between(date(2024, 1, 15), date(2024, 7, 15)), 6);
        assert_eq!(months_between(date(2024, 1, 31), date(2024, 2, 29)), 1);
        assert_eq!(months_between(date(2024, 7, 1), date(2024, 1, 1)), 0);
    }

    #[test]
    fn next_due_finds_nearest_upcoming_occurrence() {
        let baseline = date(2024, 1, 15);
        assert_eq!(
            next_due_on_or_after(baseline, 6, date(2024, 7, 1)),
            Some(date(2024, 7, 15))
        );
        assert_eq!(
            next_due_on_or_after(baseline, 6, date(2024, 7, 15)),
            Some(date(2024, 7, 15))
        );
        assert_eq!(
            next_due_on_or_after(baseline, 6, date(2024, 7, 16)),
            Some(date(2025, 1, 15))
        );
        assert_eq!(
            next_due_on_or_after(baseline, 3, date(2030, 2, 1)),
            Some(date(2030, 4, 15))
        );
    }

    #[test]
    fn next_due_does_not_drift_at_month_end() {
        // Jan 31 + 2 months = Mar 31, not Mar 29 via Feb 29.
        assert_eq!(
            next_due_on_or_after(date(2024, 1, 31), 1, date(2024, 3, 1)),
            Some(date(2024, 3, 31))
        );
    }

    #[test]
    fn lead_time_moves_visibility_earlier() {
        let due = date(2024, 7, 15);
        let days = LeadTime {
            amount: 14,
            unit: LeadTimeUnit::Days,
        };
        let months = LeadTime {
            amount: 1,
            unit: LeadTimeUnit::Months,
        };
        assert_eq!(subtract_lead_time(due, days), Some(date(2024, 7, 1)));
        assert_eq!(subtract_lead_time(due, months), Some(date(2024, 6, 15)));
    }
}
