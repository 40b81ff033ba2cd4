//! Lookahead input normalization.
//!
//! Callers pass raw month or day counts (query strings, CLI flags). Invalid
//! values fall back to the configured default and never produce errors.

use crate::schedule::projector::LookaheadMonths;

const DAYS_PER_MONTH: u64 = 30;

/// Picks the effective lookahead from raw inputs.
///
/// Rules, in order:
/// - positive integer `months` wins;
/// - else positive integer `days`, converted as `round(days / 30)`, min 1;
/// - else `default`.
pub fn resolve_lookahead(
    months: Option<&str>,
    days: Option<&str>,
    default: LookaheadMonths,
) -> LookaheadMonths {
    if let Some(months) = months.and_then(parse_positive) {
        if let Some(lookahead) = u32::try_from(months).ok().and_then(LookaheadMonths::new) {
            return lookahead;
        }
    }
    if let Some(days) = days.and_then(parse_positive) {
        return months_from_days(days);
    }
    default
}

/// Uses `requested` when it is a positive month count, else `default`.
pub fn lookahead_or_default(requested: Option<u32>, default: LookaheadMonths) -> LookaheadMonths {
    requested.and_then(LookaheadMonths::new).unwrap_or(default)
}

/// `round(days / 30)`, never below one month.
pub fn months_from_days(days: u64) -> LookaheadMonths {
    let rounded = days.saturating_add(DAYS_PER_MONTH / 2) / DAYS_PER_MONTH;
    let months = u32::try_from(rounded).unwrap_or(u32::MAX).max(1);
    LookaheadMonths::new(months).unwrap_or(LookaheadMonths::ONE)
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|value| *value > 0)
}
