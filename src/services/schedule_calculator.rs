//! Recurrence date calculation.
//!
//! Pure functions mapping a `ScheduleConfig` and an anchor date to the next
//! due date. No I/O and no reading of the wall clock: "today" is always
//! passed in by the caller.
//!
//! A `None` result is the non-fatal "nothing to schedule" signal. It is
//! returned for malformed configs (logged as a warning), for
//! `variable_interval` without a completion anchor, and when a calendar
//! search runs past its month cap.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use tracing::warn;

use crate::domain::models::{IntervalUnit, Ordinal, ScheduleConfig};

/// Default bound on month-by-month scans (10 years).
pub const DEFAULT_MAX_SEARCH_MONTHS: u32 = 120;

/// Calculates due dates from schedule configurations.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleCalculator {
    max_search_months: u32,
}

impl Default for ScheduleCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEARCH_MONTHS)
    }
}

impl ScheduleCalculator {
    /// Create a calculator whose calendar scans stop after `max_search_months`.
    pub fn new(max_search_months: u32) -> Self {
        Self {
            max_search_months: max_search_months.max(1),
        }
    }

    /// Next due date after `anchor`.
    ///
    /// For every kind except `variable_interval` the anchor is the previously
    /// scheduled due date and defaults to `today` when there is none. For
    /// `variable_interval` the anchor must be the last completion/skip date;
    /// without one there is no next date.
    pub fn next_due_date(
        &self,
        config: &ScheduleConfig,
        anchor: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        match config {
            ScheduleConfig::Once { due_date, .. } => once_date(*due_date),
            ScheduleConfig::FixedInterval { interval, unit, .. } => {
                add_interval(anchor.unwrap_or(today), *interval, *unit)
            }
            ScheduleConfig::SpecificDaysOfWeek { days, .. } => {
                next_matching_weekday(days, anchor.unwrap_or(today))
            }
            ScheduleConfig::SpecificDayOfMonth { day_of_month, .. } => {
                let anchor = anchor.unwrap_or(today);
                self.scan_months(anchor, 1, |year, month| {
                    day_in_month(year, month, *day_of_month)
                })
                .or_else(|| log_exhausted(config))
            }
            ScheduleConfig::SpecificWeekdayOfMonth { weekday, occurrence, .. } => {
                let anchor = anchor.unwrap_or(today);
                self.scan_months(anchor, 1, |year, month| {
                    nth_weekday_of_month(year, month, *weekday, *occurrence)
                })
                .or_else(|| log_exhausted(config))
            }
            ScheduleConfig::VariableInterval { interval, unit, .. } => {
                anchor.and_then(|completed| add_interval(completed, *interval, *unit))
            }
        }
    }

    /// First due date of a schedule that has no occurrences yet: the first
    /// date on or after `start` satisfying the rule.
    ///
    /// Interval kinds start on `start` itself; `variable_interval` is
    /// seeded there too since there is no completion to anchor from.
    pub fn first_due_date(&self, config: &ScheduleConfig, start: NaiveDate) -> Option<NaiveDate> {
        match config {
            ScheduleConfig::Once { due_date, .. } => once_date(*due_date),
            ScheduleConfig::FixedInterval { interval, .. }
            | ScheduleConfig::VariableInterval { interval, .. } => {
                if *interval == 0 {
                    warn!(kind = config.as_str(), "Interval must be positive; no date scheduled");
                    None
                } else {
                    Some(start)
                }
            }
            ScheduleConfig::SpecificDaysOfWeek { days, .. } => {
                next_matching_weekday(days, start.pred_opt()?)
            }
            ScheduleConfig::SpecificDayOfMonth { day_of_month, .. } => self
                .scan_months(start, 0, |year, month| {
                    day_in_month(year, month, *day_of_month).filter(|d| *d >= start)
                })
                .or_else(|| log_exhausted(config)),
            ScheduleConfig::SpecificWeekdayOfMonth { weekday, occurrence, .. } => self
                .scan_months(start, 0, |year, month| {
                    nth_weekday_of_month(year, month, *weekday, *occurrence).filter(|d| *d >= start)
                })
                .or_else(|| log_exhausted(config)),
        }
    }

    /// Try months `anchor's month + first_offset ..` in order, bounded by
    /// `max_search_months` attempts.
    fn scan_months<F>(&self, anchor: NaiveDate, first_offset: u32, mut pick: F) -> Option<NaiveDate>
    where
        F: FnMut(i32, u32) -> Option<NaiveDate>,
    {
        (first_offset..first_offset + self.max_search_months).find_map(|offset| {
            let (year, month) = shift_month(anchor, offset)?;
            pick(year, month)
        })
    }
}

/// Next due date using the default search bound.
pub fn next_due_date(
    config: &ScheduleConfig,
    anchor: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    ScheduleCalculator::default().next_due_date(config, anchor, today)
}

/// First due date using the default search bound.
pub fn first_due_date(config: &ScheduleConfig, start: NaiveDate) -> Option<NaiveDate> {
    ScheduleCalculator::default().first_due_date(config, start)
}

fn once_date(due_date: Option<NaiveDate>) -> Option<NaiveDate> {
    if due_date.is_none() {
        warn!("Invalid or missing due date for schedule type 'once'; no date scheduled");
    }
    due_date
}

fn log_exhausted(config: &ScheduleConfig) -> Option<NaiveDate> {
    warn!(
        kind = config.as_str(),
        schedule = %config.description(),
        "No matching date found within the calendar search bound"
    );
    None
}

/// Advance a date by `interval` units. Month and year steps keep the day
/// number where the target month has it and otherwise land on that month's
/// last day (Jan 31 + 1 month = Feb 28/29).
pub fn add_interval(date: NaiveDate, interval: u32, unit: IntervalUnit) -> Option<NaiveDate> {
    if interval == 0 {
        warn!("Interval must be positive; no date scheduled");
        return None;
    }
    match unit {
        IntervalUnit::Day => date.checked_add_days(Days::new(u64::from(interval))),
        IntervalUnit::Week => date.checked_add_days(Days::new(u64::from(interval) * 7)),
        IntervalUnit::Month => date.checked_add_months(Months::new(interval)),
        IntervalUnit::Year => date.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

/// Earliest date strictly after `anchor` whose weekday is in `days`.
fn next_matching_weekday(days: &[Weekday], anchor: NaiveDate) -> Option<NaiveDate> {
    if days.is_empty() {
        warn!("No weekdays configured for schedule type 'specific_days_of_week'");
        return None;
    }
    anchor
        .iter_days()
        .skip(1)
        .take(7)
        .find(|date| days.contains(&date.weekday()))
}

/// (year, month) of the month `offset` months after `date`'s month.
fn shift_month(date: NaiveDate, offset: u32) -> Option<(i32, u32)> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + i64::from(offset);
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

/// The exact `day` of a month, or `None` if the month is too short.
fn day_in_month(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Number of days in a month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
        .unwrap_or(28)
}

/// All dates in a month falling on `weekday`, in order.
pub fn weekdays_in_month(year: i32, month: u32, weekday: Weekday) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    (1 + offset..=days_in_month(year, month))
        .step_by(7)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .collect()
}

/// The ordinal occurrence of `weekday` in a month, if the month has one.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, ordinal: Ordinal) -> Option<NaiveDate> {
    let matches = weekdays_in_month(year, month, weekday);
    match ordinal.index() {
        Some(index) => matches.get(index).copied(),
        None => matches.last().copied(),
    }
}
