//! Recurrence schedule domain model.
//!
//! A `ScheduleConfig` is the declarative description of when a chore is due.
//! It is a closed set of recurrence kinds; every consumer matches on all of
//! them. Each kind carries an `EndCondition` that stops the recurrence.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Calendar unit used by interval-based recurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().trim_end_matches('s') {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Which occurrence of a weekday within a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordinal {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

impl Ordinal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
            Self::Fourth => "fourth",
            Self::Last => "last",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first" | "1st" | "1" => Some(Self::First),
            "second" | "2nd" | "2" => Some(Self::Second),
            "third" | "3rd" | "3" => Some(Self::Third),
            "fourth" | "4th" | "4" => Some(Self::Fourth),
            "last" => Some(Self::Last),
            _ => None,
        }
    }

    /// Zero-based index into the month's matching dates, `None` for `Last`.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::First => Some(0),
            Self::Second => Some(1),
            Self::Third => Some(2),
            Self::Fourth => Some(3),
            Self::Last => None,
        }
    }

    fn short(&self) -> &'static str {
        match self {
            Self::First => "1st",
            Self::Second => "2nd",
            Self::Third => "3rd",
            Self::Fourth => "4th",
            Self::Last => "last",
        }
    }
}

/// Rule that stops a recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndCondition {
    /// Recur forever.
    #[default]
    Never,
    /// Stop once this many occurrences have been generated in total.
    Times { times: u32 },
    /// Stop before the first due date on or after `date`.
    ///
    /// A missing or unparseable date is kept as `None` and treated as
    /// non-ending.
    Date {
        #[serde(default, deserialize_with = "lenient_date")]
        date: Option<NaiveDate>,
    },
}

/// Declarative recurrence description, one variant per recurrence kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleConfig {
    /// A single due date, no recurrence.
    Once {
        #[serde(default, deserialize_with = "lenient_date")]
        due_date: Option<NaiveDate>,
        #[serde(default)]
        end_condition: EndCondition,
    },
    /// Next date = previous due date + interval units.
    FixedInterval {
        interval: u32,
        unit: IntervalUnit,
        #[serde(default)]
        end_condition: EndCondition,
    },
    /// Next date = earliest later date falling on one of `days`.
    SpecificDaysOfWeek {
        #[serde(with = "weekday_set")]
        days: Vec<Weekday>,
        #[serde(default)]
        end_condition: EndCondition,
    },
    /// A fixed day number in each month that has it.
    SpecificDayOfMonth {
        day_of_month: u32,
        #[serde(default)]
        end_condition: EndCondition,
    },
    /// The nth (or last) given weekday of each month.
    SpecificWeekdayOfMonth {
        #[serde(with = "weekday_name")]
        weekday: Weekday,
        occurrence: Ordinal,
        #[serde(default)]
        end_condition: EndCondition,
    },
    /// Next date = last completion/skip + interval units.
    VariableInterval {
        interval: u32,
        unit: IntervalUnit,
        #[serde(default)]
        end_condition: EndCondition,
    },
}

impl ScheduleConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once { .. } => "once",
            Self::FixedInterval { .. } => "fixed_interval",
            Self::SpecificDaysOfWeek { .. } => "specific_days_of_week",
            Self::SpecificDayOfMonth { .. } => "specific_day_of_month",
            Self::SpecificWeekdayOfMonth { .. } => "specific_weekday_of_month",
            Self::VariableInterval { .. } => "variable_interval",
        }
    }

    pub fn end_condition(&self) -> &EndCondition {
        match self {
            Self::Once { end_condition, .. }
            | Self::FixedInterval { end_condition, .. }
            | Self::SpecificDaysOfWeek { end_condition, .. }
            | Self::SpecificDayOfMonth { end_condition, .. }
            | Self::SpecificWeekdayOfMonth { end_condition, .. }
            | Self::VariableInterval { end_condition, .. } => end_condition,
        }
    }

    pub fn with_end_condition(mut self, condition: EndCondition) -> Self {
        match &mut self {
            Self::Once { end_condition, .. }
            | Self::FixedInterval { end_condition, .. }
            | Self::SpecificDaysOfWeek { end_condition, .. }
            | Self::SpecificDayOfMonth { end_condition, .. }
            | Self::SpecificWeekdayOfMonth { end_condition, .. }
            | Self::VariableInterval { end_condition, .. } => *end_condition = condition,
        }
        self
    }

    pub fn is_once(&self) -> bool {
        matches!(self, Self::Once { .. })
    }

    /// Whether the anchor is the last completion/skip rather than the last due date.
    pub fn anchors_on_completion(&self) -> bool {
        matches!(self, Self::VariableInterval { .. })
    }

    /// Human-readable description of the schedule.
    pub fn description(&self) -> String {
        let base = match self {
            Self::Once { due_date: Some(date), .. } => format!("once on {}", date),
            Self::Once { due_date: None, .. } => "once (no date)".to_string(),
            Self::FixedInterval { interval, unit, .. } => every(*interval, *unit),
            Self::SpecificDaysOfWeek { days, .. } => {
                let names: Vec<&str> = days.iter().map(|d| weekday_name::name(*d)).collect();
                format!("every {}", names.join(", "))
            }
            Self::SpecificDayOfMonth { day_of_month, .. } => {
                format!("day {} of each month", day_of_month)
            }
            Self::SpecificWeekdayOfMonth { weekday, occurrence, .. } => format!(
                "{} {} of each month",
                occurrence.short(),
                weekday_name::name(*weekday)
            ),
            Self::VariableInterval { interval, unit, .. } => {
                format!("{} after last completion", every(*interval, *unit))
            }
        };

        match self.end_condition() {
            EndCondition::Never => base,
            EndCondition::Times { times } => format!("{}, {} time(s)", base, times),
            EndCondition::Date { date: Some(date) } => format!("{}, until {}", base, date),
            EndCondition::Date { date: None } => base,
        }
    }

    /// Data-quality issues that make the calculator return no date or the
    /// end condition be ignored. Empty when the config is well-formed.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        match self {
            Self::Once { due_date, .. } => {
                if due_date.is_none() {
                    issues.push("once schedule has no valid due date".to_string());
                }
            }
            Self::FixedInterval { interval, .. } | Self::VariableInterval { interval, .. } => {
                if *interval == 0 {
                    issues.push("interval must be a positive integer".to_string());
                }
            }
            Self::SpecificDaysOfWeek { days, .. } => {
                if days.is_empty() {
                    issues.push("at least one weekday is required".to_string());
                }
            }
            Self::SpecificDayOfMonth { day_of_month, .. } => {
                if !(1..=31).contains(day_of_month) {
                    issues.push(format!("day of month {} is outside 1..=31", day_of_month));
                }
            }
            Self::SpecificWeekdayOfMonth { .. } => {}
        }

        match self.end_condition() {
            EndCondition::Times { times: 0 } => {
                issues.push("end condition 'times' must be at least 1".to_string());
            }
            EndCondition::Date { date: None } => {
                issues.push("end condition 'date' has no valid date".to_string());
            }
            _ => {}
        }

        issues
    }
}

fn every(interval: u32, unit: IntervalUnit) -> String {
    if interval == 1 {
        format!("every {}", unit.as_str())
    } else {
        format!("every {} {}s", interval, unit.as_str())
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; anything else becomes `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_date))
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

/// Weekday (de)serialization: lowercase names out; names or 0..=6 (0 = Sunday) in.
pub mod weekday_name {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn name(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "monday",
            Weekday::Tue => "tuesday",
            Weekday::Wed => "wednesday",
            Weekday::Thu => "thursday",
            Weekday::Fri => "friday",
            Weekday::Sat => "saturday",
            Weekday::Sun => "sunday",
        }
    }

    /// Weekday for `0..=6` with 0 = Sunday.
    pub fn from_index(index: u64) -> Option<Weekday> {
        match index {
            0 => Some(Weekday::Sun),
            1 => Some(Weekday::Mon),
            2 => Some(Weekday::Tue),
            3 => Some(Weekday::Wed),
            4 => Some(Weekday::Thu),
            5 => Some(Weekday::Fri),
            6 => Some(Weekday::Sat),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Weekday> {
        match s.trim().parse::<u64>() {
            Ok(index) => from_index(index),
            Err(_) => s.trim().parse::<Weekday>().ok(),
        }
    }

    pub(super) fn from_value<E: serde::de::Error>(value: &serde_json::Value) -> Result<Weekday, E> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(from_index)
                .ok_or_else(|| E::custom(format!("weekday index out of range: {}", n))),
            serde_json::Value::String(s) => {
                parse(s).ok_or_else(|| E::custom(format!("unknown weekday: {}", s)))
            }
            other => Err(E::custom(format!("invalid weekday: {}", other))),
        }
    }

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        from_value::<D::Error>(&value)
    }
}

/// Set of weekdays, sorted Monday-first and deduplicated on the way in.
mod weekday_set {
    use super::{weekday_name, Deserialize, Deserializer, Serializer, Weekday};
    use serde::ser::SerializeSeq;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(days: &Vec<Weekday>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(days.len()))?;
        for day in days {
            seq.serialize_element(weekday_name::name(*day))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Weekday>, D::Error> {
        let values: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
        let mut days = values
            .iter()
            .map(weekday_name::from_value::<D::Error>)
            .collect::<Result<Vec<_>, _>>()?;
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        Ok(days)
    }
}
