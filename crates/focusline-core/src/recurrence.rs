//! Recurrence rules and the per-day status projection.
//!
//! Everything here is pure: callers pass `today` explicitly so that the same
//! inputs always project the same calendar.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::error::PatternParseError;
use crate::task::{Resolution, Task, TaskInstance};

/// Upper bound for forward scans, so a pattern that never fires terminates.
const SCAN_HORIZON_DAYS: u32 = 5 * 366;

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Which calendar days a rule selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayPattern {
    /// Every day.
    Daily,
    /// Every `interval` days counted from the rule's start date.
    EveryNDays {
        /// Days between occurrences.
        interval: u32,
    },
    /// Specific weekdays (0 = Monday .. 6 = Sunday).
    Weekly {
        /// Selected weekdays.
        days: BTreeSet<u8>,
    },
    /// A day of the month, clamped to the last day of shorter months.
    MonthDay {
        /// Day of month (1..=31).
        day: u8,
    },
}

impl DayPattern {
    /// Monday through Friday.
    #[must_use]
    pub fn weekdays() -> Self {
        Self::Weekly {
            days: (0..5).collect(),
        }
    }

    /// Whether the pattern selects `date` for a rule anchored at `anchor`.
    #[must_use]
    pub fn matches(&self, anchor: Date, date: Date) -> bool {
        match self {
            Self::Daily => true,
            Self::EveryNDays { interval } => {
                let elapsed = (date - anchor).whole_days();
                *interval > 0 && elapsed >= 0 && elapsed % i64::from(*interval) == 0
            }
            Self::Weekly { days } => days.contains(&date.weekday().number_days_from_monday()),
            Self::MonthDay { day } => {
                let current = date.day();
                if current == *day {
                    return true;
                }
                let last_of_month = date
                    .next_day()
                    .is_none_or(|next| next.month() != date.month());
                last_of_month && current < *day
            }
        }
    }
}

impl fmt::Display for DayPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::EveryNDays { interval } => write!(f, "every:{interval}d"),
            Self::Weekly { days } => {
                let names: Vec<&str> = days
                    .iter()
                    .filter_map(|d| WEEKDAY_NAMES.get(usize::from(*d)).copied())
                    .collect();
                write!(f, "weekly:{}", names.join(","))
            }
            Self::MonthDay { day } => write!(f, "monthly:{day}"),
        }
    }
}

impl FromStr for DayPattern {
    type Err = PatternParseError;

    /// Accepts `daily`, `weekdays`, `weekly:mon,wed`, `every:3d` and `monthly:15`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "daily" => return Ok(Self::Daily),
            "weekdays" => return Ok(Self::weekdays()),
            _ => {}
        }
        if let Some(rest) = lower.strip_prefix("weekly:") {
            let days = rest
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(|d| {
                    WEEKDAY_NAMES
                        .iter()
                        .position(|name| *name == d)
                        .and_then(|idx| u8::try_from(idx).ok())
                        .ok_or_else(|| PatternParseError::UnknownWeekday(d.to_owned()))
                })
                .collect::<Result<BTreeSet<u8>, _>>()?;
            if days.is_empty() {
                return Err(PatternParseError::NoWeekdays);
            }
            return Ok(Self::Weekly { days });
        }
        if let Some(rest) = lower.strip_prefix("every:") {
            let rest = rest.trim();
            let digits = rest.strip_suffix('d').unwrap_or(rest);
            let interval: u32 = digits
                .parse()
                .map_err(|_| PatternParseError::Interval(digits.to_owned()))?;
            if interval == 0 {
                return Err(PatternParseError::Interval(digits.to_owned()));
            }
            return Ok(Self::EveryNDays { interval });
        }
        if let Some(rest) = lower.strip_prefix("monthly:") {
            let rest = rest.trim();
            let day: u8 = rest
                .parse()
                .map_err(|_| PatternParseError::DayOfMonth(rest.to_owned()))?;
            if !(1..=31).contains(&day) {
                return Err(PatternParseError::DayOfMonth(rest.to_owned()));
            }
            return Ok(Self::MonthDay { day });
        }
        Err(PatternParseError::Unrecognized(s.to_owned()))
    }
}

/// When and how a routine repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// First day the routine can occur.
    pub start_date: Date,
    /// Day-matching pattern.
    pub pattern: DayPattern,
    /// Missed-occurrence policy: keep missed days actionable (`true`) or let them lapse.
    #[serde(default)]
    pub rollover_if_missed: bool,
    /// Last day the routine can occur.
    #[serde(default)]
    pub end_date: Option<Date>,
}

impl RecurrenceRule {
    /// Rule with the lapse policy and no end date.
    #[must_use]
    pub const fn new(start_date: Date, pattern: DayPattern) -> Self {
        Self {
            start_date,
            pattern,
            rollover_if_missed: false,
            end_date: None,
        }
    }

    /// Switch to the rollover policy.
    #[must_use]
    pub const fn rolling_over(mut self) -> Self {
        self.rollover_if_missed = true;
        self
    }

    /// Stop occurring after `end`.
    #[must_use]
    pub const fn ending(mut self, end: Date) -> Self {
        self.end_date = Some(end);
        self
    }

    /// Whether the routine occurs on `date`.
    #[must_use]
    pub fn occurs_on(&self, date: Date) -> bool {
        date >= self.start_date
            && self.end_date.is_none_or(|end| date <= end)
            && self.pattern.matches(self.start_date, date)
    }

    /// First occurrence strictly after `from`, if any.
    #[must_use]
    pub fn next_occurrence(&self, from: Date) -> Option<Date> {
        if let DayPattern::EveryNDays { interval } = &self.pattern {
            return self.next_interval_occurrence(from, *interval);
        }
        let mut cursor = from;
        for _ in 0..SCAN_HORIZON_DAYS {
            cursor = cursor.next_day()?;
            if cursor < self.start_date {
                // Jump straight to the start date instead of walking towards it.
                cursor = self.start_date.previous_day().unwrap_or(self.start_date);
                continue;
            }
            if self.end_date.is_some_and(|end| cursor > end) {
                return None;
            }
            if self.pattern.matches(self.start_date, cursor) {
                return Some(cursor);
            }
        }
        None
    }

    /// Next multiple of `interval` days after `from`, counted from the start date.
    fn next_interval_occurrence(&self, from: Date, interval: u32) -> Option<Date> {
        if interval == 0 {
            return None;
        }
        let first = from.next_day()?.max(self.start_date);
        let step = i64::from(interval);
        let elapsed = (first - self.start_date).whole_days();
        let candidate = first.checked_add(Duration::days((step - elapsed % step) % step))?;
        self.end_date
            .is_none_or(|end| candidate <= end)
            .then_some(candidate)
    }
}

/// Derived status of one calendar day for a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// The rule does not select this day.
    NoOccurrence,
    /// Resolved as done.
    Completed,
    /// Resolved as skipped.
    Skipped,
    /// Due today and unresolved.
    Today,
    /// Past, unresolved, still actionable (rollover policy).
    Overdue,
    /// Past, unresolved, lapsed (skip policy).
    Missed,
    /// In the future.
    Pending,
}

/// One day of a projected calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayProjection<'a> {
    /// Calendar day.
    pub date: Date,
    /// Derived status.
    pub status: OccurrenceStatus,
    /// Stored instance, when one exists.
    pub instance: Option<&'a TaskInstance>,
}

/// Status of a single day.
#[must_use]
pub fn status_on(task: &Task, date: Date, today: Date) -> OccurrenceStatus {
    let Some(rule) = task.rule() else {
        return OccurrenceStatus::NoOccurrence;
    };
    if !rule.occurs_on(date) {
        return OccurrenceStatus::NoOccurrence;
    }
    match task.resolution_on(date) {
        Resolution::Completed => OccurrenceStatus::Completed,
        Resolution::Skipped => OccurrenceStatus::Skipped,
        Resolution::Unresolved if date == today => OccurrenceStatus::Today,
        Resolution::Unresolved if date < today => {
            if rule.rollover_if_missed {
                OccurrenceStatus::Overdue
            } else {
                OccurrenceStatus::Missed
            }
        }
        Resolution::Unresolved => OccurrenceStatus::Pending,
    }
}

/// Project one entry per calendar day in `[start, end]`.
///
/// Returns an empty list when `start > end`.
#[must_use]
pub fn project_range(task: &Task, start: Date, end: Date, today: Date) -> Vec<DayProjection<'_>> {
    let mut days = Vec::new();
    let mut cursor = Some(start);
    while let Some(date) = cursor.filter(|d| *d <= end) {
        days.push(DayProjection {
            date,
            status: status_on(task, date, today),
            instance: task.instance(date),
        });
        cursor = date.next_day();
    }
    days
}

/// First occurrence after `from`. `None` is a valid terminal answer.
#[must_use]
pub fn next_occurrence(rule: &RecurrenceRule, from: Date) -> Option<Date> {
    rule.next_occurrence(from)
}

/// The date a pending routine action should be attributed to.
///
/// Rollover tasks answer with the oldest unresolved occurrence up to today;
/// lapse tasks only ever answer with today.
#[must_use]
pub fn active_occurrence_date(task: &Task, today: Date) -> Option<Date> {
    let rule = task.rule()?;
    if !rule.rollover_if_missed {
        return (rule.occurs_on(today) && task.resolution_on(today) == Resolution::Unresolved)
            .then_some(today);
    }
    let mut cursor = Some(rule.start_date);
    while let Some(date) = cursor.filter(|d| *d <= today) {
        if rule.end_date.is_some_and(|end| date > end) {
            break;
        }
        if rule.occurs_on(date) && task.resolution_on(date) == Resolution::Unresolved {
            return Some(date);
        }
        cursor = date.next_day();
    }
    None
}

/// Next date that needs attention: the active occurrence, else the next one after today.
#[must_use]
pub fn next_due(task: &Task, today: Date) -> Option<Date> {
    let rule = task.rule()?;
    active_occurrence_date(task, today).or_else(|| rule.next_occurrence(today))
}

/// Iterate every day in `[start, end]`.
pub(crate) fn days_between(start: Date, end: Date) -> impl Iterator<Item = Date> {
    let span = (end - start).whole_days();
    (0..=span.max(-1)).filter_map(move |offset| start.checked_add(Duration::days(offset)))
}
