//! Error types for the focus engine.

use thiserror::Error;

use crate::id::QueueItemId;

/// Failure while parsing a textual day pattern.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternParseError {
    /// Weekday abbreviation not recognized.
    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),
    /// Weekly pattern without any day.
    #[error("weekly pattern needs at least one day")]
    NoWeekdays,
    /// Day of month outside `1..=31`.
    #[error("day of month out of range: {0}")]
    DayOfMonth(String),
    /// Interval that is zero or not a number.
    #[error("invalid day interval: {0}")]
    Interval(String),
    /// Input matches none of the known forms.
    #[error("unrecognized day pattern: {0}")]
    Unrecognized(String),
}

/// Rejection of a captured undo action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UndoError {
    /// Too many mutations happened after the action was captured.
    #[error("undo captured at version {recorded} is stale at version {current} (allowed {allowed} intervening)")]
    Stale {
        /// Queue version right after the original mutation.
        recorded: u64,
        /// Current queue version.
        current: u64,
        /// Intervening mutations tolerated by policy.
        allowed: u64,
    },
}

/// Broken queue invariant, reported by [`FocusQueue::check_invariants`](crate::queue::FocusQueue::check_invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Active orders are not exactly `0..n`.
    #[error("active orders are not dense: {0:?}")]
    SparseOrder(Vec<usize>),
    /// The line lies beyond the active items.
    #[error("today line {line} exceeds {count} active items")]
    LineOutOfRange {
        /// Current line index.
        line: usize,
        /// Number of active items.
        count: usize,
    },
    /// An item's selection does not fit its side of the line.
    #[error("item {0} has a selection that does not match its side of the line")]
    SelectionSide(QueueItemId),
    /// More than one active item references the same task.
    #[error("task is queued more than once via item {0}")]
    DuplicateTask(QueueItemId),
}
