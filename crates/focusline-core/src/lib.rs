//! Pure domain logic for focusline: the focus queue and the recurring-task
//! engine.
//!
//! Nothing in this crate performs I/O or reads the clock implicitly. Every
//! operation takes the current state plus its arguments and returns the next
//! state, so hosts decide where snapshots live and when they are persisted.

/// Serializable queue commands.
pub mod command;
/// Error types.
pub mod error;
/// Identifier types.
pub mod id;
/// Streaks and routine resolution.
pub mod ledger;
/// Focus queue ordering engine.
pub mod queue;
/// Recurrence rules and day projection.
pub mod recurrence;
/// Tasks, steps and per-day instances.
pub mod task;

pub use command::QueueCommand;
pub use error::{InvariantViolation, PatternParseError, UndoError};
pub use id::{QueueItemId, StepId, TaskId};
pub use ledger::{Ledger, StreakPolicy, calculate_streak, longest_streak};
pub use queue::{FocusQueue, FocusQueueItem, Inverse, Mutation, StepSelection, UndoAction, UndoPolicy};
pub use recurrence::{
    DayPattern, DayProjection, OccurrenceStatus, RecurrenceRule, active_occurrence_date, next_due,
    next_occurrence, project_range, status_on,
};
pub use task::{Resolution, Step, Task, TaskInstance, TaskStatus};
