//! Tasks, their checklist steps, and the per-date instances kept for routines.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::id::{StepId, TaskId};
use crate::recurrence::RecurrenceRule;

/// Lifecycle bucket of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Captured but not triaged yet.
    Inbox,
    /// Triaged and available for planning.
    Pool,
    /// Finished.
    Complete,
    /// Put away without finishing.
    Archived,
}

impl TaskStatus {
    /// String representation used by the CLI and state files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Pool => "pool",
            Self::Complete => "complete",
            Self::Archived => "archived",
        }
    }
}

/// One checklist entry of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Identifier of the step.
    pub id: StepId,
    /// Human-readable text.
    pub text: String,
    /// Whether the step has been ticked off.
    pub completed: bool,
}

impl Step {
    /// Create an uncompleted step.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            text: text.into(),
            completed: false,
        }
    }

    /// Deep copy with a fresh identity and cleared completion.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        Self {
            id: StepId::new(),
            text: self.text.clone(),
            completed: false,
        }
    }
}

/// Per-date record of a recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Calendar day this instance belongs to.
    pub date: Date,
    /// Whether the occurrence was completed.
    pub completed: bool,
    /// When it was completed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Whether the occurrence was explicitly skipped.
    pub skipped: bool,
    /// Private copy of the template steps for this day.
    pub steps: Vec<Step>,
}

impl TaskInstance {
    /// Materialize an unresolved instance from template steps.
    #[must_use]
    pub fn from_template(date: Date, template: &[Step]) -> Self {
        Self {
            date,
            completed: false,
            completed_at: None,
            skipped: false,
            steps: template.iter().map(Step::fresh_copy).collect(),
        }
    }

    /// How this day was resolved.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        if self.completed {
            Resolution::Completed
        } else if self.skipped {
            Resolution::Skipped
        } else {
            Resolution::Unresolved
        }
    }
}

/// Outcome recorded for a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Marked complete.
    Completed,
    /// Explicitly skipped.
    Skipped,
    /// Nothing recorded yet.
    Unresolved,
}

/// A task as seen by the focus engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier of the task.
    pub id: TaskId,
    /// Human-readable title.
    pub title: String,
    /// Lifecycle bucket.
    pub status: TaskStatus,
    /// Ordered checklist (the template for recurring tasks).
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Whether the task repeats.
    #[serde(default)]
    pub is_recurring: bool,
    /// Recurrence rule (present when recurring).
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    /// Sparse per-date records, sorted by date, at most one per date.
    #[serde(default)]
    pub recurring_instances: Vec<TaskInstance>,
    /// Last computed current streak. Readers should derive it fresh.
    #[serde(default)]
    pub recurring_streak: u32,
    /// Best streak ever reached.
    #[serde(default)]
    pub recurring_best_streak: u32,
    /// Number of completed occurrences.
    #[serde(default)]
    pub recurring_total_completions: u32,
    /// Most recent completed occurrence.
    #[serde(default)]
    pub recurring_last_completed: Option<Date>,
    /// Next occurrence needing attention.
    #[serde(default)]
    pub recurring_next_due: Option<Date>,
    /// Soft-delete marker.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    /// Store-assigned revision, bumped on every patch.
    #[serde(default)]
    pub revision: u64,
}

impl Task {
    /// Create a one-off inbox task.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            status: TaskStatus::Inbox,
            steps: Vec::new(),
            is_recurring: false,
            recurrence: None,
            recurring_instances: Vec::new(),
            recurring_streak: 0,
            recurring_best_streak: 0,
            recurring_total_completions: 0,
            recurring_last_completed: None,
            recurring_next_due: None,
            deleted_at: None,
            revision: 0,
        }
    }

    /// Attach template steps.
    #[must_use]
    pub fn with_steps<I, T>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.steps = steps.into_iter().map(Step::new).collect();
        self
    }

    /// Turn the task into a routine following `rule`.
    #[must_use]
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.is_recurring = true;
        self.recurrence = Some(rule);
        self
    }

    /// Rule in effect, if the task is recurring.
    #[must_use]
    pub fn rule(&self) -> Option<&RecurrenceRule> {
        if self.is_recurring {
            self.recurrence.as_ref()
        } else {
            None
        }
    }

    /// Stored instance for `date`.
    #[must_use]
    pub fn instance(&self, date: Date) -> Option<&TaskInstance> {
        self.recurring_instances
            .binary_search_by_key(&date, |inst| inst.date)
            .ok()
            .map(|idx| &self.recurring_instances[idx])
    }

    /// Resolution of `date`, treating a missing instance as unresolved.
    #[must_use]
    pub fn resolution_on(&self, date: Date) -> Resolution {
        self.instance(date)
            .map_or(Resolution::Unresolved, TaskInstance::resolution)
    }

    /// Mutable instance for `date`, cloning template steps on first use.
    pub fn instance_mut(&mut self, date: Date) -> &mut TaskInstance {
        let idx = match self
            .recurring_instances
            .binary_search_by_key(&date, |inst| inst.date)
        {
            Ok(idx) => idx,
            Err(idx) => {
                let fresh = TaskInstance::from_template(date, &self.steps);
                self.recurring_instances.insert(idx, fresh);
                idx
            }
        };
        &mut self.recurring_instances[idx]
    }

    /// Restore date order in `recurring_instances` after loading. When a date
    /// appears twice the later record wins.
    pub fn normalize_instances(&mut self) {
        self.recurring_instances.sort_by_key(|inst| inst.date);
        self.recurring_instances.reverse();
        self.recurring_instances.dedup_by_key(|inst| inst.date);
        self.recurring_instances.reverse();
    }

    /// Whether the task was soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
