//! Focus service: the single writer that owns the queue snapshot and drives
//! task updates, reminders and undo toasts around each mutation.

use focusline_core::recurrence::{active_occurrence_date, project_range};
use focusline_core::{
    FocusQueue, Ledger, OccurrenceStatus, QueueCommand, QueueItemId, RecurrenceRule, Resolution,
    StepSelection, Task, TaskId, TaskStatus, UndoAction,
};
use time::Date;
use tracing::{debug, info, warn};

use crate::collaborators::{
    Clock, NoopScheduler, NotificationScheduler, SystemClock, Toast, ToastAction, TracingPresenter,
    UndoPresenter,
};
use crate::config::FocusConfig;
use crate::store::TaskStore;
use crate::task_patch::TaskPatch;
use crate::undo::{TaskRestore, UndoHistory, UndoToken};

/// Errors surfaced by [`FocusService`].
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// Routine operation on a one-off task.
    #[error("task {0} is not a recurring task")]
    NotRecurring(TaskId),
    /// Step index outside the day's checklist.
    #[error("task {task} has no step #{index} on {date}")]
    MissingStep {
        /// Target task.
        task: TaskId,
        /// Day whose checklist was addressed.
        date: Date,
        /// Requested position.
        index: usize,
    },
    /// Backing store returned an error.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Fields for a new task.
#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    /// Title of the task.
    pub title: String,
    /// Checklist (template steps for routines).
    pub steps: Vec<String>,
    /// Recurrence rule, for routines.
    pub recurrence: Option<RecurrenceRule>,
}

/// Result of a queue or routine mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationOutcome {
    /// Whether anything changed.
    pub applied: bool,
    /// Undo handle, when the change can be reverted.
    pub token: Option<UndoToken>,
}

impl MutationOutcome {
    const fn noop() -> Self {
        Self {
            applied: false,
            token: None,
        }
    }
}

/// Result of a routine mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineOutcome {
    /// Occurrence that was acted upon (`None` when nothing was due).
    pub date: Option<Date>,
    /// Task after the operation.
    pub task: Task,
    /// Whether anything changed, and how to revert it.
    pub outcome: MutationOutcome,
}

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The mutation was reverted.
    Reverted {
        /// Label of the reverted mutation.
        label: String,
    },
    /// Too much happened since; the entry was dropped without changes.
    Stale {
        /// Label of the dropped mutation.
        label: String,
    },
    /// No entry with that token (already used or evicted).
    Unknown,
}

/// One day of a routine calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    /// Calendar day.
    pub date: Date,
    /// Derived status.
    pub status: OccurrenceStatus,
    /// Ticked steps in the day's snapshot.
    pub steps_done: usize,
    /// Steps in the day's snapshot (template size when none exists).
    pub steps_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoutineAction {
    Complete,
    Skip,
    Incomplete,
}

impl RoutineAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Complete => "Completed",
            Self::Skip => "Skipped",
            Self::Incomplete => "Reopened",
        }
    }
}

/// Service façade that applies focus mutations one at a time.
pub struct FocusService<S> {
    store: S,
    queue: FocusQueue,
    history: UndoHistory,
    config: FocusConfig,
    scheduler: Box<dyn NotificationScheduler>,
    presenter: Box<dyn UndoPresenter>,
    clock: Box<dyn Clock>,
}

impl<S> FocusService<S> {
    /// Service over `store` with an empty queue, no reminders, logged toasts
    /// and the system clock.
    pub fn new(store: S, config: FocusConfig) -> Self {
        Self {
            store,
            queue: FocusQueue::new(),
            history: UndoHistory::new(config.undo.history_limit),
            config,
            scheduler: Box::new(NoopScheduler),
            presenter: Box::new(TracingPresenter),
            clock: Box::new(SystemClock),
        }
    }

    /// Resume from a stored queue snapshot. The snapshot is repaired so
    /// ordering invariants hold; its version is kept.
    #[must_use]
    pub fn with_queue(mut self, queue: FocusQueue) -> Self {
        self.queue = queue.repaired();
        self
    }

    /// Resume from a stored undo history; the configured limit wins.
    #[must_use]
    pub fn with_history(mut self, mut history: UndoHistory) -> Self {
        history.set_limit(self.config.undo.history_limit);
        self.history = history;
        self
    }

    /// Use `scheduler` for reminders.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: impl NotificationScheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    /// Use `presenter` for toasts.
    #[must_use]
    pub fn with_presenter(mut self, presenter: impl UndoPresenter + 'static) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    /// Use `clock` for today/now.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current queue snapshot.
    pub const fn queue(&self) -> &FocusQueue {
        &self.queue
    }

    /// Undo history.
    pub const fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Loaded configuration.
    pub const fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Day the service currently treats as today.
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    /// Hand back the store and the state worth persisting.
    pub fn into_parts(self) -> (S, FocusQueue, UndoHistory) {
        (self.store, self.queue, self.history)
    }

    fn ledger(&self) -> Ledger {
        Ledger::new(self.clock.today(), self.clock.now(), self.config.streak.policy())
    }

    fn record(
        &mut self,
        label: &str,
        message: String,
        queue: Option<UndoAction>,
        task: Option<TaskRestore>,
    ) -> Option<UndoToken> {
        let token = self.history.push(label, queue, task);
        self.presenter.show(&Toast {
            message,
            undo: token.map(|token| ToastAction {
                label: "Undo".into(),
                token,
            }),
        });
        token
    }

    fn reschedule(&self, task: &Task) {
        if !self.config.notifications.enabled {
            return;
        }
        if task.rule().is_some() && !task.is_deleted() {
            self.scheduler.schedule_for(task);
        } else if matches!(task.status, TaskStatus::Complete | TaskStatus::Archived) || task.is_deleted() {
            self.scheduler.cancel_for(task.id);
        }
    }
}

impl<S: TaskStore> FocusService<S> {
    fn load(&self, id: TaskId) -> Result<Task, ServiceError> {
        self.store.get(id).map_err(|err| ServiceError::Store(err.into()))
    }

    /// Persist `after` over `before`. Returns the stored task and how to put
    /// `before` back, or `None` when nothing differs.
    fn write(&self, before: &Task, after: &Task) -> Result<Option<(Task, TaskRestore)>, ServiceError> {
        let patch = TaskPatch::between(before, after);
        if patch.is_empty() {
            return Ok(None);
        }
        let updated = self
            .store
            .patch(before.id, &patch)
            .map_err(|err| ServiceError::Store(err.into()))?;
        let restore = TaskRestore {
            before: before.clone(),
            revision_after: updated.revision,
        };
        Ok(Some((updated, restore)))
    }

    /// Create a task; routines get their counters computed up front.
    ///
    /// # Errors
    /// Returns an error when the store rejects the task.
    pub fn create_task(&mut self, input: CreateTaskInput) -> Result<Task, ServiceError> {
        let CreateTaskInput {
            title,
            steps,
            recurrence,
        } = input;
        let mut task = Task::new(title).with_steps(steps);
        if let Some(rule) = recurrence {
            task = self.ledger().refreshed(&task.with_recurrence(rule));
        }
        self.store
            .insert(task.clone())
            .map_err(|err| ServiceError::Store(err.into()))?;
        info!(task = %task.id, recurring = task.is_recurring, "Created task");
        self.reschedule(&task);
        Ok(task)
    }

    /// Run any queue command.
    ///
    /// # Errors
    /// Returns an error when a referenced task cannot be read or written.
    pub fn apply(&mut self, command: &QueueCommand) -> Result<MutationOutcome, ServiceError> {
        match command {
            QueueCommand::Add {
                task_id,
                for_today,
                selection,
            } => self.add_to_queue(*task_id, *for_today, selection.clone()),
            QueueCommand::Complete { item_id } => self.complete_item(*item_id),
            other => Ok(self.rearrange(other)),
        }
    }

    /// Queue a task, promoting it out of the inbox.
    ///
    /// # Errors
    /// Returns an error when the task cannot be read or promoted.
    pub fn add_to_queue(
        &mut self,
        task_id: TaskId,
        for_today: bool,
        selection: Option<StepSelection>,
    ) -> Result<MutationOutcome, ServiceError> {
        let task = self.load(task_id)?;
        if task.is_deleted() {
            debug!(task = %task_id, "Ignoring deleted task");
            return Ok(MutationOutcome::noop());
        }
        let mutation = self.queue.add(task_id, for_today, selection);
        if !mutation.applied {
            debug!(task = %task_id, "Task already queued");
            return Ok(MutationOutcome::noop());
        }
        let restore = if task.status == TaskStatus::Inbox {
            let mut promoted = task.clone();
            promoted.status = TaskStatus::Pool;
            self.write(&task, &promoted)?.map(|(_, restore)| restore)
        } else {
            None
        };
        self.queue = mutation.queue;
        let side = if for_today { "Today" } else { "Upcoming" };
        info!(task = %task_id, side, version = self.queue.version(), "Queued task");
        let token = self.record(
            QueueCommand::Add {
                task_id,
                for_today,
                selection: None,
            }
            .label(),
            format!("Added \"{}\" to {side}", task.title),
            mutation.undo,
            restore,
        );
        Ok(MutationOutcome {
            applied: true,
            token,
        })
    }

    /// Soft-complete a queue item; one-off tasks are marked complete too.
    ///
    /// # Errors
    /// Returns an error when the task cannot be read or written.
    pub fn complete_item(&mut self, item_id: QueueItemId) -> Result<MutationOutcome, ServiceError> {
        let Some(task_id) = self
            .queue
            .active_items()
            .find(|item| item.id == item_id)
            .map(|item| item.task_id)
        else {
            debug!(item = %item_id, "Unknown queue item");
            return Ok(MutationOutcome::noop());
        };
        let task = self.load(task_id)?;
        let mutation = self.queue.complete_item(item_id);
        let written = if task.rule().is_none() && task.status != TaskStatus::Complete {
            let mut done = task.clone();
            done.status = TaskStatus::Complete;
            self.write(&task, &done)?
        } else {
            None
        };
        self.queue = mutation.queue;
        let restore = written.map(|(updated, restore)| {
            self.reschedule(&updated);
            restore
        });
        info!(task = %task_id, item = %item_id, "Completed queue item");
        let token = self.record(
            "complete",
            format!("Completed \"{}\"", task.title),
            mutation.undo,
            restore,
        );
        Ok(MutationOutcome {
            applied: true,
            token,
        })
    }

    fn rearrange(&mut self, command: &QueueCommand) -> MutationOutcome {
        let mutation = command.apply(&self.queue);
        if !mutation.applied {
            debug!(op = command.label(), "Queue unchanged");
            return MutationOutcome::noop();
        }
        self.queue = mutation.queue;
        info!(
            op = command.label(),
            version = self.queue.version(),
            line = self.queue.today_line_index(),
            "Queue updated"
        );
        let label = command.label();
        let message = format!("{}{}", label[..1].to_uppercase(), &label[1..]);
        let token = self.record(label, message, mutation.undo, None);
        MutationOutcome {
            applied: true,
            token,
        }
    }

    /// Take an item out of the queue.
    pub fn remove_from_queue(&mut self, item_id: QueueItemId) -> MutationOutcome {
        self.rearrange(&QueueCommand::Remove { item_id })
    }

    /// Swap an item with its predecessor.
    pub fn move_up(&mut self, item_id: QueueItemId) -> MutationOutcome {
        self.rearrange(&QueueCommand::MoveUp { item_id })
    }

    /// Swap an item with its successor.
    pub fn move_down(&mut self, item_id: QueueItemId) -> MutationOutcome {
        self.rearrange(&QueueCommand::MoveDown { item_id })
    }

    /// Move an item to `index`.
    pub fn move_to_index(&mut self, item_id: QueueItemId, index: usize) -> MutationOutcome {
        self.rearrange(&QueueCommand::MoveToIndex { item_id, index })
    }

    /// Move the Today/Upcoming line.
    pub fn move_line(&mut self, index: usize) -> MutationOutcome {
        self.rearrange(&QueueCommand::MoveLine { index })
    }

    /// Replace the whole arrangement.
    pub fn reorder(&mut self, order: Vec<QueueItemId>, today_line_index: usize) -> MutationOutcome {
        self.rearrange(&QueueCommand::Reorder {
            order,
            today_line_index,
        })
    }

    /// Change how much of a task is in focus.
    pub fn update_step_selection(&mut self, item_id: QueueItemId, selection: StepSelection) -> MutationOutcome {
        self.rearrange(&QueueCommand::SelectSteps { item_id, selection })
    }

    /// Complete the routine's active occurrence, or `on` when given.
    ///
    /// # Errors
    /// Returns an error for one-off tasks or store failures.
    pub fn complete_routine(&mut self, task_id: TaskId, on: Option<Date>) -> Result<RoutineOutcome, ServiceError> {
        self.resolve_routine(task_id, RoutineAction::Complete, on)
    }

    /// Skip the routine's active occurrence, or `on` when given.
    ///
    /// # Errors
    /// Returns an error for one-off tasks or store failures.
    pub fn skip_routine(&mut self, task_id: TaskId, on: Option<Date>) -> Result<RoutineOutcome, ServiceError> {
        self.resolve_routine(task_id, RoutineAction::Skip, on)
    }

    /// Reopen the most recently resolved occurrence, or `on` when given.
    ///
    /// # Errors
    /// Returns an error for one-off tasks or store failures.
    pub fn mark_routine_incomplete(
        &mut self,
        task_id: TaskId,
        on: Option<Date>,
    ) -> Result<RoutineOutcome, ServiceError> {
        self.resolve_routine(task_id, RoutineAction::Incomplete, on)
    }

    fn routine(&self, task_id: TaskId) -> Result<Task, ServiceError> {
        let task = self.load(task_id)?;
        if task.rule().is_none() {
            return Err(ServiceError::NotRecurring(task_id));
        }
        Ok(task)
    }

    fn resolve_routine(
        &mut self,
        task_id: TaskId,
        action: RoutineAction,
        on: Option<Date>,
    ) -> Result<RoutineOutcome, ServiceError> {
        let task = self.routine(task_id)?;
        let ledger = self.ledger();
        let today = ledger.today();
        let date = on.or_else(|| match action {
            RoutineAction::Complete | RoutineAction::Skip => active_occurrence_date(&task, today),
            RoutineAction::Incomplete => task
                .recurring_instances
                .iter()
                .rev()
                .find(|inst| inst.date <= today && inst.resolution() != Resolution::Unresolved)
                .map(|inst| inst.date),
        });
        let Some(date) = date else {
            debug!(task = %task_id, action = action.verb(), "Nothing due");
            return Ok(RoutineOutcome {
                date: None,
                task,
                outcome: MutationOutcome::noop(),
            });
        };
        let after = match action {
            RoutineAction::Complete => ledger.mark_complete(&task, date),
            RoutineAction::Skip => ledger.mark_skipped(&task, date),
            RoutineAction::Incomplete => ledger.mark_incomplete(&task, date),
        };
        let message = format!("{} \"{}\" for {date}", action.verb(), task.title);
        self.commit_routine(task, &after, date, action.verb(), message)
    }

    fn commit_routine(
        &mut self,
        before: Task,
        after: &Task,
        date: Date,
        label: &str,
        message: String,
    ) -> Result<RoutineOutcome, ServiceError> {
        let Some((updated, restore)) = self.write(&before, after)? else {
            debug!(task = %before.id, %date, label, "Routine unchanged");
            return Ok(RoutineOutcome {
                date: Some(date),
                task: before,
                outcome: MutationOutcome::noop(),
            });
        };
        info!(
            task = %updated.id,
            %date,
            label,
            streak = updated.recurring_streak,
            best = updated.recurring_best_streak,
            "Routine updated"
        );
        self.reschedule(&updated);
        let token = self.record(&label.to_lowercase(), message, None, Some(restore));
        Ok(RoutineOutcome {
            date: Some(date),
            task: updated,
            outcome: MutationOutcome {
                applied: true,
                token,
            },
        })
    }

    /// Re-clone the day's checklist from the current template.
    ///
    /// # Errors
    /// Returns an error for one-off tasks or store failures.
    pub fn reset_routine_day(&mut self, task_id: TaskId, date: Date) -> Result<RoutineOutcome, ServiceError> {
        let task = self.routine(task_id)?;
        let after = self.ledger().reset_from_template(&task, date);
        let message = format!("Reset checklist of \"{}\" for {date}", task.title);
        self.commit_routine(task, &after, date, "Reset", message)
    }

    /// Flip the `index`-th step of the day's checklist, creating the day's
    /// snapshot first if needed. Defaults to the active occurrence, then today.
    ///
    /// # Errors
    /// Returns an error for one-off tasks, unknown steps or store failures.
    pub fn toggle_routine_step(
        &mut self,
        task_id: TaskId,
        on: Option<Date>,
        index: usize,
    ) -> Result<RoutineOutcome, ServiceError> {
        let task = self.routine(task_id)?;
        let ledger = self.ledger();
        let date = on
            .or_else(|| active_occurrence_date(&task, ledger.today()))
            .unwrap_or_else(|| ledger.today());
        let materialized = if task.instance(date).is_some() {
            task.clone()
        } else {
            ledger.reset_from_template(&task, date)
        };
        let Some(step) = materialized
            .instance(date)
            .and_then(|inst| inst.steps.get(index))
            .cloned()
        else {
            return Err(ServiceError::MissingStep {
                task: task_id,
                date,
                index,
            });
        };
        let after = ledger.set_instance_step(&materialized, date, step.id, !step.completed);
        let state = if step.completed { "Unticked" } else { "Ticked" };
        let message = format!("{state} \"{}\" on {date}", step.text);
        self.commit_routine(task, &after, date, "Toggle step", message)
    }

    /// Derived status of every day in `start..=end`.
    ///
    /// # Errors
    /// Returns an error for one-off tasks or store failures.
    pub fn calendar(&self, task_id: TaskId, start: Date, end: Date) -> Result<Vec<CalendarDay>, ServiceError> {
        let task = self.routine(task_id)?;
        let today = self.clock.today();
        Ok(project_range(&task, start, end, today)
            .into_iter()
            .map(|day| {
                let steps = day.instance.map_or(task.steps.as_slice(), |inst| inst.steps.as_slice());
                CalendarDay {
                    date: day.date,
                    status: day.status,
                    steps_done: steps.iter().filter(|step| step.completed).count(),
                    steps_total: steps.len(),
                }
            })
            .collect())
    }

    /// Revert the mutation behind `token`. The entry is consumed either way.
    ///
    /// # Errors
    /// Returns an error when the task half cannot be read or written.
    pub fn undo(&mut self, token: UndoToken) -> Result<UndoOutcome, ServiceError> {
        let Some(entry) = self.history.take(token) else {
            debug!(%token, "Unknown undo token");
            return Ok(UndoOutcome::Unknown);
        };
        let label = entry.label;

        let queue = match &entry.queue {
            Some(action) => match self.queue.revert(action, self.config.undo.policy()) {
                Ok(mutation) => Some(mutation.queue),
                Err(err) => {
                    warn!(%token, %err, "Dropping stale undo");
                    return Ok(UndoOutcome::Stale { label });
                }
            },
            None => None,
        };

        let task_patch = match &entry.task {
            Some(restore) => {
                let current = self.load(restore.before.id)?;
                if current.revision != restore.revision_after {
                    warn!(
                        %token,
                        task = %current.id,
                        expected = restore.revision_after,
                        found = current.revision,
                        "Dropping stale undo"
                    );
                    return Ok(UndoOutcome::Stale { label });
                }
                Some((current.id, TaskPatch::between(&current, &restore.before)))
            }
            None => None,
        };

        if let Some((task_id, patch)) = task_patch {
            let updated = self
                .store
                .patch(task_id, &patch)
                .map_err(|err| ServiceError::Store(err.into()))?;
            self.reschedule(&updated);
        }
        if let Some(queue) = queue {
            self.queue = queue;
        }
        info!(%token, label = %label, "Undo applied");
        Ok(UndoOutcome::Reverted { label })
    }

    /// Revert the newest recorded mutation.
    ///
    /// # Errors
    /// Same as [`undo`](Self::undo).
    pub fn undo_latest(&mut self) -> Result<UndoOutcome, ServiceError> {
        match self.history.latest() {
            Some(token) => self.undo(token),
            None => Ok(UndoOutcome::Unknown),
        }
    }
}
