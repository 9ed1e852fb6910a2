//! Side-effect seams handed to the focus service.
//!
//! Collaborators are fire-and-forget: the service calls them after a state
//! transition has been committed and never inspects their outcome.

use focusline_core::{Task, TaskId};
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::info;

use crate::undo::UndoToken;

/// Schedules reminders for tasks.
pub trait NotificationScheduler: Send {
    /// (Re)schedule reminders for `task`, typically at its next due date.
    fn schedule_for(&self, task: &Task);

    /// Drop any reminder for `task_id`.
    fn cancel_for(&self, task_id: TaskId);
}

/// Message plus optional undo affordance shown after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Text shown to the user.
    pub message: String,
    /// Undo button, when the mutation can be reverted.
    pub undo: Option<ToastAction>,
}

/// Undo button on a [`Toast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastAction {
    /// Button label.
    pub label: String,
    /// Token to pass to [`FocusService::undo`](crate::service::FocusService::undo).
    pub token: UndoToken,
}

/// Shows toasts.
pub trait UndoPresenter: Send {
    /// Display `toast`.
    fn show(&self, toast: &Toast);
}

/// Source of the current day and instant.
pub trait Clock: Send {
    /// Current calendar day in the user's zone.
    fn today(&self) -> Date;

    /// Current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Scheduler that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl NotificationScheduler for NoopScheduler {
    fn schedule_for(&self, _task: &Task) {}

    fn cancel_for(&self, _task_id: TaskId) {}
}

/// Scheduler that only logs what it would do.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScheduler;

impl NotificationScheduler for TracingScheduler {
    fn schedule_for(&self, task: &Task) {
        match task.recurring_next_due {
            Some(due) => info!(task = %task.id, %due, "Reminder scheduled"),
            None => info!(task = %task.id, "No upcoming occurrence to remind about"),
        }
    }

    fn cancel_for(&self, task_id: TaskId) {
        info!(task = %task_id, "Reminder cancelled");
    }
}

/// Presenter that logs toasts.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl UndoPresenter for TracingPresenter {
    fn show(&self, toast: &Toast) {
        match &toast.undo {
            Some(action) => info!(token = %action.token, label = %action.label, "{}", toast.message),
            None => info!("{}", toast.message),
        }
    }
}

/// Wall clock in the local offset, falling back to UTC when it cannot be determined.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        self.now().date()
    }

    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        UtcOffset::current_local_offset().map_or(now, |offset| now.to_offset(offset))
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0.date()
    }

    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
