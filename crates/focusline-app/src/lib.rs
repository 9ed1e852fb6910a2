//! Application layer for focusline.
//!
//! Wraps the pure engine from `focusline-core` with configuration, a task
//! store seam, side-effect collaborators, undo history and structured logging.

pub mod collaborators;
pub mod config;
pub mod service;
pub mod shared;
pub mod store;
pub mod task_patch;
pub mod undo;

// Re-exports for convenience
pub use collaborators::{
    Clock, FixedClock, NoopScheduler, NotificationScheduler, SystemClock, Toast, ToastAction,
    TracingPresenter, TracingScheduler, UndoPresenter,
};
pub use config::{FocusConfig, NotificationConfig, StreakConfig, UndoConfig, find_root};
pub use service::{
    CalendarDay, CreateTaskInput, FocusService, MutationOutcome, RoutineOutcome, ServiceError,
    UndoOutcome,
};
pub use shared::SharedFocusService;
pub use store::{MemoryTaskStore, StoreError, TaskStore};
pub use task_patch::{RoutineStats, SetDiff, TaskPatch, diff_sets};
pub use undo::{TaskRestore, UndoEntry, UndoHistory, UndoToken};
