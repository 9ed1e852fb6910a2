//! Task read-modify-write surface used by the focus service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Error;
use focusline_core::{Task, TaskId};

use crate::task_patch::TaskPatch;

/// Minimal storage abstraction required by [`FocusService`](crate::service::FocusService).
pub trait TaskStore {
    /// Error type bubbled up from the backing store.
    type Error: Into<Error>;

    /// Load a task.
    ///
    /// # Errors
    /// Returns a store-specific error when the task is unknown or unreadable.
    fn get(&self, id: TaskId) -> Result<Task, Self::Error>;

    /// Apply `patch` to a stored task and return the result.
    ///
    /// Stores bump [`Task::revision`] on every successful patch.
    ///
    /// # Errors
    /// Returns a store-specific error when the task is unknown or the write fails.
    fn patch(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, Self::Error>;

    /// Add a new task.
    ///
    /// # Errors
    /// Returns a store-specific error when the id is taken or the write fails.
    fn insert(&self, task: Task) -> Result<(), Self::Error>;

    /// Every stored task.
    ///
    /// # Errors
    /// Returns a store-specific error when listing fails.
    fn list(&self) -> Result<Vec<Task>, Self::Error>;
}

impl<S> TaskStore for &S
where
    S: TaskStore + ?Sized,
{
    type Error = S::Error;

    fn get(&self, id: TaskId) -> Result<Task, Self::Error> {
        (*self).get(id)
    }

    fn patch(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, Self::Error> {
        (*self).patch(id, patch)
    }

    fn insert(&self, task: Task) -> Result<(), Self::Error> {
        (*self).insert(task)
    }

    fn list(&self) -> Result<Vec<Task>, Self::Error> {
        (*self).list()
    }
}

impl<S> TaskStore for Arc<S>
where
    S: TaskStore + ?Sized,
{
    type Error = S::Error;

    fn get(&self, id: TaskId) -> Result<Task, Self::Error> {
        self.as_ref().get(id)
    }

    fn patch(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, Self::Error> {
        self.as_ref().patch(id, patch)
    }

    fn insert(&self, task: Task) -> Result<(), Self::Error> {
        self.as_ref().insert(task)
    }

    fn list(&self) -> Result<Vec<Task>, Self::Error> {
        self.as_ref().list()
    }
}

/// Errors surfaced by [`MemoryTaskStore`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Target task could not be found.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// A task with this id already exists.
    #[error("task {0} already exists")]
    Duplicate(TaskId),
}

/// In-memory store keyed by task id.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<BTreeMap<TaskId, Task>>,
}

impl MemoryTaskStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `tasks`; later duplicates replace earlier ones.
    /// Instance lists are put back in date order.
    #[must_use]
    pub fn from_tasks<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|mut task| {
                task.normalize_instances();
                (task.id, task)
            })
            .collect();
        Self {
            tasks: Mutex::new(tasks),
        }
    }

    /// Copy of every task, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.guard().values().cloned().collect()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<TaskId, Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskStore for MemoryTaskStore {
    type Error = StoreError;

    fn get(&self, id: TaskId) -> Result<Task, Self::Error> {
        self.guard().get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn patch(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, Self::Error> {
        let mut tasks = self.guard();
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(task);
        task.revision += 1;
        Ok(task.clone())
    }

    fn insert(&self, mut task: Task) -> Result<(), Self::Error> {
        let mut tasks = self.guard();
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Duplicate(task.id));
        }
        task.normalize_instances();
        tasks.insert(task.id, task);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Task>, Self::Error> {
        Ok(self.snapshot())
    }
}
