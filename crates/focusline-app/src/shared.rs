//! Async handle for hosts that drive the service from several tasks.
//!
//! Every call takes the lock for the whole mutation, so mutations never
//! interleave on one queue.

use std::sync::Arc;

use focusline_core::{FocusQueue, QueueCommand, TaskId};
use time::Date;
use tokio::sync::Mutex;

use crate::service::{FocusService, MutationOutcome, RoutineOutcome, ServiceError, UndoOutcome};
use crate::store::TaskStore;
use crate::undo::UndoToken;

/// Cloneable, lock-guarded [`FocusService`].
pub struct SharedFocusService<S> {
    inner: Arc<Mutex<FocusService<S>>>,
}

impl<S> Clone for SharedFocusService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TaskStore> SharedFocusService<S> {
    /// Wrap `service`.
    pub fn new(service: FocusService<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    /// Run a queue command.
    ///
    /// # Errors
    /// See [`FocusService::apply`].
    pub async fn apply(&self, command: QueueCommand) -> Result<MutationOutcome, ServiceError> {
        self.inner.lock().await.apply(&command)
    }

    /// Complete a routine's active occurrence.
    ///
    /// # Errors
    /// See [`FocusService::complete_routine`].
    pub async fn complete_routine(&self, task_id: TaskId, on: Option<Date>) -> Result<RoutineOutcome, ServiceError> {
        self.inner.lock().await.complete_routine(task_id, on)
    }

    /// Skip a routine's active occurrence.
    ///
    /// # Errors
    /// See [`FocusService::skip_routine`].
    pub async fn skip_routine(&self, task_id: TaskId, on: Option<Date>) -> Result<RoutineOutcome, ServiceError> {
        self.inner.lock().await.skip_routine(task_id, on)
    }

    /// Revert a recorded mutation.
    ///
    /// # Errors
    /// See [`FocusService::undo`].
    pub async fn undo(&self, token: UndoToken) -> Result<UndoOutcome, ServiceError> {
        self.inner.lock().await.undo(token)
    }

    /// Copy of the current queue.
    pub async fn queue(&self) -> FocusQueue {
        self.inner.lock().await.queue().clone()
    }

    /// Run `f` with exclusive access to the service.
    pub async fn with<R>(&self, f: impl FnOnce(&mut FocusService<S>) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocusConfig;
    use crate::service::CreateTaskInput;
    use crate::store::MemoryTaskStore;

    #[tokio::test]
    async fn concurrent_adds_keep_the_queue_consistent() {
        let service = SharedFocusService::new(FocusService::new(MemoryTaskStore::new(), FocusConfig::default()));
        let mut ids = Vec::new();
        for idx in 0..8 {
            let task = service
                .with(|svc| {
                    svc.create_task(CreateTaskInput {
                        title: format!("task {idx}"),
                        steps: Vec::new(),
                        recurrence: None,
                    })
                })
                .await
                .unwrap_or_else(|err| panic!("create: {err}"));
            ids.push(task.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let service = service.clone();
                let command = QueueCommand::Add {
                    task_id: *id,
                    for_today: idx % 2 == 0,
                    selection: None,
                };
                tokio::spawn(async move { service.apply(command).await.map(|o| o.applied) })
            })
            .collect();
        for handle in handles {
            let applied = handle
                .await
                .unwrap_or_else(|err| panic!("join: {err}"))
                .unwrap_or_else(|err| panic!("apply: {err}"));
            assert!(applied);
        }

        let queue = service.queue().await;
        assert_eq!(queue.active_len(), 8);
        assert_eq!(queue.today_line_index(), 4);
        assert!(queue.check_invariants().is_ok());
    }
}
