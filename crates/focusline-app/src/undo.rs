//! Bounded history of reversible mutations.

use std::collections::VecDeque;
use std::fmt;

use focusline_core::{Task, UndoAction};
use serde::{Deserialize, Serialize};

/// Handle returned with every reversible mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UndoToken(pub u64);

impl fmt::Display for UndoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task state to put back, valid only while nobody else touched the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRestore {
    /// Task as it was before the mutation.
    pub before: Task,
    /// Store revision right after the mutation.
    pub revision_after: u64,
}

/// One reversible mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// Handle given to the caller.
    pub token: UndoToken,
    /// What the mutation did, for toasts and logs.
    pub label: String,
    /// Queue half of the mutation.
    #[serde(default)]
    pub queue: Option<UndoAction>,
    /// Task half of the mutation.
    #[serde(default)]
    pub task: Option<TaskRestore>,
}

/// Most recent undo entries, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoHistory {
    entries: VecDeque<UndoEntry>,
    next_token: u64,
    limit: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

impl UndoHistory {
    /// Empty history keeping at most `limit` entries (at least one).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_token: 1,
            limit: limit.max(1),
        }
    }

    /// Change the bound, evicting the oldest entries if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.evict();
    }

    /// Record an entry. Returns `None` when there is nothing to undo.
    pub fn push(
        &mut self,
        label: impl Into<String>,
        queue: Option<UndoAction>,
        task: Option<TaskRestore>,
    ) -> Option<UndoToken> {
        if queue.is_none() && task.is_none() {
            return None;
        }
        let token = UndoToken(self.next_token);
        self.next_token += 1;
        self.entries.push_back(UndoEntry {
            token,
            label: label.into(),
            queue,
            task,
        });
        self.evict();
        Some(token)
    }

    /// Remove and return the entry for `token`.
    pub fn take(&mut self, token: UndoToken) -> Option<UndoEntry> {
        let idx = self.entries.iter().position(|entry| entry.token == token)?;
        self.entries.remove(idx)
    }

    /// Token of the newest entry.
    #[must_use]
    pub fn latest(&self) -> Option<UndoToken> {
        self.entries.back().map(|entry| entry.token)
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UndoEntry> {
        self.entries.iter()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing can be undone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusline_core::{FocusQueue, TaskId};

    fn queue_undo() -> Option<UndoAction> {
        FocusQueue::new().add(TaskId::new(), true, None).undo
    }

    #[test]
    fn history_is_bounded() {
        let mut history = UndoHistory::new(2);
        let first = history.push("one", queue_undo(), None);
        let second = history.push("two", queue_undo(), None);
        let third = history.push("three", queue_undo(), None);
        assert_eq!(history.len(), 2);
        assert!(first.is_some_and(|token| history.take(token).is_none()));
        assert_eq!(history.latest(), third);
        assert!(second.is_some_and(|token| history.take(token).is_some()));
    }

    #[test]
    fn empty_entries_are_not_recorded() {
        let mut history = UndoHistory::default();
        assert_eq!(history.push("noop", None, None), None);
        assert!(history.is_empty());
    }

    #[test]
    fn tokens_are_never_reused() {
        let mut history = UndoHistory::new(1);
        let first = history.push("a", queue_undo(), None);
        let Some(token) = first else {
            panic!("entry must be recorded");
        };
        history.take(token);
        let second = history.push("b", queue_undo(), None);
        assert_ne!(first, second);
        assert_eq!(token.to_string(), "#1");
    }

    #[test]
    fn shrinking_the_limit_evicts_oldest() {
        let mut history = UndoHistory::new(5);
        for label in ["a", "b", "c"] {
            history.push(label, queue_undo(), None);
        }
        history.set_limit(1);
        let labels: Vec<_> = history.iter().map(|entry| entry.label.as_str()).collect();
        assert_eq!(labels, vec!["c"]);
    }
}
