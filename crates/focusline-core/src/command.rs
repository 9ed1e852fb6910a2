//! Serializable queue commands, so callers can log, replay or transport a
//! mutation request before applying it.

use serde::{Deserialize, Serialize};

use crate::id::{QueueItemId, TaskId};
use crate::queue::{FocusQueue, Mutation, StepSelection};

/// One queue mutation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueueCommand {
    /// Queue a task.
    Add {
        /// Task to queue.
        task_id: TaskId,
        /// Insert above the line.
        for_today: bool,
        /// Explicit selection, defaulting to the side's whole-task selection.
        #[serde(default)]
        selection: Option<StepSelection>,
    },
    /// Drop an item.
    Remove {
        /// Item to drop.
        item_id: QueueItemId,
    },
    /// Soft-complete an item.
    Complete {
        /// Item to complete.
        item_id: QueueItemId,
    },
    /// Swap with the previous item.
    MoveUp {
        /// Item to move.
        item_id: QueueItemId,
    },
    /// Swap with the next item.
    MoveDown {
        /// Item to move.
        item_id: QueueItemId,
    },
    /// Move to an index.
    MoveToIndex {
        /// Item to move.
        item_id: QueueItemId,
        /// Target index.
        index: usize,
    },
    /// Move the line.
    MoveLine {
        /// New line index.
        index: usize,
    },
    /// Replace the whole arrangement.
    Reorder {
        /// Desired order of item ids.
        order: Vec<QueueItemId>,
        /// New line index.
        today_line_index: usize,
    },
    /// Change the selection of an item.
    SelectSteps {
        /// Item to update.
        item_id: QueueItemId,
        /// New selection.
        selection: StepSelection,
    },
}

impl QueueCommand {
    /// Run the command against `queue`.
    pub fn apply(&self, queue: &FocusQueue) -> Mutation {
        match self {
            Self::Add {
                task_id,
                for_today,
                selection,
            } => queue.add(*task_id, *for_today, selection.clone()),
            Self::Remove { item_id } => queue.remove(*item_id),
            Self::Complete { item_id } => queue.complete_item(*item_id),
            Self::MoveUp { item_id } => queue.move_up(*item_id),
            Self::MoveDown { item_id } => queue.move_down(*item_id),
            Self::MoveToIndex { item_id, index } => queue.move_to_index(*item_id, *index),
            Self::MoveLine { index } => queue.move_line(*index),
            Self::Reorder {
                order,
                today_line_index,
            } => queue.reorder(order, *today_line_index),
            Self::SelectSteps { item_id, selection } => {
                queue.update_step_selection(*item_id, selection.clone())
            }
        }
    }

    /// Short label used for undo toasts and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add to queue",
            Self::Remove { .. } => "remove from queue",
            Self::Complete { .. } => "complete",
            Self::MoveUp { .. } => "move up",
            Self::MoveDown { .. } => "move down",
            Self::MoveToIndex { .. } => "move",
            Self::MoveLine { .. } => "move today line",
            Self::Reorder { .. } => "reorder",
            Self::SelectSteps { .. } => "change step selection",
        }
    }

    /// Item the command targets, if any.
    #[must_use]
    pub const fn item_id(&self) -> Option<QueueItemId> {
        match self {
            Self::Remove { item_id }
            | Self::Complete { item_id }
            | Self::MoveUp { item_id }
            | Self::MoveDown { item_id }
            | Self::MoveToIndex { item_id, .. }
            | Self::SelectSteps { item_id, .. } => Some(*item_id),
            Self::Add { .. } | Self::MoveLine { .. } | Self::Reorder { .. } => None,
        }
    }
}
