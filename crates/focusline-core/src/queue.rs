//! Focus queue: one ordered list of task references split into Today and
//! Upcoming by a movable line.
//!
//! Every operation leaves `self` untouched and returns a [`Mutation`] holding
//! the next snapshot plus, when something changed, an [`UndoAction`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{InvariantViolation, UndoError};
use crate::id::{QueueItemId, StepId, TaskId};

/// How much of a task is in focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSelection {
    /// The whole task, today.
    AllToday,
    /// The whole task, later.
    AllUpcoming,
    /// Only some steps, today.
    SpecificSteps {
        /// Selected step ids.
        step_ids: BTreeSet<StepId>,
    },
}

impl StepSelection {
    /// Selection of the given steps.
    #[must_use]
    pub fn steps<I: IntoIterator<Item = StepId>>(ids: I) -> Self {
        Self::SpecificSteps {
            step_ids: ids.into_iter().collect(),
        }
    }

    /// Whether this selection asks for work today. An empty step set asks for nothing.
    #[must_use]
    pub fn wants_today(&self) -> bool {
        match self {
            Self::AllToday => true,
            Self::AllUpcoming => false,
            Self::SpecificSteps { step_ids } => !step_ids.is_empty(),
        }
    }

    /// Whether the selection may sit on the given side of the line.
    #[must_use]
    pub fn fits(&self, in_today: bool) -> bool {
        match self {
            Self::AllToday => in_today,
            Self::AllUpcoming => !in_today,
            Self::SpecificSteps { step_ids } => in_today && !step_ids.is_empty(),
        }
    }

    /// Coerce the selection onto a side of the line.
    #[must_use]
    pub fn for_side(self, in_today: bool) -> Self {
        if self.fits(in_today) {
            self
        } else if in_today {
            Self::AllToday
        } else {
            Self::AllUpcoming
        }
    }
}

/// A queued reference to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusQueueItem {
    /// Identifier of the item.
    pub id: QueueItemId,
    /// Referenced task.
    pub task_id: TaskId,
    /// Dense position among active items.
    pub order: usize,
    /// Soft-completed items stay for history but leave the ordering.
    pub completed: bool,
    /// How much of the task is selected.
    pub selection: StepSelection,
    /// Last time the item was touched.
    #[serde(with = "time::serde::rfc3339")]
    pub last_interacted_at: OffsetDateTime,
}

impl FocusQueueItem {
    fn new(task_id: TaskId, selection: StepSelection) -> Self {
        Self {
            id: QueueItemId::new(),
            task_id,
            order: 0,
            completed: false,
            selection,
            last_interacted_at: OffsetDateTime::now_utc(),
        }
    }

    fn touch(&mut self) {
        self.last_interacted_at = OffsetDateTime::now_utc();
    }
}

/// How many mutations may land between capturing an undo action and using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UndoPolicy {
    /// `0` only allows undoing the very latest mutation.
    pub max_intervening: u64,
}

/// State-independent description of how to reverse a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inverse {
    /// Take a freshly added item out again.
    Withdraw {
        /// Item to withdraw.
        item_id: QueueItemId,
    },
    /// Put back a captured item exactly as it was.
    Reinstate {
        /// Snapshot of the item before it left.
        item: FocusQueueItem,
        /// Its position among active items at the time.
        position: usize,
        /// Whether it sat above the line.
        was_today: bool,
    },
    /// Restore a previous arrangement of active items and the line.
    Rearrange {
        /// Item ids with their selections, in order.
        layout: Vec<(QueueItemId, StepSelection)>,
        /// Line index to restore.
        today_line_index: usize,
    },
}

/// Captured undo for one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoAction {
    /// Queue version produced by the mutation.
    pub recorded_version: u64,
    /// How to reverse it.
    pub inverse: Inverse,
}

/// Outcome of a queue operation.
#[derive(Debug, Clone)]
#[must_use]
pub struct Mutation {
    /// Next snapshot (equal to the input when nothing happened).
    pub queue: FocusQueue,
    /// Whether anything changed.
    pub applied: bool,
    /// Reverse action for applied mutations.
    pub undo: Option<UndoAction>,
}

impl Mutation {
    fn unchanged(queue: &FocusQueue) -> Self {
        Self {
            queue: queue.clone(),
            applied: false,
            undo: None,
        }
    }
}

/// Working copy of the active items in display order.
struct Layout {
    active: Vec<FocusQueueItem>,
    retired: Vec<FocusQueueItem>,
    line: usize,
}

impl Layout {
    fn position(&self, item_id: QueueItemId) -> Option<usize> {
        self.active.iter().position(|item| item.id == item_id)
    }

    fn rearrange_inverse(&self) -> Inverse {
        Inverse::Rearrange {
            layout: self
                .active
                .iter()
                .map(|item| (item.id, item.selection.clone()))
                .collect(),
            today_line_index: self.line,
        }
    }

    /// Take the item at `from`, adjusting the line if it sat above it.
    fn take(&mut self, from: usize) -> (FocusQueueItem, bool) {
        let item = self.active.remove(from);
        let was_today = from < self.line;
        if was_today {
            self.line -= 1;
        }
        (item, was_today)
    }

    /// Insert on a given side of the line, coercing the selection to match.
    fn place(&mut self, mut item: FocusQueueItem, index: usize, in_today: bool) {
        let index = if in_today {
            index.min(self.line)
        } else {
            index.clamp(self.line, self.active.len())
        };
        item.selection = item.selection.for_side(in_today);
        self.active.insert(index, item);
        if in_today {
            self.line += 1;
        }
    }
}

/// The ordered queue and its Today/Upcoming boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusQueue {
    items: Vec<FocusQueueItem>,
    today_line_index: usize,
    #[serde(default)]
    version: u64,
}

impl FocusQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from raw parts, renumbering, clamping the line and
    /// coercing selections so the invariants hold.
    #[must_use]
    pub fn from_parts(items: Vec<FocusQueueItem>, today_line_index: usize) -> Self {
        let (mut active, retired): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| !item.completed);
        active.sort_by_key(|item| item.order);
        let mut seen = BTreeSet::new();
        active.retain(|item| seen.insert(item.task_id));
        let line = today_line_index.min(active.len());
        for (idx, item) in active.iter_mut().enumerate() {
            item.selection = item.selection.clone().for_side(idx < line);
        }
        let mut queue = Self {
            items: Vec::new(),
            today_line_index: 0,
            version: 0,
        };
        queue.install(Layout {
            active,
            retired,
            line,
        });
        queue
    }

    /// Copy with invariants restored and the version kept, for snapshots read
    /// back from storage.
    #[must_use]
    pub fn repaired(&self) -> Self {
        let mut queue = Self::from_parts(self.items.clone(), self.today_line_index);
        queue.version = self.version;
        queue
    }

    /// Every item, active first in order, then completed ones.
    #[must_use]
    pub fn items(&self) -> &[FocusQueueItem] {
        &self.items
    }

    /// Boundary between Today and Upcoming.
    #[must_use]
    pub const fn today_line_index(&self) -> usize {
        self.today_line_index
    }

    /// Monotonic counter bumped by every applied mutation.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Active items sorted by order.
    pub fn active_items(&self) -> impl Iterator<Item = &FocusQueueItem> {
        // `install` keeps active items sorted at the front.
        self.items.iter().take_while(|item| !item.completed)
    }

    /// Number of active items.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active_items().count()
    }

    /// Items above the line.
    pub fn today_items(&self) -> impl Iterator<Item = &FocusQueueItem> {
        self.active_items().take(self.today_line_index)
    }

    /// Items below the line.
    pub fn upcoming_items(&self) -> impl Iterator<Item = &FocusQueueItem> {
        self.active_items().skip(self.today_line_index)
    }

    /// Look up any item by id.
    #[must_use]
    pub fn item(&self, item_id: QueueItemId) -> Option<&FocusQueueItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Active item referencing `task_id`.
    #[must_use]
    pub fn item_for_task(&self, task_id: TaskId) -> Option<&FocusQueueItem> {
        self.active_items().find(|item| item.task_id == task_id)
    }

    /// Whether `task_id` is actively queued.
    #[must_use]
    pub fn contains_task(&self, task_id: TaskId) -> bool {
        self.item_for_task(task_id).is_some()
    }

    /// Position of an active item.
    #[must_use]
    pub fn position_of(&self, item_id: QueueItemId) -> Option<usize> {
        self.active_items().position(|item| item.id == item_id)
    }

    /// Whether an active item sits above the line.
    #[must_use]
    pub fn is_today(&self, item_id: QueueItemId) -> Option<bool> {
        self.position_of(item_id).map(|pos| pos < self.today_line_index)
    }

    /// Verify order density, line range, selection sides and task uniqueness.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut orders: Vec<usize> = self.items.iter().filter(|i| !i.completed).map(|i| i.order).collect();
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(idx, order)| idx != *order) {
            return Err(InvariantViolation::SparseOrder(orders));
        }
        let count = orders.len();
        if self.today_line_index > count {
            return Err(InvariantViolation::LineOutOfRange {
                line: self.today_line_index,
                count,
            });
        }
        let mut tasks = BTreeSet::new();
        for item in self.items.iter().filter(|i| !i.completed) {
            if !item.selection.fits(item.order < self.today_line_index) {
                return Err(InvariantViolation::SelectionSide(item.id));
            }
            if !tasks.insert(item.task_id) {
                return Err(InvariantViolation::DuplicateTask(item.id));
            }
        }
        Ok(())
    }

    fn layout(&self) -> Layout {
        let (active, retired) = self.items.iter().cloned().partition(|item| !item.completed);
        Layout {
            active,
            retired,
            line: self.today_line_index,
        }
    }

    fn install(&mut self, layout: Layout) {
        let Layout {
            mut active,
            retired,
            line,
        } = layout;
        for (idx, item) in active.iter_mut().enumerate() {
            item.order = idx;
        }
        self.today_line_index = line.min(active.len());
        active.extend(retired);
        self.items = active;
    }

    fn commit(&self, layout: Layout, inverse: Option<Inverse>) -> Mutation {
        let mut queue = self.clone();
        queue.install(layout);
        queue.version += 1;
        let undo = inverse.map(|inverse| UndoAction {
            recorded_version: queue.version,
            inverse,
        });
        Mutation {
            queue,
            applied: true,
            undo,
        }
    }

    /// Queue `task_id` at the line: just above it for today (the line moves
    /// down), just below it otherwise. Duplicates are ignored.
    pub fn add(&self, task_id: TaskId, for_today: bool, selection: Option<StepSelection>) -> Mutation {
        if self.contains_task(task_id) {
            return Mutation::unchanged(self);
        }
        let selection = selection.unwrap_or(if for_today {
            StepSelection::AllToday
        } else {
            StepSelection::AllUpcoming
        });
        let item = FocusQueueItem::new(task_id, selection);
        let item_id = item.id;
        let mut layout = self.layout();
        let at = layout.line;
        layout.place(item, at, for_today);
        self.commit(layout, Some(Inverse::Withdraw { item_id }))
    }

    /// Take an item out of the queue entirely.
    pub fn remove(&self, item_id: QueueItemId) -> Mutation {
        let mut layout = self.layout();
        if let Some(position) = layout.position(item_id) {
            let (item, was_today) = layout.take(position);
            return self.commit(
                layout,
                Some(Inverse::Reinstate {
                    item,
                    position,
                    was_today,
                }),
            );
        }
        let before = layout.retired.len();
        layout.retired.retain(|item| item.id != item_id);
        if layout.retired.len() == before {
            return Mutation::unchanged(self);
        }
        // Dropping history has nothing to restore in the ordering.
        self.commit(layout, None)
    }

    /// Soft-complete an active item; it leaves the ordering but stays in `items`.
    pub fn complete_item(&self, item_id: QueueItemId) -> Mutation {
        let mut layout = self.layout();
        let Some(position) = layout.position(item_id) else {
            return Mutation::unchanged(self);
        };
        let (item, was_today) = layout.take(position);
        let mut done = item.clone();
        done.completed = true;
        done.touch();
        layout.retired.push(done);
        self.commit(
            layout,
            Some(Inverse::Reinstate {
                item,
                position,
                was_today,
            }),
        )
    }

    /// Swap with the previous active item.
    pub fn move_up(&self, item_id: QueueItemId) -> Mutation {
        match self.position_of(item_id) {
            Some(pos) if pos > 0 => self.move_to_index(item_id, pos - 1),
            _ => Mutation::unchanged(self),
        }
    }

    /// Swap with the next active item.
    pub fn move_down(&self, item_id: QueueItemId) -> Mutation {
        match self.position_of(item_id) {
            Some(pos) if pos + 1 < self.active_len() => self.move_to_index(item_id, pos + 1),
            _ => Mutation::unchanged(self),
        }
    }

    /// Move an item to `new_index` (clamped). Landing on the boundary slot
    /// keeps the item on its current side; anywhere else decides the side,
    /// shifting the line by one and coercing the selection when it crosses.
    pub fn move_to_index(&self, item_id: QueueItemId, new_index: usize) -> Mutation {
        let mut layout = self.layout();
        let Some(from) = layout.position(item_id) else {
            return Mutation::unchanged(self);
        };
        let target = new_index.min(layout.active.len().saturating_sub(1));
        if target == from {
            return Mutation::unchanged(self);
        }
        let inverse = layout.rearrange_inverse();
        let (mut item, was_today) = layout.take(from);
        let in_today = target < layout.line || (was_today && target == layout.line);
        item.touch();
        layout.place(item, target, in_today);
        self.commit(layout, Some(inverse))
    }

    /// Move the line itself. Selections are not coerced; callers that need
    /// them to match follow up with [`reorder`](Self::reorder).
    pub fn move_line(&self, new_index: usize) -> Mutation {
        let mut layout = self.layout();
        let line = new_index.min(layout.active.len());
        if line == layout.line {
            return Mutation::unchanged(self);
        }
        let inverse = layout.rearrange_inverse();
        layout.line = line;
        self.commit(layout, Some(inverse))
    }

    /// Replace the whole arrangement. Unknown ids are ignored, active items
    /// missing from `order` keep their relative order after the listed ones,
    /// and every selection is coerced to its new side.
    pub fn reorder(&self, order: &[QueueItemId], today_line_index: usize) -> Mutation {
        let mut layout = self.layout();
        let inverse = layout.rearrange_inverse();
        let mut remaining = std::mem::take(&mut layout.active);
        let mut arranged = Vec::with_capacity(remaining.len());
        for id in order {
            if let Some(idx) = remaining.iter().position(|item| item.id == *id) {
                arranged.push(remaining.remove(idx));
            }
        }
        arranged.extend(remaining);
        let line = today_line_index.min(arranged.len());
        for (idx, item) in arranged.iter_mut().enumerate() {
            item.selection = item.selection.clone().for_side(idx < line);
        }
        let unchanged = line == layout.line
            && arranged
                .iter()
                .zip(self.active_items())
                .all(|(a, b)| a.id == b.id && a.selection == b.selection);
        if unchanged {
            return Mutation::unchanged(self);
        }
        layout.active = arranged;
        layout.line = line;
        self.commit(layout, Some(inverse))
    }

    /// Change how much of a task is in focus. A selection that wants today on
    /// an Upcoming item moves it to the bottom of Today; a selection that does
    /// not want today on a Today item moves it to the top of Upcoming.
    pub fn update_step_selection(&self, item_id: QueueItemId, selection: StepSelection) -> Mutation {
        let mut layout = self.layout();
        let Some(from) = layout.position(item_id) else {
            return Mutation::unchanged(self);
        };
        let in_today = from < layout.line;
        let wants_today = selection.wants_today();
        let selection = selection.for_side(wants_today);
        if in_today == wants_today && layout.active[from].selection == selection {
            return Mutation::unchanged(self);
        }
        let inverse = layout.rearrange_inverse();
        if in_today == wants_today {
            let item = &mut layout.active[from];
            item.selection = selection;
            item.touch();
        } else {
            let (mut item, _) = layout.take(from);
            item.selection = selection;
            item.touch();
            let at = layout.line;
            layout.place(item, at, wants_today);
        }
        self.commit(layout, Some(inverse))
    }

    /// Apply a captured undo action.
    ///
    /// The action must not be older than `policy.max_intervening` mutations.
    /// Within that window it is applied best-effort: withdrawn items that are
    /// already gone are ignored, reinstated items land on their original side,
    /// and rearranged layouts skip ids that no longer exist.
    ///
    /// # Errors
    /// Returns [`UndoError::Stale`] when the action is outside the window.
    pub fn revert(&self, action: &UndoAction, policy: UndoPolicy) -> Result<Mutation, UndoError> {
        let stale = || UndoError::Stale {
            recorded: action.recorded_version,
            current: self.version,
            allowed: policy.max_intervening,
        };
        let intervening = self.version.checked_sub(action.recorded_version).ok_or_else(stale)?;
        if intervening > policy.max_intervening {
            return Err(stale());
        }
        Ok(match &action.inverse {
            Inverse::Withdraw { item_id } => {
                let mut mutation = self.remove(*item_id);
                mutation.undo = None;
                mutation
            }
            Inverse::Reinstate {
                item,
                position,
                was_today,
            } => self.reinstate(item, *position, *was_today),
            Inverse::Rearrange {
                layout,
                today_line_index,
            } => self.rearrange(layout, *today_line_index),
        })
    }

    fn reinstate(&self, item: &FocusQueueItem, position: usize, was_today: bool) -> Mutation {
        let taken = self
            .active_items()
            .any(|other| other.task_id == item.task_id && other.id != item.id);
        if taken {
            return Mutation::unchanged(self);
        }
        let mut layout = self.layout();
        if let Some(pos) = layout.position(item.id) {
            layout.take(pos);
        }
        layout.retired.retain(|other| other.id != item.id);
        let mut restored = item.clone();
        restored.completed = false;
        layout.place(restored, position, was_today);
        self.commit(layout, None)
    }

    fn rearrange(&self, wanted: &[(QueueItemId, StepSelection)], line: usize) -> Mutation {
        let mut layout = self.layout();
        let mut remaining = std::mem::take(&mut layout.active);
        let mut arranged = Vec::with_capacity(remaining.len());
        for (id, selection) in wanted {
            if let Some(idx) = remaining.iter().position(|item| item.id == *id) {
                let mut item = remaining.remove(idx);
                item.selection = selection.clone();
                arranged.push(item);
            }
        }
        arranged.extend(remaining);
        let line = line.min(arranged.len());
        for (idx, item) in arranged.iter_mut().enumerate() {
            item.selection = item.selection.clone().for_side(idx < line);
        }
        layout.active = arranged;
        layout.line = line;
        self.commit(layout, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(tasks: &[TaskId], line: usize) -> FocusQueue {
        let mut queue = FocusQueue::new();
        for task in tasks {
            queue = queue.add(*task, true, None).queue;
        }
        let order: Vec<_> = queue.active_items().map(|item| item.id).collect();
        queue.reorder(&order, line).queue
    }

    fn ids(queue: &FocusQueue) -> Vec<TaskId> {
        queue.active_items().map(|item| item.task_id).collect()
    }

    fn item_of(queue: &FocusQueue, task: TaskId) -> QueueItemId {
        queue
            .item_for_task(task)
            .map(|item| item.id)
            .unwrap_or_else(|| panic!("task {task} must be queued"))
    }

    #[test]
    fn add_for_today_inserts_above_the_line() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b], 1);
        let next = queue.add(c, true, None).queue;
        assert_eq!(ids(&next), vec![a, c, b]);
        assert_eq!(next.today_line_index(), 2);
        assert_eq!(next.item_for_task(c).map(|i| i.selection.clone()), Some(StepSelection::AllToday));
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn add_for_later_inserts_below_the_line() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b], 1);
        let next = queue.add(c, false, None).queue;
        assert_eq!(ids(&next), vec![a, c, b]);
        assert_eq!(next.today_line_index(), 1);
        assert_eq!(
            next.item_for_task(c).map(|i| i.selection.clone()),
            Some(StepSelection::AllUpcoming)
        );
    }

    #[test]
    fn add_coerces_step_selection_for_upcoming() {
        let task = TaskId::new();
        let next = FocusQueue::new()
            .add(task, false, Some(StepSelection::steps([StepId::new()])))
            .queue;
        assert_eq!(
            next.item_for_task(task).map(|i| i.selection.clone()),
            Some(StepSelection::AllUpcoming)
        );
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let task = TaskId::new();
        let queue = FocusQueue::new().add(task, true, None).queue;
        let again = queue.add(task, false, None);
        assert!(!again.applied);
        assert!(again.undo.is_none());
        assert_eq!(again.queue, queue);
    }

    #[test]
    fn remove_above_line_pulls_line_up() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 2);
        let next = queue.remove(item_of(&queue, a)).queue;
        assert_eq!(ids(&next), vec![b, c]);
        assert_eq!(next.today_line_index(), 1);
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn remove_unknown_item_is_a_no_op() {
        let queue = queue_with(&[TaskId::new()], 1);
        let mutation = queue.remove(QueueItemId::new());
        assert!(!mutation.applied);
        assert_eq!(mutation.queue.version(), queue.version());
    }

    #[test]
    fn move_down_across_the_line_coerces_selection() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 1);
        let item = item_of(&queue, a);
        let queue = queue
            .update_step_selection(item, StepSelection::steps([StepId::new()]))
            .queue;

        let next = queue.move_down(item).queue;
        assert_eq!(ids(&next), vec![b, a, c]);
        assert_eq!(next.today_line_index(), 0);
        assert_eq!(next.item(item).map(|i| i.selection.clone()), Some(StepSelection::AllUpcoming));
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn move_up_across_the_line_pulls_item_into_today() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 1);
        let next = queue.move_up(item_of(&queue, b)).queue;
        assert_eq!(ids(&next), vec![b, a, c]);
        assert_eq!(next.today_line_index(), 2);
        assert_eq!(next.item_for_task(b).map(|i| i.selection.clone()), Some(StepSelection::AllToday));
    }

    #[test]
    fn moves_at_the_edges_are_no_ops() {
        let (a, b) = (TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b], 1);
        assert!(!queue.move_up(item_of(&queue, a)).applied);
        assert!(!queue.move_down(item_of(&queue, b)).applied);
    }

    #[test]
    fn move_to_index_within_today_stays_today() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 2);
        let next = queue.move_to_index(item_of(&queue, a), 1).queue;
        assert_eq!(ids(&next), vec![b, a, c]);
        assert_eq!(next.today_line_index(), 2);
    }

    #[test]
    fn move_to_index_clamps() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 3);
        let next = queue.move_to_index(item_of(&queue, a), 99).queue;
        assert_eq!(ids(&next), vec![b, c, a]);
        assert_eq!(next.today_line_index(), 3);
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn move_line_does_not_coerce() {
        let (a, b) = (TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b], 2);
        let next = queue.move_line(0).queue;
        assert_eq!(next.today_line_index(), 0);
        assert_eq!(next.item_for_task(a).map(|i| i.selection.clone()), Some(StepSelection::AllToday));
        assert!(queue.move_line(99).queue.today_line_index() <= 2);
    }

    #[test]
    fn reorder_recomputes_every_selection() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 1);
        let order = [item_of(&queue, c), item_of(&queue, a), item_of(&queue, b)];
        let next = queue.reorder(&order, 2).queue;
        assert_eq!(ids(&next), vec![c, a, b]);
        assert_eq!(next.item_for_task(c).map(|i| i.selection.clone()), Some(StepSelection::AllToday));
        assert_eq!(next.item_for_task(b).map(|i| i.selection.clone()), Some(StepSelection::AllUpcoming));
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn selection_change_relocates_across_the_line() {
        let (a, b, c) = (TaskId::new(), TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b, c], 1);
        let item = item_of(&queue, c);
        let step = StepId::new();
        let next = queue.update_step_selection(item, StepSelection::steps([step])).queue;
        assert_eq!(ids(&next), vec![a, c, b]);
        assert_eq!(next.today_line_index(), 2);

        let back = next.update_step_selection(item, StepSelection::AllUpcoming).queue;
        assert_eq!(ids(&back), vec![a, c, b]);
        assert_eq!(back.today_line_index(), 1);
        assert!(back.check_invariants().is_ok());
    }

    #[test]
    fn empty_step_selection_counts_as_upcoming() {
        let a = TaskId::new();
        let queue = queue_with(&[a], 1);
        let next = queue
            .update_step_selection(item_of(&queue, a), StepSelection::steps([]))
            .queue;
        assert_eq!(next.today_line_index(), 0);
        assert_eq!(next.item_for_task(a).map(|i| i.selection.clone()), Some(StepSelection::AllUpcoming));
    }

    #[test]
    fn complete_item_keeps_history() {
        let (a, b) = (TaskId::new(), TaskId::new());
        let queue = queue_with(&[a, b], 1);
        let item = item_of(&queue, a);
        let next = queue.complete_item(item).queue;
        assert_eq!(ids(&next), vec![b]);
        assert_eq!(next.today_line_index(), 0);
        assert!(next.item(item).is_some_and(|i| i.completed));
        assert!(!next.contains_task(a));
        // The task can be queued again.
        assert!(next.add(a, true, None).applied);
    }

    #[test]
    fn strict_policy_rejects_stale_undo() {
        let (a, b) = (TaskId::new(), TaskId::new());
        let first = FocusQueue::new().add(a, true, None);
        let second = first.queue.add(b, true, None);
        let Some(undo) = first.undo else {
            panic!("add must produce undo");
        };
        assert!(matches!(
            second.queue.revert(&undo, UndoPolicy::default()),
            Err(UndoError::Stale { .. })
        ));
        let lenient = UndoPolicy { max_intervening: 1 };
        let reverted = second
            .queue
            .revert(&undo, lenient)
            .unwrap_or_else(|err| panic!("lenient undo: {err}"));
        assert_eq!(ids(&reverted.queue), vec![b]);
        assert_eq!(reverted.queue.today_line_index(), 1);
    }

    #[test]
    fn from_parts_repairs_invariants() {
        let (a, b) = (TaskId::new(), TaskId::new());
        let mut first = FocusQueueItem::new(a, StepSelection::AllUpcoming);
        first.order = 7;
        let mut second = FocusQueueItem::new(b, StepSelection::steps([StepId::new()]));
        second.order = 9;
        let dup = FocusQueueItem::new(a, StepSelection::AllToday);
        let queue = FocusQueue::from_parts(vec![second, dup, first], 1);
        assert!(queue.check_invariants().is_ok());
        assert_eq!(queue.active_len(), 2);
        assert_eq!(queue.today_line_index(), 1);
    }
}
