use std::collections::{BTreeMap, BTreeSet};

use focusline_core::{Step, Task, TaskInstance, TaskStatus};
use time::Date;

/// Difference between two sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// Entries present in the desired set but missing from the current set.
    pub added: Vec<T>,
    /// Entries present in the current set but removed from the desired set.
    pub removed: Vec<T>,
}

impl<T> Default for SetDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> SetDiff<T> {
    /// Returns true when both added/removed are empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute differences between two sets.
#[must_use]
pub fn diff_sets<T: Ord + Clone>(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> SetDiff<T> {
    SetDiff {
        added: desired.difference(current).cloned().collect(),
        removed: current.difference(desired).cloned().collect(),
    }
}

/// Derived routine counters, written together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineStats {
    /// Current streak.
    pub streak: u32,
    /// Best streak.
    pub best_streak: u32,
    /// Completed occurrences.
    pub total_completions: u32,
    /// Latest completed occurrence.
    pub last_completed: Option<Date>,
    /// Next occurrence needing attention.
    pub next_due: Option<Date>,
}

impl RoutineStats {
    fn of(task: &Task) -> Self {
        Self {
            streak: task.recurring_streak,
            best_streak: task.recurring_best_streak,
            total_completions: task.recurring_total_completions,
            last_completed: task.recurring_last_completed,
            next_due: task.recurring_next_due,
        }
    }

    const fn write(self, task: &mut Task) {
        task.recurring_streak = self.streak;
        task.recurring_best_streak = self.best_streak;
        task.recurring_total_completions = self.total_completions;
        task.recurring_last_completed = self.last_completed;
        task.recurring_next_due = self.next_due;
    }
}

/// Field-level change set between two versions of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// Title change (if any).
    pub title: Option<String>,
    /// Status change (if any).
    pub status: Option<TaskStatus>,
    /// Replacement template steps (if changed).
    pub steps: Option<Vec<Step>>,
    /// Instances written in full, keyed by date.
    pub instances: Vec<TaskInstance>,
    /// Dates whose instance was dropped.
    pub removed_instances: Vec<Date>,
    /// Counter change (if any).
    pub stats: Option<RoutineStats>,
}

impl TaskPatch {
    /// Compute the patch turning `before` into `after`.
    #[must_use]
    pub fn between(before: &Task, after: &Task) -> Self {
        let mut patch = Self::default();
        if before.title != after.title {
            patch.title = Some(after.title.clone());
        }
        if before.status != after.status {
            patch.status = Some(after.status);
        }
        if before.steps != after.steps {
            patch.steps = Some(after.steps.clone());
        }

        let old: BTreeMap<Date, &TaskInstance> =
            before.recurring_instances.iter().map(|inst| (inst.date, inst)).collect();
        let new: BTreeMap<Date, &TaskInstance> =
            after.recurring_instances.iter().map(|inst| (inst.date, inst)).collect();
        let old_dates: BTreeSet<Date> = old.keys().copied().collect();
        let new_dates: BTreeSet<Date> = new.keys().copied().collect();
        let dates = diff_sets(&old_dates, &new_dates);
        patch.removed_instances = dates.removed;
        patch.instances = new
            .iter()
            .filter(|(date, inst)| old.get(*date) != Some(*inst))
            .map(|(_, inst)| (*inst).clone())
            .collect();

        let stats = RoutineStats::of(after);
        if RoutineStats::of(before) != stats {
            patch.stats = Some(stats);
        }
        patch
    }

    /// Returns true when applying the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.steps.is_none()
            && self.instances.is_empty()
            && self.removed_instances.is_empty()
            && self.stats.is_none()
    }

    /// Write the patch onto `task`, keeping instances sorted and unique.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(steps) = &self.steps {
            task.steps.clone_from(steps);
        }
        task.recurring_instances
            .retain(|inst| !self.removed_instances.contains(&inst.date));
        for inst in &self.instances {
            match task
                .recurring_instances
                .binary_search_by_key(&inst.date, |existing| existing.date)
            {
                Ok(idx) => task.recurring_instances[idx] = inst.clone(),
                Err(idx) => task.recurring_instances.insert(idx, inst.clone()),
            }
        }
        if let Some(stats) = self.stats {
            stats.write(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusline_core::{DayPattern, Ledger, RecurrenceRule, StreakPolicy};
    use time::macros::{date, datetime};

    fn routine() -> Task {
        Task::new("stretch")
            .with_steps(["neck", "back"])
            .with_recurrence(RecurrenceRule::new(date!(2024 - 06 - 01), DayPattern::Daily))
    }

    #[test]
    fn patch_is_empty_when_fields_match() {
        let task = routine();
        assert!(TaskPatch::between(&task, &task.clone()).is_empty());
    }

    #[test]
    fn patch_detects_title_and_status_changes() {
        let before = Task::new("Old");
        let mut after = before.clone();
        after.title = "New".into();
        after.status = TaskStatus::Pool;
        let patch = TaskPatch::between(&before, &after);
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.status, Some(TaskStatus::Pool));
        assert!(patch.stats.is_none());
    }

    #[test]
    fn ledger_change_round_trips_through_patch() {
        let before = routine();
        let ledger = Ledger::new(
            date!(2024 - 06 - 03),
            datetime!(2024-06-03 09:00 UTC),
            StreakPolicy::default(),
        );
        let after = ledger.mark_complete(&ledger.mark_complete(&before, date!(2024 - 06 - 02)), date!(2024 - 06 - 03));

        let patch = TaskPatch::between(&before, &after);
        assert_eq!(patch.instances.len(), 2);
        assert!(patch.removed_instances.is_empty());
        assert_eq!(patch.stats.map(|s| s.streak), Some(2));

        let mut replay = before;
        patch.apply_to(&mut replay);
        assert_eq!(replay, after);
    }

    #[test]
    fn reverse_patch_drops_new_instances() {
        let before = routine();
        let ledger = Ledger::new(
            date!(2024 - 06 - 01),
            datetime!(2024-06-01 09:00 UTC),
            StreakPolicy::default(),
        );
        let after = ledger.mark_skipped(&before, date!(2024 - 06 - 01));

        let undo = TaskPatch::between(&after, &before);
        assert_eq!(undo.removed_instances, vec![date!(2024 - 06 - 01)]);
        let mut restored = after;
        undo.apply_to(&mut restored);
        assert_eq!(restored, before);
    }

    #[test]
    fn diff_sets_detects_added_and_removed_items() {
        let current = BTreeSet::from(["a".to_string(), "b".to_string()]);
        let desired = BTreeSet::from(["b".to_string(), "c".to_string()]);

        let diff = diff_sets(&current, &desired);
        assert_eq!(diff.added, vec!["c"]);
        assert_eq!(diff.removed, vec!["a"]);
    }
}
