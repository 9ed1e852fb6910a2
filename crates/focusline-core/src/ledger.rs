//! Per-date instance records and streak bookkeeping for routines.
//!
//! Every operation takes the task by reference and returns the updated copy.
//! Current streaks are always re-derived from the instance history; only the
//! best streak carries forward from the stored value.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::id::StepId;
use crate::recurrence::{self, days_between};
use crate::task::{Resolution, Step, Task};

/// How skipped occurrences affect streaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakPolicy {
    /// `true`: a skip ends the run. `false`: a skip pauses it.
    pub skipped_breaks_streak: bool,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self {
            skipped_breaks_streak: true,
        }
    }
}

/// Length of the run ending at the most recent resolved occurrence.
///
/// The walk starts at the latest completed or skipped occurrence on or before
/// `today`, so open days after it do not count against the run. Any
/// unresolved occurrence further back ends it.
#[must_use]
pub fn calculate_streak(task: &Task, today: Date, policy: StreakPolicy) -> u32 {
    let Some(rule) = task.rule() else {
        return 0;
    };
    let Some(anchor) = latest_resolved(task, today) else {
        return 0;
    };
    let mut streak = 0;
    let mut cursor = Some(anchor);
    while let Some(date) = cursor.filter(|d| *d >= rule.start_date) {
        if rule.occurs_on(date) {
            match task.resolution_on(date) {
                Resolution::Completed => streak += 1,
                Resolution::Skipped if policy.skipped_breaks_streak => break,
                Resolution::Skipped => {}
                Resolution::Unresolved => break,
            }
        }
        cursor = date.previous_day();
    }
    streak
}

/// Latest occurrence on or before `today` that was completed or skipped.
fn latest_resolved(task: &Task, today: Date) -> Option<Date> {
    let rule = task.rule()?;
    task.recurring_instances
        .iter()
        .rev()
        .filter(|inst| inst.date <= today && rule.occurs_on(inst.date))
        .find(|inst| inst.resolution() != Resolution::Unresolved)
        .map(|inst| inst.date)
}

/// Longest run anywhere in the history up to `today`.
#[must_use]
pub fn longest_streak(task: &Task, today: Date, policy: StreakPolicy) -> u32 {
    let Some(rule) = task.rule() else {
        return 0;
    };
    let mut best = 0;
    let mut run = 0;
    for date in days_between(rule.start_date, today) {
        if !rule.occurs_on(date) {
            continue;
        }
        match task.resolution_on(date) {
            Resolution::Completed => {
                run += 1;
                best = best.max(run);
            }
            Resolution::Skipped if policy.skipped_breaks_streak => run = 0,
            Resolution::Skipped => {}
            Resolution::Unresolved if date == today => {}
            Resolution::Unresolved => run = 0,
        }
    }
    best
}

/// How the best streak is refreshed after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BestStreak {
    /// Only ever raise the stored value.
    Raise,
    /// Recount from history, possibly lowering it.
    Recount,
}

/// Applies routine resolutions for a fixed `today`/`now`.
#[derive(Debug, Clone, Copy)]
pub struct Ledger {
    today: Date,
    now: OffsetDateTime,
    policy: StreakPolicy,
}

impl Ledger {
    /// Ledger evaluating streaks relative to `today`.
    #[must_use]
    pub const fn new(today: Date, now: OffsetDateTime, policy: StreakPolicy) -> Self {
        Self { today, now, policy }
    }

    /// Day the ledger treats as today.
    #[must_use]
    pub const fn today(&self) -> Date {
        self.today
    }

    /// Streak policy in effect.
    #[must_use]
    pub const fn policy(&self) -> StreakPolicy {
        self.policy
    }

    /// Whether `date` can be resolved: the task repeats, the rule selects the
    /// day, and the day is not in the future.
    #[must_use]
    pub fn accepts(&self, task: &Task, date: Date) -> bool {
        date <= self.today && task.rule().is_some_and(|rule| rule.occurs_on(date))
    }

    /// Mark `date` completed. Completing an already completed day changes nothing
    /// beyond the completion timestamp.
    #[must_use]
    pub fn mark_complete(&self, task: &Task, date: Date) -> Task {
        if !self.accepts(task, date) {
            return task.clone();
        }
        let mut next = task.clone();
        let instance = next.instance_mut(date);
        if !instance.completed {
            instance.completed_at = Some(self.now);
        }
        instance.completed = true;
        instance.skipped = false;
        self.refresh(&mut next, BestStreak::Raise);
        next
    }

    /// Mark `date` skipped. A completed day is left as it is; reopen it with
    /// [`mark_incomplete`](Self::mark_incomplete) first.
    #[must_use]
    pub fn mark_skipped(&self, task: &Task, date: Date) -> Task {
        if !self.accepts(task, date) || task.resolution_on(date) == Resolution::Completed {
            return task.clone();
        }
        let mut next = task.clone();
        next.instance_mut(date).skipped = true;
        self.refresh(&mut next, BestStreak::Raise);
        next
    }

    /// Clear any resolution recorded for `date` and recount everything.
    #[must_use]
    pub fn mark_incomplete(&self, task: &Task, date: Date) -> Task {
        if task.instance(date).is_none() {
            return task.clone();
        }
        let mut next = task.clone();
        let instance = next.instance_mut(date);
        instance.completed = false;
        instance.completed_at = None;
        instance.skipped = false;
        self.refresh(&mut next, BestStreak::Recount);
        next
    }

    /// Replace the day's steps with fresh copies of the current template.
    /// Resolution flags are kept.
    #[must_use]
    pub fn reset_from_template(&self, task: &Task, date: Date) -> Task {
        if !self.accepts(task, date) {
            return task.clone();
        }
        let mut next = task.clone();
        let template = next.steps.clone();
        let instance = next.instance_mut(date);
        instance.steps = template.iter().map(Step::fresh_copy).collect();
        next
    }

    /// Tick or untick one step of the day's snapshot.
    #[must_use]
    pub fn set_instance_step(&self, task: &Task, date: Date, step: StepId, completed: bool) -> Task {
        if !self.accepts(task, date) {
            return task.clone();
        }
        let mut next = task.clone();
        let instance = next.instance_mut(date);
        match instance.steps.iter_mut().find(|s| s.id == step) {
            Some(target) => target.completed = completed,
            None => return task.clone(),
        }
        next
    }

    /// Recompute the derived counters without recording anything, e.g. when a
    /// new day starts or a routine is first created.
    #[must_use]
    pub fn refreshed(&self, task: &Task) -> Task {
        let mut next = task.clone();
        if next.rule().is_some() {
            self.refresh(&mut next, BestStreak::Raise);
        }
        next
    }

    fn refresh(&self, task: &mut Task, best: BestStreak) {
        let current = calculate_streak(task, self.today, self.policy);
        let longest = longest_streak(task, self.today, self.policy);
        task.recurring_streak = current;
        task.recurring_best_streak = match best {
            BestStreak::Raise => task.recurring_best_streak.max(longest).max(current),
            BestStreak::Recount => longest.max(current),
        };
        let completed = task.recurring_instances.iter().filter(|inst| inst.completed);
        task.recurring_total_completions =
            u32::try_from(completed.clone().count()).unwrap_or(u32::MAX);
        task.recurring_last_completed = completed.map(|inst| inst.date).max();
        task.recurring_next_due = recurrence::next_due(task, self.today);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{DayPattern, RecurrenceRule};
    use time::macros::{date, datetime};

    fn ledger(today: Date) -> Ledger {
        Ledger::new(today, datetime!(2024-05-10 08:00 UTC), StreakPolicy::default())
    }

    fn daily(start: Date) -> Task {
        Task::new("meditate")
            .with_steps(["sit", "breathe"])
            .with_recurrence(RecurrenceRule::new(start, DayPattern::Daily))
    }

    #[test]
    fn skip_breaks_the_streak_but_not_the_best() {
        let today = date!(2024 - 05 - 06);
        let ledger = ledger(today);
        let mut task = daily(date!(2024 - 05 - 01));
        for day in [date!(2024 - 05 - 01), date!(2024 - 05 - 02), date!(2024 - 05 - 03)] {
            task = ledger.mark_complete(&task, day);
        }
        task = ledger.mark_skipped(&task, date!(2024 - 05 - 04));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 05));

        assert_eq!(calculate_streak(&task, today, StreakPolicy::default()), 1);
        assert_eq!(task.recurring_streak, 1);
        assert_eq!(task.recurring_best_streak, 3);
        assert_eq!(task.recurring_total_completions, 4);
        assert_eq!(task.recurring_last_completed, Some(date!(2024 - 05 - 05)));
        assert_eq!(task.recurring_next_due, Some(today));
    }

    #[test]
    fn pausing_policy_walks_over_skips() {
        let today = date!(2024 - 05 - 05);
        let policy = StreakPolicy {
            skipped_breaks_streak: false,
        };
        let ledger = Ledger::new(today, datetime!(2024-05-05 08:00 UTC), policy);
        let mut task = daily(date!(2024 - 05 - 01));
        for day in [date!(2024 - 05 - 01), date!(2024 - 05 - 02), date!(2024 - 05 - 03)] {
            task = ledger.mark_complete(&task, day);
        }
        task = ledger.mark_skipped(&task, date!(2024 - 05 - 04));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 05));
        assert_eq!(task.recurring_streak, 4);
        assert_eq!(task.recurring_best_streak, 4);
    }

    #[test]
    fn completing_twice_is_idempotent() {
        let today = date!(2024 - 05 - 02);
        let ledger = ledger(today);
        let task = daily(date!(2024 - 05 - 01));
        let once = ledger.mark_complete(&task, today);
        let twice = ledger.mark_complete(&once, today);
        assert_eq!(once.recurring_total_completions, 1);
        assert_eq!(twice.recurring_total_completions, 1);
        assert_eq!(twice.recurring_instances.len(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn open_days_after_the_last_resolution_keep_the_run() {
        let today = date!(2024 - 05 - 07);
        let ledger = ledger(today);
        let mut task = daily(date!(2024 - 05 - 01));
        for day in [date!(2024 - 05 - 01), date!(2024 - 05 - 02), date!(2024 - 05 - 03)] {
            task = ledger.mark_complete(&task, day);
        }
        task = ledger.mark_skipped(&task, date!(2024 - 05 - 04));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 05));
        // The 6th is still open.

        assert_eq!(calculate_streak(&task, today, StreakPolicy::default()), 1);
        assert_eq!(task.recurring_streak, 1);
        assert_eq!(task.recurring_best_streak, 3);
        assert_eq!(ledger.refreshed(&task).recurring_streak, 1);
    }

    #[test]
    fn unresolved_gap_before_the_last_resolution_breaks_the_streak() {
        let today = date!(2024 - 05 - 06);
        let ledger = ledger(today);
        let mut task = daily(date!(2024 - 05 - 01));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 01));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 02));
        // 3rd never resolved.
        task = ledger.mark_complete(&task, date!(2024 - 05 - 04));
        assert_eq!(calculate_streak(&task, today, StreakPolicy::default()), 1);
        assert_eq!(longest_streak(&task, today, StreakPolicy::default()), 2);
    }

    #[test]
    fn nothing_resolved_means_no_streak() {
        let today = date!(2024 - 05 - 04);
        let task = daily(date!(2024 - 05 - 01));
        assert_eq!(calculate_streak(&task, today, StreakPolicy::default()), 0);
    }

    #[test]
    fn skipping_a_completed_day_keeps_it_completed() {
        let today = date!(2024 - 05 - 03);
        let ledger = ledger(today);
        let mut task = daily(date!(2024 - 05 - 01));
        task = ledger.mark_complete(&task, date!(2024 - 05 - 02));
        let skipped = ledger.mark_skipped(&task, date!(2024 - 05 - 02));
        assert_eq!(skipped, task);
        assert_eq!(skipped.recurring_total_completions, 1);

        let reopened = ledger.mark_incomplete(&task, date!(2024 - 05 - 02));
        let skipped = ledger.mark_skipped(&reopened, date!(2024 - 05 - 02));
        assert_eq!(skipped.resolution_on(date!(2024 - 05 - 02)), Resolution::Skipped);
        assert_eq!(skipped.recurring_total_completions, 0);
    }

    #[test]
    fn days_without_occurrence_do_not_break_the_streak() {
        let today = date!(2024 - 06 - 12);
        let ledger = ledger(today);
        let rule = RecurrenceRule::new(
            date!(2024 - 06 - 03),
            "weekly:mon,wed".parse().unwrap_or(DayPattern::Daily),
        );
        let mut task = Task::new("run").with_recurrence(rule);
        for day in [date!(2024 - 06 - 03), date!(2024 - 06 - 05), date!(2024 - 06 - 10)] {
            task = ledger.mark_complete(&task, day);
        }
        // Wednesday the 12th is due but still open.
        assert_eq!(task.recurring_streak, 3);
        assert_eq!(task.recurring_next_due, Some(today));
    }

    #[test]
    fn mark_incomplete_recounts_best_and_totals() {
        let today = date!(2024 - 05 - 04);
        let ledger = ledger(today);
        let mut task = daily(date!(2024 - 05 - 01));
        for day in [date!(2024 - 05 - 01), date!(2024 - 05 - 02), date!(2024 - 05 - 03)] {
            task = ledger.mark_complete(&task, day);
        }
        assert_eq!(task.recurring_best_streak, 3);

        let corrected = ledger.mark_incomplete(&task, date!(2024 - 05 - 02));
        assert_eq!(corrected.recurring_total_completions, 2);
        // The 3rd still counts; the reopened 2nd ends the run there.
        assert_eq!(corrected.recurring_streak, 1);
        assert_eq!(corrected.recurring_best_streak, 1);
        assert_eq!(corrected.recurring_last_completed, Some(date!(2024 - 05 - 03)));

        let restored = ledger.mark_complete(&corrected, date!(2024 - 05 - 02));
        assert_eq!(restored.recurring_best_streak, 3);
        assert_eq!(restored.recurring_streak, 3);
    }

    #[test]
    fn future_and_unselected_days_are_ignored() {
        let today = date!(2024 - 05 - 02);
        let ledger = ledger(today);
        let task = daily(date!(2024 - 05 - 01));
        assert_eq!(ledger.mark_complete(&task, date!(2024 - 05 - 03)), task);
        assert_eq!(ledger.mark_complete(&task, date!(2024 - 04 - 30)), task);
        assert_eq!(ledger.mark_incomplete(&task, date!(2024 - 05 - 01)), task);
        let one_off = Task::new("call bank");
        assert_eq!(ledger.mark_complete(&one_off, today), one_off);
    }

    #[test]
    fn reset_from_template_reclones_steps_and_keeps_resolution() {
        let today = date!(2024 - 05 - 02);
        let ledger = ledger(today);
        let task = daily(date!(2024 - 05 - 01));
        let first_step = task.steps[0].id;

        let done = ledger.mark_complete(&task, today);
        let day_step = done.instance(today).map(|inst| inst.steps[0].id).unwrap_or(first_step);
        let ticked = ledger.set_instance_step(&done, today, day_step, true);
        assert!(ticked.instance(today).is_some_and(|inst| inst.steps[0].completed));
        assert!(!ticked.steps[0].completed);

        let reset = ledger.reset_from_template(&ticked, today);
        let inst = reset.instance(today).unwrap_or_else(|| panic!("instance kept"));
        assert!(inst.completed);
        assert!(inst.steps.iter().all(|s| !s.completed));
        assert_ne!(inst.steps[0].id, day_step);
        assert_ne!(inst.steps[0].id, first_step);
    }

    #[test]
    fn rollover_next_due_points_at_backlog() {
        let today = date!(2024 - 05 - 03);
        let ledger = ledger(today);
        let rule = RecurrenceRule::new(date!(2024 - 05 - 01), DayPattern::Daily).rolling_over();
        let task = Task::new("inbox zero").with_recurrence(rule);
        let done = ledger.mark_complete(&task, date!(2024 - 05 - 01));
        assert_eq!(done.recurring_next_due, Some(date!(2024 - 05 - 02)));
    }

    #[test]
    fn refreshed_fills_next_due_for_new_routines() {
        let ledger = ledger(date!(2024 - 05 - 03));
        let rule = RecurrenceRule::new(date!(2024 - 05 - 05), DayPattern::Daily);
        let task = ledger.refreshed(&Task::new("journal").with_recurrence(rule));
        assert_eq!(task.recurring_next_due, Some(date!(2024 - 05 - 05)));
        assert_eq!(task.recurring_streak, 0);
        assert_eq!(ledger.refreshed(&Task::new("one-off")).recurring_next_due, None);
    }
}
