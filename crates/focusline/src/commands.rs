use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use focusline_app::{
    CalendarDay, CreateTaskInput, FocusService, MemoryTaskStore, MutationOutcome, RoutineOutcome,
    TaskStore, UndoOutcome, UndoToken,
};
use focusline_core::{
    DayPattern, FocusQueue, FocusQueueItem, OccurrenceStatus, QueueItemId, RecurrenceRule,
    StepSelection, Task, TaskId,
};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration};

use crate::{Command, QueueCmd, RoutineCmd, TaskCmd};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

type Service = FocusService<MemoryTaskStore>;

pub fn run(command: Command, service: &mut Service) -> Result<()> {
    match command {
        Command::Task(cmd) => run_task(cmd, service),
        Command::Queue(cmd) => run_queue(cmd, service),
        Command::Routine(cmd) => run_routine(cmd, service),
        Command::Undo { token } => {
            let outcome = match token {
                Some(raw) => service.undo(parse_token(&raw)?)?,
                None => service.undo_latest()?,
            };
            match outcome {
                UndoOutcome::Reverted { label } => println!("undone: {label}"),
                UndoOutcome::Stale { label } => {
                    println!("cannot undo {label}: other changes happened since");
                }
                UndoOutcome::Unknown => println!("nothing to undo"),
            }
            Ok(())
        }
    }
}

fn run_task(cmd: TaskCmd, service: &mut Service) -> Result<()> {
    match cmd {
        TaskCmd::New {
            title,
            steps,
            every,
            start,
            end,
            rollover,
        } => {
            let recurrence = every
                .map(|raw| {
                    build_rule(
                        &raw,
                        start.as_deref(),
                        end.as_deref(),
                        rollover,
                        service.today(),
                    )
                })
                .transpose()?;
            let task = service.create_task(CreateTaskInput {
                title,
                steps,
                recurrence,
            })?;
            println!("created task: {}", task.id);
        }
        TaskCmd::Show { task } => {
            let task = find_task(service, &task)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskCmd::Ls => {
            let mut tasks = service.store().list()?;
            tasks.retain(|task| !task.is_deleted());
            if tasks.is_empty() {
                println!("No tasks found");
                return Ok(());
            }
            render_task_table(&tasks, service.queue());
        }
    }
    Ok(())
}

fn run_queue(cmd: QueueCmd, service: &mut Service) -> Result<()> {
    match cmd {
        QueueCmd::Show => render_queue(service)?,
        QueueCmd::Add {
            task,
            upcoming,
            steps,
        } => {
            let task = find_task(service, &task)?;
            let selection = if steps.is_empty() {
                None
            } else {
                Some(select_steps(&task, &steps)?)
            };
            let outcome = service.add_to_queue(task.id, !upcoming, selection)?;
            report(&format!("queued \"{}\"", task.title), &outcome);
        }
        QueueCmd::Rm { item } => {
            let item = find_item(service, &item)?;
            report("removed", &service.remove_from_queue(item));
        }
        QueueCmd::Done { item } => {
            let item = find_item(service, &item)?;
            report("completed", &service.complete_item(item)?);
        }
        QueueCmd::Up { item } => {
            let item = find_item(service, &item)?;
            report("moved up", &service.move_up(item));
        }
        QueueCmd::Down { item } => {
            let item = find_item(service, &item)?;
            report("moved down", &service.move_down(item));
        }
        QueueCmd::Move { item, position } => {
            let item = find_item(service, &item)?;
            let index = to_index(position)?;
            report("moved", &service.move_to_index(item, index));
        }
        QueueCmd::Line { index } => {
            report("moved the line", &service.move_line(index));
        }
        QueueCmd::Select {
            item,
            upcoming,
            steps,
        } => {
            let item = find_item(service, &item)?;
            let selection = if upcoming {
                StepSelection::AllUpcoming
            } else if steps.is_empty() {
                StepSelection::AllToday
            } else {
                let task_id = service
                    .queue()
                    .item(item)
                    .map(|item| item.task_id)
                    .ok_or_else(|| anyhow!("item {item} is not queued"))?;
                let task = service.store().get(task_id)?;
                select_steps(&task, &steps)?
            };
            report(
                "updated selection",
                &service.update_step_selection(item, selection),
            );
        }
    }
    Ok(())
}

fn run_routine(cmd: RoutineCmd, service: &mut Service) -> Result<()> {
    match cmd {
        RoutineCmd::Complete { task, on } => {
            let task = find_task(service, &task)?;
            let outcome = service.complete_routine(task.id, parse_optional_date(on.as_deref())?)?;
            report_routine("completed", &outcome);
        }
        RoutineCmd::Skip { task, on } => {
            let task = find_task(service, &task)?;
            let outcome = service.skip_routine(task.id, parse_optional_date(on.as_deref())?)?;
            report_routine("skipped", &outcome);
        }
        RoutineCmd::Incomplete { task, on } => {
            let task = find_task(service, &task)?;
            let outcome =
                service.mark_routine_incomplete(task.id, parse_optional_date(on.as_deref())?)?;
            report_routine("reopened", &outcome);
        }
        RoutineCmd::Reset { task, on } => {
            let task = find_task(service, &task)?;
            let outcome = service.reset_routine_day(task.id, parse_date(&on)?)?;
            report_routine("reset", &outcome);
        }
        RoutineCmd::Step { task, index, on } => {
            let task = find_task(service, &task)?;
            let outcome = service.toggle_routine_step(
                task.id,
                parse_optional_date(on.as_deref())?,
                to_index(index)?,
            )?;
            report_routine("toggled step", &outcome);
        }
        RoutineCmd::Calendar { task, from, to } => {
            let task = find_task(service, &task)?;
            let today = service.today();
            let start = match from {
                Some(raw) => parse_date(&raw)?,
                None => today.saturating_sub(Duration::days(14)),
            };
            let end = match to {
                Some(raw) => parse_date(&raw)?,
                None => today.saturating_add(Duration::days(7)),
            };
            if end < start {
                bail!("--to must not be before --from");
            }
            let days = service.calendar(task.id, start, end)?;
            render_calendar(&task, &days);
        }
    }
    Ok(())
}

fn build_rule(
    every: &str,
    start: Option<&str>,
    end: Option<&str>,
    rollover: bool,
    today: Date,
) -> Result<RecurrenceRule> {
    let pattern = DayPattern::from_str(every).with_context(|| format!("Invalid pattern: {every}"))?;
    let start = parse_optional_date(start)?.unwrap_or(today);
    let mut rule = RecurrenceRule::new(start, pattern);
    if rollover {
        rule = rule.rolling_over();
    }
    if let Some(end) = parse_optional_date(end)? {
        if end < start {
            bail!("--end must not be before --start");
        }
        rule = rule.ending(end);
    }
    Ok(rule)
}

fn parse_date(raw: &str) -> Result<Date> {
    Date::parse(raw, DATE_FORMAT).with_context(|| format!("Invalid date (want YYYY-MM-DD): {raw}"))
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<Date>> {
    raw.map(parse_date).transpose()
}

fn parse_token(raw: &str) -> Result<UndoToken> {
    let digits = raw.trim().trim_start_matches('#');
    digits
        .parse()
        .map(UndoToken)
        .with_context(|| format!("Invalid undo token: {raw}"))
}

/// Convert a 1-based position from the command line.
fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}

/// Resolve a full task id or an unambiguous prefix of one.
fn resolve_task_id(tasks: &[Task], raw: &str) -> Result<TaskId> {
    if let Ok(id) = TaskId::from_str(raw) {
        return Ok(id);
    }
    let prefix = raw.trim().to_lowercase();
    if prefix.is_empty() {
        bail!("Empty task id");
    }
    let mut matches = tasks
        .iter()
        .filter(|task| task.id.to_string().starts_with(&prefix))
        .map(|task| task.id);
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (Some(_), Some(_)) => bail!("Task id prefix is ambiguous: {raw}"),
        (None, _) => bail!("No task matches: {raw}"),
    }
}

fn find_task(service: &Service, raw: &str) -> Result<Task> {
    let tasks = service.store().list()?;
    let id = resolve_task_id(&tasks, raw)?;
    Ok(service.store().get(id)?)
}

/// A bare number is a 1-based queue position; anything else names a task.
fn resolve_item(queue: &FocusQueue, tasks: &[Task], raw: &str) -> Result<QueueItemId> {
    if let Ok(position) = raw.trim().parse::<usize>() {
        let index = to_index(position)?;
        return queue
            .active_items()
            .nth(index)
            .map(|item| item.id)
            .ok_or_else(|| anyhow!("No queue item at position {position}"));
    }
    let task_id = resolve_task_id(tasks, raw)?;
    queue
        .item_for_task(task_id)
        .map(|item| item.id)
        .ok_or_else(|| anyhow!("Task {task_id} is not queued"))
}

fn find_item(service: &Service, raw: &str) -> Result<QueueItemId> {
    let tasks = service.store().list()?;
    resolve_item(service.queue(), &tasks, raw)
}

/// Map 1-based step numbers to a selection of the task's checklist.
fn select_steps(task: &Task, positions: &[usize]) -> Result<StepSelection> {
    let ids = positions
        .iter()
        .map(|&position| {
            to_index(position)
                .ok()
                .and_then(|index| task.steps.get(index))
                .map(|step| step.id)
                .ok_or_else(|| anyhow!("\"{}\" has no step {position}", task.title))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(StepSelection::steps(ids))
}

fn report(what: &str, outcome: &MutationOutcome) {
    if !outcome.applied {
        println!("nothing changed");
        return;
    }
    match outcome.token {
        Some(token) => println!("{what} (undo with `focusline undo {token}`)"),
        None => println!("{what}"),
    }
}

fn report_routine(what: &str, outcome: &RoutineOutcome) {
    let Some(date) = outcome.date else {
        println!("no occurrence to act on");
        return;
    };
    if outcome.outcome.applied {
        report(&format!("{what} {} on {date}", outcome.task.title), &outcome.outcome);
        println!(
            "streak {} (best {}), next due {}",
            outcome.task.recurring_streak,
            outcome.task.recurring_best_streak,
            outcome
                .task
                .recurring_next_due
                .map_or_else(|| "-".to_owned(), |date| date.to_string())
        );
    } else {
        println!("nothing changed on {date}");
    }
}

fn render_task_table(tasks: &[Task], queue: &FocusQueue) {
    println!("ID | Status | Title | Routine | Streak | Queued");
    println!("-- | ------ | ----- | ------- | ------ | ------");
    for task in tasks {
        let routine = task
            .rule()
            .map_or_else(|| "-".to_owned(), |rule| rule.pattern.to_string());
        let streak = if task.is_recurring {
            format!("{} (best {})", task.recurring_streak, task.recurring_best_streak)
        } else {
            "-".to_owned()
        };
        let queued = match queue.item_for_task(task.id) {
            Some(item) if queue.is_today(item.id) == Some(true) => "today",
            Some(_) => "upcoming",
            None => "-",
        };
        println!(
            "{} | {} | {} | {} | {} | {}",
            task.id,
            task.status.as_str(),
            task.title,
            routine,
            streak,
            queued
        );
    }
}

fn render_queue(service: &Service) -> Result<()> {
    let queue = service.queue();
    if queue.active_len() == 0 {
        println!("Queue is empty");
        return Ok(());
    }
    println!("Today");
    for (index, item) in queue.active_items().enumerate() {
        if index == queue.today_line_index() {
            println!("---------------- line");
            println!("Upcoming");
        }
        let task = service.store().get(item.task_id)?;
        println!("{:>3}. {}{}", index + 1, task.title, selection_note(&task, item));
    }
    if queue.today_line_index() == queue.active_len() {
        println!("---------------- line");
    }
    Ok(())
}

fn selection_note(task: &Task, item: &FocusQueueItem) -> String {
    match &item.selection {
        StepSelection::SpecificSteps { step_ids } => {
            let names = task
                .steps
                .iter()
                .filter(|step| step_ids.contains(&step.id))
                .map(|step| step.text.as_str())
                .collect::<Vec<_>>();
            format!(" [{}]", names.join(", "))
        }
        StepSelection::AllToday | StepSelection::AllUpcoming => String::new(),
    }
}

const fn status_symbol(status: OccurrenceStatus) -> &'static str {
    match status {
        OccurrenceStatus::NoOccurrence => " ",
        OccurrenceStatus::Completed => "x",
        OccurrenceStatus::Skipped => "~",
        OccurrenceStatus::Today => "*",
        OccurrenceStatus::Overdue => "!",
        OccurrenceStatus::Missed => "-",
        OccurrenceStatus::Pending => ".",
    }
}

fn render_calendar(task: &Task, days: &[CalendarDay]) {
    println!("{}", task.title);
    for day in days {
        if day.status == OccurrenceStatus::NoOccurrence {
            continue;
        }
        let steps = if day.steps_total == 0 {
            String::new()
        } else {
            format!(" {}/{}", day.steps_done, day.steps_total)
        };
        println!(
            "{} {} {}{steps}",
            day.date,
            status_symbol(day.status),
            day.date.weekday()
        );
    }
    println!("x done  ~ skipped  * today  ! overdue  - missed  . pending");
}
