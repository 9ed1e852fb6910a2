//! CLI entry point for focusline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use focusline_app::{FocusConfig, TracingScheduler, find_root};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use state::StateFile;

mod commands;
mod state;

/// Plan today from one focus queue and keep routines on track.
#[derive(Parser, Debug)]
#[command(
    name = "focusline",
    version,
    about = "focusline: a Today/Upcoming focus queue with recurring routines and streaks"
)]
struct Cli {
    /// Workspace directory or any subdir (defaults to current).
    #[arg(long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and inspect tasks.
    #[command(subcommand)]
    Task(TaskCmd),

    /// Arrange the focus queue.
    #[command(subcommand)]
    Queue(QueueCmd),

    /// Resolve routine occurrences.
    #[command(subcommand)]
    Routine(RoutineCmd),

    /// Revert a recorded change (the latest when no token is given).
    Undo {
        /// Token printed after the change, with or without `#`.
        token: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCmd {
    /// Create a new task.
    New {
        #[arg(long)]
        title: String,
        /// Checklist entry; repeat for more.
        #[arg(short = 's', long = "step")]
        steps: Vec<String>,
        /// Recurrence: daily, weekdays, weekly:mon,wed, monthly:15 or every:3d.
        #[arg(long)]
        every: Option<String>,
        /// First day of the routine (defaults to today).
        #[arg(long, requires = "every")]
        start: Option<String>,
        /// Last day of the routine.
        #[arg(long, requires = "every")]
        end: Option<String>,
        /// Keep missed occurrences actionable.
        #[arg(long, requires = "every")]
        rollover: bool,
    },

    /// Show a task as JSON.
    Show { task: String },

    /// List tasks.
    Ls,
}

#[derive(Subcommand, Debug)]
enum QueueCmd {
    /// Show Today and Upcoming.
    Show,

    /// Queue a task.
    Add {
        task: String,
        /// Queue below the line instead of for today.
        #[arg(long)]
        upcoming: bool,
        /// Focus only on these steps (1-based); implies today.
        #[arg(long = "step", conflicts_with = "upcoming")]
        steps: Vec<usize>,
    },

    /// Take an item out of the queue.
    Rm { item: String },

    /// Complete an item.
    Done { item: String },

    /// Move an item up one slot.
    Up { item: String },

    /// Move an item down one slot.
    Down { item: String },

    /// Move an item to a 1-based position.
    Move { item: String, position: usize },

    /// Put the line after this many items.
    Line { index: usize },

    /// Change how much of a task is in focus.
    Select {
        item: String,
        /// Whole task, later.
        #[arg(long, conflicts_with = "steps")]
        upcoming: bool,
        /// Only these steps (1-based); whole task today when omitted.
        #[arg(long = "step")]
        steps: Vec<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum RoutineCmd {
    /// Complete the active occurrence.
    Complete {
        task: String,
        #[arg(long)]
        on: Option<String>,
    },

    /// Skip the active occurrence.
    Skip {
        task: String,
        #[arg(long)]
        on: Option<String>,
    },

    /// Reopen the latest resolved occurrence.
    Incomplete {
        task: String,
        #[arg(long)]
        on: Option<String>,
    },

    /// Re-clone a day's checklist from the template.
    Reset {
        task: String,
        #[arg(long)]
        on: String,
    },

    /// Tick or untick a step (1-based) of a day's checklist.
    Step {
        task: String,
        index: usize,
        #[arg(long)]
        on: Option<String>,
    },

    /// Print day statuses.
    Calendar {
        task: String,
        /// First day (defaults to two weeks ago).
        #[arg(long)]
        from: Option<String>,
        /// Last day (defaults to a week ahead).
        #[arg(long)]
        to: Option<String>,
    },
}

impl Command {
    const fn mutates(&self) -> bool {
        !matches!(
            self,
            Self::Task(TaskCmd::Show { .. } | TaskCmd::Ls)
                | Self::Queue(QueueCmd::Show)
                | Self::Routine(RoutineCmd::Calendar { .. })
        )
    }
}

fn main() -> Result<()> {
    let Cli { dir, cmd } = Cli::parse();
    install_tracing();

    let start = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let root = find_root(&start).unwrap_or(start);
    execute_command(&root, cmd)
}

fn execute_command(root: &std::path::Path, command: Command) -> Result<()> {
    let config = FocusConfig::from_workdir(root)?;
    let mutates = command.mutates();
    let mut service = StateFile::load(root)?
        .into_service(config)
        .with_scheduler(TracingScheduler);
    commands::run(command, &mut service)?;
    if mutates {
        StateFile::from_service(service).save(root)?;
    }
    Ok(())
}

fn install_tracing() {
    // RUST_LOG overrides; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_new_routine_command() {
        let cli = Cli::parse_from([
            "focusline",
            "--dir",
            ".",
            "task",
            "new",
            "--title",
            "Stretch",
            "--step",
            "neck",
            "--every",
            "weekly:mon,thu",
            "--rollover",
        ]);

        match cli.cmd {
            Command::Task(TaskCmd::New {
                title,
                steps,
                every,
                rollover,
                ..
            }) => {
                assert_eq!(title, "Stretch");
                assert_eq!(steps, vec!["neck"]);
                assert_eq!(every.as_deref(), Some("weekly:mon,thu"));
                assert!(rollover);
            }
            _ => panic!("expected task new command"),
        }
    }

    #[test]
    fn rollover_requires_a_pattern() {
        let result = Cli::try_parse_from(["focusline", "task", "new", "--title", "x", "--rollover"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_queue_add_with_steps() {
        let cli = Cli::parse_from(["focusline", "queue", "add", "abc", "--step", "1", "--step", "3"]);
        match cli.cmd {
            Command::Queue(QueueCmd::Add { task, upcoming, steps }) => {
                assert_eq!(task, "abc");
                assert!(!upcoming);
                assert_eq!(steps, vec![1, 3]);
            }
            _ => panic!("expected queue add command"),
        }
    }

    #[test]
    fn parse_undo_without_token() {
        let cli = Cli::parse_from(["focusline", "undo"]);
        match cli.cmd {
            Command::Undo { token } => assert!(token.is_none()),
            _ => panic!("expected undo command"),
        }
    }

    #[test]
    fn read_only_commands_skip_saving() {
        assert!(!Command::Queue(QueueCmd::Show).mutates());
        assert!(!Command::Task(TaskCmd::Ls).mutates());
        assert!(Command::Queue(QueueCmd::Line { index: 1 }).mutates());
        assert!(Command::Undo { token: None }.mutates());
    }
}
