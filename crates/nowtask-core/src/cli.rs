use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::bucket::SortPreference;
use crate::task::{ClockTime, Priority};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nowtask",
    version,
    about = "nowtask: tasks grouped by day, with a 24-hour load gauge",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a configuration key for this run.
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[arg(long = "rc", value_name = "FILE", global = true)]
    pub rc: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task, optionally as a subtask.
    Add(AddArgs),
    /// Show open tasks grouped by day.
    List(ListArgs),
    /// Show committed and free time for a day.
    Gauge(GaugeArgs),
    /// Move a task to a row position and indent level of the list.
    Move(MoveArgs),
    /// Mark a task completed.
    Done(IdArg),
    /// Push a task's due date to tomorrow.
    Postpone(IdArg),
}

impl Default for Command {
    fn default() -> Self {
        Command::List(ListArgs::default())
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    /// YYYY-MM-DD, today, tomorrow, a weekday name or +Nd.
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub start: Option<ClockTime>,

    #[arg(long)]
    pub end: Option<ClockTime>,

    /// Planned minutes when there is no explicit window.
    #[arg(long)]
    pub duration: Option<u32>,

    /// Id (or unique prefix) of the parent task.
    #[arg(long)]
    pub parent: Option<String>,

    #[arg(long)]
    pub urgent: bool,

    #[arg(long)]
    pub priority: Option<Priority>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long)]
    pub sort: Option<SortPreference>,

    /// Expand overdue and yesterday's tasks.
    #[arg(long)]
    pub past: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GaugeArgs {
    /// Day to inspect; defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Also list the tasks scheduled in this hour (0-23).
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    pub id: String,

    /// Row number as printed by `list`.
    #[arg(long)]
    pub position: usize,

    /// Indent level, 0 for a top-level task.
    #[arg(long)]
    pub level: usize,

    /// Date section the task is dropped into (top-level moves only).
    #[arg(long, conflicts_with = "undated")]
    pub date: Option<String>,

    /// Drop into the undated section (top-level moves only).
    #[arg(long)]
    pub undated: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IdArg {
    pub id: String,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
