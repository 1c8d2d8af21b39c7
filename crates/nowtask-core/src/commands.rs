use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::bucket::SortPreference;
use crate::cli::{AddArgs, Command, GaugeArgs, IdArg, ListArgs, MoveArgs};
use crate::config::Config;
use crate::datetime::{LocalNow, day_start_utc, parse_day_expr};
use crate::forest::Forest;
use crate::gauge::GaugeEngine;
use crate::hierarchy::can_have_subtask;
use crate::listing::Listing;
use crate::render::Renderer;
use crate::reparent::{DropTarget, MoveIntent, MoveOutcome, resolve_reparent};
use crate::rollup::apply_rollups;
use crate::schedule::tasks_in_slot;
use crate::store::{CollectionStore, TASKS_KEY};
use crate::task::{ClockTime, Priority, Task, TaskId};

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch(
    store: &dyn CollectionStore,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: Tz,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(store, &tz, args, now),
        Command::List(args) => cmd_list(store, cfg, renderer, &tz, args, now),
        Command::Gauge(args) => cmd_gauge(store, cfg, renderer, &tz, args, now),
        Command::Move(args) => cmd_move(store, cfg, &tz, args, now),
        Command::Done(IdArg { id }) => cmd_done(store, &id, now),
        Command::Postpone(IdArg { id }) => cmd_postpone(store, &tz, &id, now),
    }
}

/// Exact id, else a unique id prefix.
pub fn find_task<'a>(tasks: &'a [Task], needle: &str) -> anyhow::Result<&'a Task> {
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }
    if let Some(task) = tasks.iter().find(|task| task.id.as_str() == needle) {
        return Ok(task);
    }

    let mut matches = tasks.iter().filter(|task| task.id.as_str().starts_with(needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {needle}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix {needle} is ambiguous"));
    }
    Ok(first)
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub due_date: Option<DateTime<Utc>>,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub duration: Option<u32>,
    pub parent: Option<TaskId>,
    pub urgent: bool,
    pub priority: Priority,
}

/// Builds a task ready to append to `tasks`, checking the parent link.
pub fn create_task(tasks: &[Task], draft: NewTask, now: DateTime<Utc>) -> anyhow::Result<Task> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(anyhow!("task title cannot be empty"));
    }

    if let Some(parent) = draft.parent.as_ref() {
        let forest = Forest::new(tasks);
        if !can_have_subtask(&forest, parent)? {
            return Err(anyhow!(
                "task {parent} is already at the deepest level and cannot take subtasks"
            ));
        }
    }

    let mut task = Task::new(title.to_string(), now);
    task.parent_id = draft.parent;
    task.due_date = draft.due_date;
    task.start_time = draft.start_time;
    task.end_time = draft.end_time;
    task.duration = draft.duration.filter(|&minutes| minutes > 0);
    task.urgent = draft.urgent;
    task.priority = draft.priority;
    task.custom_order = tasks.iter().map(|t| t.custom_order + 1).max().unwrap_or(0);
    Ok(task)
}

fn load_tasks(store: &dyn CollectionStore) -> anyhow::Result<Vec<Task>> {
    store.get(TASKS_KEY).context("failed to load tasks")
}

fn save_tasks(store: &dyn CollectionStore, tasks: &[Task]) -> anyhow::Result<()> {
    store.set(TASKS_KEY, tasks).context("failed to save tasks")
}

fn sort_preference(
    cfg: &Config,
    requested: Option<SortPreference>,
) -> anyhow::Result<SortPreference> {
    match requested {
        Some(sort) => Ok(sort),
        None => cfg.sort_preference(),
    }
}

#[instrument(skip(store, tz, args, now))]
fn cmd_add(
    store: &dyn CollectionStore,
    tz: &Tz,
    args: AddArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let mut tasks = load_tasks(store)?;
    let today = LocalNow::at(now, tz).day;

    let due_date = args
        .due
        .as_deref()
        .map(|raw| parse_day_expr(raw, today).map(|day| day_start_utc(day, tz)))
        .transpose()?;
    let parent = args
        .parent
        .as_deref()
        .map(|needle| find_task(&tasks, needle).map(|task| task.id.clone()))
        .transpose()?;

    let draft = NewTask {
        title: args.title.join(" "),
        due_date,
        start_time: args.start,
        end_time: args.end,
        duration: args.duration,
        parent,
        urgent: args.urgent,
        priority: args.priority.unwrap_or_default(),
    };
    let task = create_task(&tasks, draft, now)?;
    let created = task.id.clone();
    let parent = task.parent_id.clone();
    tasks.push(task);

    if let Some(parent) = parent.as_ref() {
        apply_rollups(&mut tasks, [parent], now);
    }
    save_tasks(store, &tasks)?;

    debug!(count = tasks.len(), "task added");
    println!("Created task {created}.");
    Ok(())
}

#[instrument(skip(store, cfg, renderer, tz, args, now))]
fn cmd_list(
    store: &dyn CollectionStore,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: &Tz,
    args: ListArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let tasks = load_tasks(store)?;
    let sort = sort_preference(cfg, args.sort)?;
    let show_past = args.past || cfg.get_bool("list.past.open").unwrap_or(false);
    let today = LocalNow::at(now, tz).day;

    let listing = Listing::build(&tasks, today, sort, tz);
    renderer.print_listing(&listing, show_past)
}

#[instrument(skip(store, cfg, renderer, tz, args, now))]
fn cmd_gauge(
    store: &dyn CollectionStore,
    cfg: &Config,
    renderer: &mut Renderer,
    tz: &Tz,
    args: GaugeArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command gauge");

    let tasks = load_tasks(store)?;
    let local_now = LocalNow::at(now, tz);
    let day = match args.date.as_deref() {
        Some(raw) => parse_day_expr(raw, local_now.day)?,
        None => local_now.day,
    };

    let mut engine = GaugeEngine::new(*tz);
    let reading = engine.evaluate(&tasks, day, Some(local_now), sort_preference(cfg, None)?);

    let slot_tasks = args.hour.map(|hour| {
        let start = hour * 60;
        tasks_in_slot(reading.load.candidates.iter().copied(), start, start + 60)
    });
    let slot = args.hour.zip(slot_tasks.as_deref());
    renderer.print_gauge(&reading, local_now.day, slot)
}

#[instrument(skip(store, cfg, tz, args, now), fields(id = %args.id))]
fn cmd_move(
    store: &dyn CollectionStore,
    cfg: &Config,
    tz: &Tz,
    args: MoveArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command move");

    let tasks = load_tasks(store)?;
    let today = LocalNow::at(now, tz).day;
    let task_id = find_task(&tasks, &args.id)?.id.clone();

    let listing = Listing::build(&tasks, today, sort_preference(cfg, None)?, tz);
    let intent = MoveIntent::relocate(&listing.ordering(), &task_id, args.position, args.level)
        .with_context(|| format!("task {task_id} is not in the open task list"))?;
    let intent = match (args.date.as_deref(), args.undated) {
        (Some(raw), _) => intent.with_drop_target(DropTarget::Day(parse_day_expr(raw, today)?)),
        (None, true) => intent.with_drop_target(DropTarget::Undated),
        (None, false) => match listing.drop_target_for(&intent) {
            Some(target) => intent.with_drop_target(target),
            None => intent,
        },
    };
    let dropped_level = intent
        .ordering
        .iter()
        .find(|placement| placement.id == task_id)
        .map_or(0, |placement| placement.level);
    if intent.drop_target.is_some() && dropped_level > 0 {
        warn!(level = dropped_level, "date target ignored for a subtask move");
    }

    match resolve_reparent(&tasks, &intent, tz, now)? {
        MoveOutcome::Accepted(commit) => {
            let mut updated = commit.tasks;
            if commit.reparented {
                let parents = [commit.previous_parent.as_ref(), commit.new_parent.as_ref()];
                apply_rollups(&mut updated, parents.into_iter().flatten(), now);
            }
            save_tasks(store, &updated)?;

            let placement = match commit.new_parent.as_ref() {
                Some(parent) => format!("under {parent}"),
                None => "at top level".to_string(),
            };
            println!("Moved task {} {placement}.", short_id_of(&commit.task_id));
            if commit.redated {
                println!("Due date updated.");
            }
        }
        MoveOutcome::Rejected {
            task_id, reason, ..
        } => {
            println!(
                "Move rejected ({}): {reason}. Task {} left in place.",
                reason.code(),
                short_id_of(&task_id)
            );
        }
    }
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_done(store: &dyn CollectionStore, id: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command done");

    let mut tasks = load_tasks(store)?;
    let target = find_task(&tasks, id)?.id.clone();
    let task = tasks
        .iter_mut()
        .find(|task| task.id == target)
        .ok_or_else(|| anyhow!("task not found: {target}"))?;

    if task.is_completed {
        println!("Task {} is already completed.", short_id_of(&target));
        return Ok(());
    }
    task.is_completed = true;
    task.is_timer_running = false;
    task.updated_at = now;

    save_tasks(store, &tasks)?;
    println!("Completed task {}.", short_id_of(&target));
    Ok(())
}

#[instrument(skip(store, tz, now))]
fn cmd_postpone(
    store: &dyn CollectionStore,
    tz: &Tz,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command postpone");

    let mut tasks = load_tasks(store)?;
    let target = find_task(&tasks, id)?.id.clone();
    let tomorrow = LocalNow::at(now, tz).day + Duration::days(1);
    let task = tasks
        .iter_mut()
        .find(|task| task.id == target)
        .ok_or_else(|| anyhow!("task not found: {target}"))?;

    task.due_date = Some(day_start_utc(tomorrow, tz));
    task.updated_at = now;

    save_tasks(store, &tasks)?;
    println!(
        "Postponed task {} to {}.",
        short_id_of(&target),
        tomorrow.format("%Y-%m-%d")
    );
    Ok(())
}

fn short_id_of(id: &TaskId) -> &str {
    let raw = id.as_str();
    raw.get(..8).unwrap_or(raw)
}
