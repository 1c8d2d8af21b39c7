//! Minute-of-day load accounting for a single calendar day.

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{LocalNow, calendar_day};
use crate::task::{MINUTES_PER_DAY, Task};

/// Span `[start, end]` in minutes of a day, `start < end <= 1440`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    /// `None` for empty, inverted or out-of-day spans.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start < end && end <= MINUTES_PER_DAY).then_some(Self { start, end })
    }

    pub fn len(self) -> u32 {
        self.end - self.start
    }

    pub fn overlaps(self, start: u32, end: u32) -> bool {
        self.start < end && start < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport<'a> {
    pub day: NaiveDate,
    pub cutoff: u32,
    pub committed_minutes: u32,
    /// Remaining minutes after the cutoff minus committed time.
    pub free_minutes: i64,
    pub overload_minutes: u32,
    pub merged_intervals: Vec<Interval>,
    pub candidates: Vec<&'a Task>,
}

impl LoadReport<'_> {
    pub fn is_overloaded(&self) -> bool {
        self.overload_minutes > 0
    }
}

/// Where a candidate's time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    SameDay,
    /// Due the day before with a window crossing midnight.
    Carryover,
}

#[tracing::instrument(skip(tasks, now, tz), fields(day = %target_day, tasks = tasks.len()))]
pub fn compute_load<'a>(
    tasks: &'a [Task],
    target_day: NaiveDate,
    now: Option<LocalNow>,
    tz: &Tz,
) -> LoadReport<'a> {
    let cutoff = now
        .filter(|now| now.day == target_day)
        .map_or(0, |now| now.minute.min(MINUTES_PER_DAY));
    let previous_day = target_day - Duration::days(1);

    let mut candidates = Vec::new();
    let mut raw = Vec::new();
    for task in tasks.iter().filter(|task| !task.is_completed) {
        let Some(due) = task.due_date else {
            continue;
        };
        let due_day = calendar_day(due, tz);
        let origin = if due_day == target_day {
            Origin::SameDay
        } else if due_day == previous_day && task.crosses_midnight() {
            Origin::Carryover
        } else {
            continue;
        };

        candidates.push(task);
        if let Some(span) = raw_span(task, origin, cutoff) {
            raw.push(span);
        }
    }

    let clipped: Vec<Interval> = raw
        .into_iter()
        .filter_map(|(start, end)| clip(start, end, cutoff))
        .collect();
    let merged_intervals = merge_intervals(&clipped);
    let committed_minutes: u32 = merged_intervals.iter().map(|iv| iv.len()).sum();
    let free_minutes = i64::from(MINUTES_PER_DAY - cutoff) - i64::from(committed_minutes);
    let overload_minutes = u32::try_from(-free_minutes).unwrap_or(0);

    debug!(
        cutoff,
        candidates = candidates.len(),
        runs = merged_intervals.len(),
        committed_minutes,
        free_minutes,
        "computed day load"
    );

    LoadReport {
        day: target_day,
        cutoff,
        committed_minutes,
        free_minutes,
        overload_minutes,
        merged_intervals,
        candidates,
    }
}

fn raw_span(task: &Task, origin: Origin, cutoff: u32) -> Option<(u32, u32)> {
    match (origin, task.window()) {
        (Origin::Carryover, Some((_, end))) => Some((0, end.minute_of_day())),
        (Origin::Carryover, None) => None,
        (Origin::SameDay, Some((start, end))) => {
            let (start, end) = (start.minute_of_day(), end.minute_of_day());
            if end < start {
                Some((start, MINUTES_PER_DAY))
            } else {
                Some((start, end))
            }
        }
        (Origin::SameDay, None) => task
            .duration
            .filter(|&minutes| minutes > 0)
            .map(|minutes| (cutoff, cutoff.saturating_add(minutes).min(MINUTES_PER_DAY))),
    }
}

fn clip(start: u32, end: u32, cutoff: u32) -> Option<Interval> {
    if end <= cutoff {
        return None;
    }
    Interval::new(start.max(cutoff), end)
}

/// Sorts by start and sweeps, joining runs that overlap or touch.
/// Applying it to its own output changes nothing.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for next in sorted {
        match merged.last_mut() {
            Some(run) if next.start <= run.end => run.end = run.end.max(next.end),
            _ => merged.push(next),
        }
    }
    merged
}

/// Unclipped display block of one task on the target day.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskBlock<'a> {
    pub task: &'a Task,
    pub interval: Interval,
}

/// Per-task blocks for a timeline, ignoring the cutoff, sorted by start.
pub fn task_blocks<'a>(report: &LoadReport<'a>, tz: &Tz) -> Vec<TaskBlock<'a>> {
    let mut blocks: Vec<TaskBlock<'a>> = report
        .candidates
        .iter()
        .filter_map(|&task| {
            let origin = match task.due_date.map(|due| calendar_day(due, tz)) {
                Some(day) if day == report.day => Origin::SameDay,
                _ => Origin::Carryover,
            };
            let (start, end) = raw_span(task, origin, report.cutoff)?;
            Interval::new(start, end).map(|interval| TaskBlock { task, interval })
        })
        .collect();
    blocks.sort_by_key(|block| block.interval.start);
    blocks
}

/// Whether each hour of the day touches a committed run.
pub fn hour_steps(merged: &[Interval]) -> [bool; 24] {
    let mut steps = [false; 24];
    for (hour, step) in steps.iter_mut().enumerate() {
        let start = hour as u32 * 60;
        *step = merged.iter().any(|iv| iv.overlaps(start, start + 60));
    }
    steps
}

/// Timed, incomplete tasks whose own window overlaps `[start, end)`.
pub fn tasks_in_slot<'a, I>(tasks: I, start: u32, end: u32) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| !task.is_completed)
        .filter(|task| {
            task.window().is_some_and(|(from, to)| {
                let (from, to) = (from.minute_of_day(), to.minute_of_day());
                if to < from {
                    from < end || start < to
                } else {
                    from < end && start < to
                }
            })
        })
        .collect()
}

/// Planned length: the window (plus a day when it crosses midnight),
/// else the duration.
pub fn task_span_minutes(task: &Task) -> u32 {
    match task.window() {
        Some((start, end)) => {
            let (start, end) = (start.minute_of_day(), end.minute_of_day());
            if end < start {
                end + MINUTES_PER_DAY - start
            } else {
                end - start
            }
        }
        None => task.duration.unwrap_or(0),
    }
}

pub fn format_minutes(minutes: u32) -> String {
    let (hours, mins) = (minutes / 60, minutes % 60);
    match (hours, mins) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
