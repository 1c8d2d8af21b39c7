//! Groups dated tasks by calendar day relative to a reference day.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;

use crate::datetime::calendar_day;
use crate::task::Task;

pub const YESTERDAY_KEY: &str = "yesterday";
pub const TODAY_KEY: &str = "today";
pub const TOMORROW_KEY: &str = "tomorrow";
const OVERDUE_PREFIX: &str = "overdue_";
const FUTURE_PREFIX: &str = "future_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortPreference {
    #[default]
    Time,
    Created,
    Priority,
}

impl SortPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            SortPreference::Time => "time",
            SortPreference::Created => "created",
            SortPreference::Priority => "priority",
        }
    }
}

impl fmt::Display for SortPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" | "due" => Ok(SortPreference::Time),
            "created" | "new" => Ok(SortPreference::Created),
            "priority" => Ok(SortPreference::Priority),
            other => Err(anyhow!(
                "unknown sort preference: {other} (expected time, created or priority)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<'a> {
    pub key: String,
    pub day: NaiveDate,
    pub label: String,
    pub tasks: Vec<&'a Task>,
}

impl Bucket<'_> {
    /// Overdue days and yesterday.
    pub fn is_past(&self) -> bool {
        self.key.starts_with(OVERDUE_PREFIX) || self.key == YESTERDAY_KEY
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSections<'a> {
    pub past: Vec<Bucket<'a>>,
    pub upcoming: Vec<Bucket<'a>>,
}

impl BucketSections<'_> {
    pub fn past_task_count(&self) -> usize {
        self.past.iter().map(|bucket| bucket.tasks.len()).sum()
    }
}

pub fn bucket_key(day: NaiveDate, today: NaiveDate) -> String {
    match (day - today).num_days() {
        -1 => YESTERDAY_KEY.to_string(),
        0 => TODAY_KEY.to_string(),
        1 => TOMORROW_KEY.to_string(),
        n if n < -1 => format!("{OVERDUE_PREFIX}{}", day.format("%Y-%m-%d")),
        _ => format!("{FUTURE_PREFIX}{}", day.format("%Y-%m-%d")),
    }
}

/// Heading shown above a bucket, e.g. `Today · Sun Oct 18`.
pub fn bucket_label(day: NaiveDate, today: NaiveDate) -> String {
    let date = day.format("%a %b %-d");
    match (day - today).num_days() {
        -1 => format!("Yesterday · {date}"),
        0 => format!("Today · {date}"),
        1 => format!("Tomorrow · {date}"),
        n if n < -1 => format!("{date} (overdue)"),
        _ => date.to_string(),
    }
}

/// Short label for the gauge header, e.g. `10/20 (Tue)`.
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if day == today + Duration::days(1) {
        "Tomorrow".to_string()
    } else if day == today - Duration::days(1) {
        "Yesterday".to_string()
    } else {
        day.format("%-m/%-d (%a)").to_string()
    }
}

/// Partitions the dated tasks among day buckets ordered by day. Undated
/// tasks are left out; callers filter completed tasks beforehand when they
/// want an active view.
#[tracing::instrument(skip(tasks, tz), fields(today = %reference_today, sort = %sort))]
pub fn bucketize<'a, I>(
    tasks: I,
    reference_today: NaiveDate,
    sort: SortPreference,
    tz: &Tz,
) -> Vec<Bucket<'a>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut by_day: BTreeMap<NaiveDate, Vec<&'a Task>> = BTreeMap::new();
    for task in tasks {
        if let Some(due) = task.due_date {
            by_day.entry(calendar_day(due, tz)).or_default().push(task);
        }
    }

    let buckets: Vec<Bucket<'a>> = by_day
        .into_iter()
        .map(|(day, mut tasks)| {
            sort_tasks(&mut tasks, sort);
            Bucket {
                key: bucket_key(day, reference_today),
                day,
                label: bucket_label(day, reference_today),
                tasks,
            }
        })
        .collect();

    tracing::debug!(buckets = buckets.len(), "bucketized tasks");
    buckets
}

/// Stable in-place sort for one bucket.
pub fn sort_tasks(tasks: &mut [&Task], sort: SortPreference) {
    match sort {
        SortPreference::Time => tasks.sort_by_key(|task| (task.due_date.is_none(), task.due_date)),
        SortPreference::Created => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortPreference::Priority => {
            tasks.sort_by_key(|task| (!task.urgent, task.priority.tier()));
        }
    }
}

pub fn split_past(buckets: Vec<Bucket<'_>>) -> BucketSections<'_> {
    let (past, upcoming): (Vec<_>, Vec<_>) = buckets.into_iter().partition(Bucket::is_past);
    BucketSections { past, upcoming }
}
