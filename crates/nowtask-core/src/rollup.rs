use chrono::{DateTime, Utc};
use tracing::debug;

use crate::forest::Forest;
use crate::task::{ClockTime, Task, TaskId};

/// Summary window a parent would take from its direct subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolledWindow {
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
}

/// Earliest subtask start and latest subtask end for `parent_id`.
///
/// `None` when the parent has a time of its own, or when none of its direct
/// subtasks has a start or an end.
pub fn roll_up_window(forest: &Forest<'_>, parent_id: &TaskId) -> Option<RolledWindow> {
    let parent = forest.get(parent_id)?;
    if parent.start_time.is_some() || parent.end_time.is_some() {
        return None;
    }

    let mut start: Option<ClockTime> = None;
    let mut end: Option<ClockTime> = None;
    for child in forest.children(parent_id) {
        if let Some(s) = child.start_time {
            start = Some(start.map_or(s, |cur| cur.min(s)));
        }
        if let Some(e) = child.end_time {
            end = Some(end.map_or(e, |cur| cur.max(e)));
        }
    }

    (start.is_some() || end.is_some()).then_some(RolledWindow { start, end })
}

/// Recomputes the windows of `parents` in place. Returns how many changed.
pub fn apply_rollups<'p, I>(tasks: &mut [Task], parents: I, now: DateTime<Utc>) -> usize
where
    I: IntoIterator<Item = &'p TaskId>,
{
    let updates: Vec<(TaskId, RolledWindow)> = {
        let forest = Forest::new(tasks);
        parents
            .into_iter()
            .filter_map(|id| roll_up_window(&forest, id).map(|window| (id.clone(), window)))
            .collect()
    };

    let mut changed = 0;
    for (id, window) in updates {
        if let Some(task) = tasks.iter_mut().find(|task| task.id == id) {
            debug!(
                parent = %id,
                start = ?window.start,
                end = ?window.end,
                "rolled up subtask window"
            );
            task.start_time = window.start;
            task.end_time = window.end;
            task.updated_at = now;
            changed += 1;
        }
    }
    changed
}
