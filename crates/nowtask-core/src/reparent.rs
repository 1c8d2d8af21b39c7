//! Turns a decoded drag-and-drop move into a committed collection.
//!
//! The renderer hands over the whole visible ordering as it looks after the
//! drop. The moved row's new parent is inferred from the rows above it, the
//! choice is checked by [`validate_reparent`], and every row's position
//! becomes its `custom_order`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::datetime::day_start_utc;
use crate::error::{EngineError, Rejection};
use crate::forest::{Forest, Placement};
use crate::hierarchy::{Verdict, validate_reparent};
use crate::task::{MAX_DEPTH, Task, TaskId};

/// Date section a top-level row is dropped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Day(NaiveDate),
    Undated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub task_id: TaskId,
    pub ordering: Vec<Placement>,
    pub drop_target: Option<DropTarget>,
}

impl MoveIntent {
    pub fn new(task_id: TaskId, ordering: Vec<Placement>) -> Self {
        Self {
            task_id,
            ordering,
            drop_target: None,
        }
    }

    pub fn with_drop_target(mut self, target: DropTarget) -> Self {
        self.drop_target = Some(target);
        self
    }

    /// Lifts `task_id` out of `current` and reinserts it at `position` with
    /// `level` (clamped to the allowed range), the way a drag would.
    pub fn relocate(
        current: &[Placement],
        task_id: &TaskId,
        position: usize,
        level: usize,
    ) -> Result<Self, EngineError> {
        let from = current
            .iter()
            .position(|p| &p.id == task_id)
            .ok_or_else(|| EngineError::NotInOrdering(task_id.clone()))?;

        let mut ordering = current.to_vec();
        ordering.remove(from);
        let at = position.min(ordering.len());
        ordering.insert(at, Placement::new(task_id.clone(), level.min(MAX_DEPTH)));

        Ok(Self::new(task_id.clone(), ordering))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommit {
    /// Full replacement for the collection that was passed in.
    pub tasks: Vec<Task>,
    pub task_id: TaskId,
    pub previous_parent: Option<TaskId>,
    pub new_parent: Option<TaskId>,
    /// Parent changed; rollups on both parents are stale.
    pub reparented: bool,
    pub redated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Accepted(MoveCommit),
    Rejected {
        task_id: TaskId,
        attempted_parent: Option<TaskId>,
        reason: Rejection,
    },
}

/// Infers the parent for the row at `moved_index` from the rows above it.
pub fn derive_parent(
    forest: &Forest<'_>,
    ordering: &[Placement],
    moved_index: usize,
) -> Option<TaskId> {
    let level = ordering.get(moved_index)?.level;

    for entry in ordering[..moved_index].iter().rev() {
        if entry.level == level {
            return forest.parent_of(&entry.id).cloned();
        }
        if entry.level + 1 == level {
            return Some(entry.id.clone());
        }
        if entry.level + 1 < level {
            // Dropped into a collapsed branch: climb from this row.
            let steps = level - 1 - entry.level;
            let mut cursor = Some(&entry.id);
            for _ in 0..steps {
                cursor = cursor.and_then(|id| forest.parent_of(id));
            }
            return cursor.cloned();
        }
    }

    None
}

#[tracing::instrument(skip(tasks, intent, tz, now), fields(task = %intent.task_id, rows = intent.ordering.len()))]
pub fn resolve_reparent(
    tasks: &[Task],
    intent: &MoveIntent,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<MoveOutcome, EngineError> {
    let forest = Forest::new(tasks);
    let positions = index_ordering(&forest, &intent.ordering)?;
    let moved_index = *positions
        .get(&intent.task_id)
        .ok_or_else(|| EngineError::NotInOrdering(intent.task_id.clone()))?;
    let moved = forest.require(&intent.task_id)?;

    let new_parent = derive_parent(&forest, &intent.ordering, moved_index);
    debug!(
        level = intent.ordering[moved_index].level,
        parent = ?new_parent.as_ref().map(TaskId::as_str),
        "derived parent"
    );

    if let Verdict::Rejected(reason) =
        validate_reparent(&forest, &intent.task_id, new_parent.as_ref())?
    {
        warn!(reason = reason.code(), "move rejected");
        return Ok(MoveOutcome::Rejected {
            task_id: intent.task_id.clone(),
            attempted_parent: new_parent,
            reason,
        });
    }

    let previous_parent = moved.parent_id.clone();
    let reparented = previous_parent != new_parent;
    let new_due = match intent.drop_target {
        Some(target) if intent.ordering[moved_index].level == 0 => Some(match target {
            DropTarget::Day(day) => Some(day_start_utc(day, tz)),
            DropTarget::Undated => None,
        }),
        _ => None,
    };
    let redated = new_due.is_some_and(|due| due != moved.due_date);

    let mut updated = tasks.to_vec();
    for task in &mut updated {
        if let Some(&pos) = positions.get(&task.id) {
            task.custom_order = pos as i64;
        }
        if task.id == intent.task_id {
            task.parent_id = new_parent.clone();
            if let Some(due) = new_due {
                task.due_date = due;
            }
            if reparented || redated {
                task.updated_at = now;
            }
        }
    }

    info!(reparented, redated, "move committed");
    Ok(MoveOutcome::Accepted(MoveCommit {
        tasks: updated,
        task_id: intent.task_id.clone(),
        previous_parent,
        new_parent,
        reparented,
        redated,
    }))
}

fn index_ordering(
    forest: &Forest<'_>,
    ordering: &[Placement],
) -> Result<HashMap<TaskId, usize>, EngineError> {
    let mut seen = HashSet::with_capacity(ordering.len());
    let mut positions = HashMap::with_capacity(ordering.len());
    for (pos, entry) in ordering.iter().enumerate() {
        forest.require(&entry.id)?;
        if !seen.insert(&entry.id) {
            return Err(EngineError::DuplicateEntry(entry.id.clone()));
        }
        positions.insert(entry.id.clone(), pos);
    }
    Ok(positions)
}
