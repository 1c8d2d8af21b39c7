//! The flattened list view: date sections, each holding its root tasks
//! with their open subtasks indented beneath.
//!
//! Row positions count every row, collapsed or not, so a position read off
//! the screen is the position handed to the move flow. A completed task
//! still shows up as a context row when an open subtask sits below it.

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::bucket::{SortPreference, bucketize, split_past};
use crate::forest::{Forest, Placement};
use crate::reparent::{DropTarget, MoveIntent};
use crate::task::{Task, TaskId};

pub const NO_DATE_KEY: &str = "no_date";

#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow<'a> {
    pub position: usize,
    pub level: usize,
    pub task: &'a Task,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingSection<'a> {
    pub key: String,
    pub label: String,
    /// `None` for the trailing undated section.
    pub day: Option<NaiveDate>,
    pub past: bool,
    pub rows: Vec<ListingRow<'a>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing<'a> {
    pub sections: Vec<ListingSection<'a>>,
}

impl<'a> Listing<'a> {
    /// Lays out the open tasks: past buckets, then today onward, then the
    /// undated roots. Roots keep their manual order among equal sort keys.
    #[tracing::instrument(skip(tasks, tz), fields(tasks = tasks.len()))]
    pub fn build(tasks: &'a [Task], today: NaiveDate, sort: SortPreference, tz: &Tz) -> Self {
        let forest = Forest::new(tasks);
        let mut roots: Vec<&'a Task> = tasks
            .iter()
            .filter(|task| forest.is_open_or_leads_to_open(task))
            .filter(|task| {
                task.parent_id
                    .as_ref()
                    .is_none_or(|parent| !forest.contains(parent))
            })
            .collect();
        roots.sort_by_key(|task| task.custom_order);

        let undated: Vec<&'a Task> = roots
            .iter()
            .copied()
            .filter(|task| task.due_date.is_none())
            .collect();
        let sections = split_past(bucketize(roots, today, sort, tz));

        let mut out = Vec::new();
        let mut position = 0;
        let mut push = |key: String, label: String, day, past, section_roots: &[&'a Task]| {
            let placements = forest.visible_ordering(section_roots.iter().map(|task| &task.id));
            let rows = placements
                .into_iter()
                .filter_map(|placement| {
                    let task = forest.get(&placement.id)?;
                    let row = ListingRow {
                        position,
                        level: placement.level,
                        task,
                    };
                    position += 1;
                    Some(row)
                })
                .collect();
            out.push(ListingSection {
                key,
                label,
                day,
                past,
                rows,
            });
        };

        for bucket in sections.past.into_iter().chain(sections.upcoming) {
            let past = bucket.is_past();
            push(bucket.key, bucket.label, Some(bucket.day), past, bucket.tasks.as_slice());
        }
        if !undated.is_empty() {
            push(NO_DATE_KEY.to_string(), "No date".to_string(), None, false, undated.as_slice());
        }

        Self { sections: out }
    }

    /// Every row as a leveled placement, in display order.
    pub fn ordering(&self) -> Vec<Placement> {
        self.rows()
            .map(|row| Placement::new(row.task.id.clone(), row.level))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &ListingRow<'a>> + '_ {
        self.sections.iter().flat_map(|section| section.rows.iter())
    }

    pub fn section_of(&self, id: &TaskId) -> Option<&ListingSection<'a>> {
        self.sections
            .iter()
            .find(|section| section.rows.iter().any(|row| &row.task.id == id))
    }

    /// Date section a top-level move lands in, when it is not the one the
    /// task is listed under now. The dropped row joins the section of the row
    /// it displaces, or of the row above it when dropped past the end.
    pub fn drop_target_for(&self, intent: &MoveIntent) -> Option<DropTarget> {
        let at = intent
            .ordering
            .iter()
            .position(|placement| placement.id == intent.task_id)?;
        if intent.ordering[at].level != 0 {
            return None;
        }

        let neighbour = intent
            .ordering
            .get(at + 1)
            .or_else(|| at.checked_sub(1).and_then(|above| intent.ordering.get(above)))?;
        let target = self.section_of(&neighbour.id)?;
        let current = self.section_of(&intent.task_id)?;
        if target.key == current.key {
            return None;
        }

        Some(match target.day {
            Some(day) => DropTarget::Day(day),
            None => DropTarget::Undated,
        })
    }

    pub fn past_task_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.past)
            .map(|section| section.rows.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::Listing;
    use crate::bucket::SortPreference;
    use crate::forest::Placement;
    use crate::forest::fixtures::task;
    use crate::reparent::{DropTarget, MoveIntent};
    use crate::task::{Task, TaskId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid day")
    }

    fn dated(id: &str, parent: Option<&str>, offset: i64) -> Task {
        let mut task = task(id, parent);
        let day = today() + Duration::days(offset);
        task.due_date = Some(Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).expect("valid")));
        task
    }

    #[test]
    fn sections_flatten_roots_with_open_subtasks() {
        let mut tasks = vec![
            dated("old", None, -3),
            dated("now", None, 0),
            task("sub", Some("now")),
            task("loose", None),
            dated("done-sub", Some("now"), 0),
        ];
        tasks[4].is_completed = true;

        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);
        let keys: Vec<&str> = listing.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["overdue_2026-10-15", "today", "no_date"]);
        assert!(listing.sections[0].past);
        assert_eq!(listing.past_task_count(), 1);

        assert_eq!(
            listing.ordering(),
            vec![
                Placement::new("old", 0),
                Placement::new("now", 0),
                Placement::new("sub", 1),
                Placement::new("loose", 0),
            ]
        );
        let positions: Vec<usize> = listing.rows().map(|row| row.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn manual_order_breaks_sort_ties() {
        let mut tasks = vec![dated("a", None, 0), dated("b", None, 0)];
        tasks[0].custom_order = 1;
        tasks[1].custom_order = 0;

        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);
        let ids: Vec<&str> = listing.rows().map(|row| row.task.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn open_subtask_of_completed_parent_stays_listed_and_movable() {
        let mut tasks = vec![dated("p", None, 0), dated("c", Some("p"), 0)];
        tasks[0].is_completed = true;

        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);
        assert_eq!(
            listing.ordering(),
            vec![Placement::new("p", 0), Placement::new("c", 1)]
        );
        assert!(MoveIntent::relocate(&listing.ordering(), &TaskId::from("c"), 0, 0).is_ok());

        tasks[1].is_completed = true;
        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);
        assert!(listing.sections.is_empty());
    }

    #[test]
    fn top_level_drop_takes_the_date_of_the_displaced_row() {
        let tasks = vec![
            dated("old", None, -3),
            dated("now", None, 0),
            task("sub", Some("now")),
            task("loose", None),
        ];
        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);
        let target = |id: &str, position, level| {
            let intent = MoveIntent::relocate(&listing.ordering(), &TaskId::from(id), position, level)
                .expect("listed task");
            listing.drop_target_for(&intent)
        };

        assert_eq!(target("loose", 1, 0), Some(DropTarget::Day(today())));
        assert_eq!(
            target("now", 0, 0),
            Some(DropTarget::Day(today() - Duration::days(3)))
        );
        assert_eq!(target("now", 10, 0), Some(DropTarget::Undated));
        assert_eq!(target("now", 1, 0), None);
        assert_eq!(target("loose", 1, 1), None);
    }
}
