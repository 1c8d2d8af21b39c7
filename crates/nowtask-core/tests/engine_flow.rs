use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nowtask_core::bucket::SortPreference;
use nowtask_core::commands::{NewTask, create_task};
use nowtask_core::datetime::{LocalNow, day_start_utc};
use nowtask_core::forest::Placement;
use nowtask_core::gauge::GaugeEngine;
use nowtask_core::listing::Listing;
use nowtask_core::reparent::{MoveIntent, MoveOutcome, resolve_reparent};
use nowtask_core::store::{CollectionStore, JsonlStore, TASKS_KEY};
use nowtask_core::task::{ClockTime, Task};
use nowtask_core::{Rejection, TaskId};
use tempfile::tempdir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0)
        .single()
        .expect("valid time")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid day")
}

fn add(tasks: &mut Vec<Task>, draft: NewTask) -> TaskId {
    let task = create_task(tasks, draft, now()).expect("create task");
    let id = task.id.clone();
    tasks.push(task);
    id
}

fn windowed(title: &str, start: (u8, u8), end: (u8, u8)) -> NewTask {
    NewTask {
        title: title.to_string(),
        due_date: Some(day_start_utc(today(), &chrono_tz::UTC)),
        start_time: ClockTime::new(start.0, start.1),
        end_time: ClockTime::new(end.0, end.1),
        ..NewTask::default()
    }
}

#[test]
fn store_list_move_and_gauge() {
    let temp = tempdir().expect("tempdir");
    let store = JsonlStore::open(temp.path()).expect("open store");
    let tz = chrono_tz::UTC;

    let mut tasks = Vec::new();
    let plan = add(&mut tasks, windowed("Plan sprint", (9, 0), (10, 0)));
    let write = add(&mut tasks, windowed("Write notes", (9, 30), (11, 0)));
    let later = add(
        &mut tasks,
        NewTask {
            title: "Someday".to_string(),
            ..NewTask::default()
        },
    );
    store.set(TASKS_KEY, &tasks).expect("save");

    let loaded = store.get(TASKS_KEY).expect("load");
    assert_eq!(loaded, tasks);

    let reading = GaugeEngine::new(tz).evaluate(
        &loaded,
        today(),
        Some(LocalNow::at(now(), &tz)),
        SortPreference::Time,
    );
    assert_eq!(reading.load.committed_minutes, 120);
    assert_eq!(reading.load.free_minutes, 1440 - 480 - 120);
    assert!(reading.signal.is_none());

    let listing = Listing::build(&loaded, today(), SortPreference::Time, &tz);
    assert_eq!(
        listing.ordering(),
        vec![
            Placement::new(plan.clone(), 0),
            Placement::new(write.clone(), 0),
            Placement::new(later.clone(), 0),
        ]
    );

    let intent = MoveIntent::relocate(&listing.ordering(), &write, 1, 1).expect("relocate");
    let commit = match resolve_reparent(&loaded, &intent, &tz, now()).expect("resolve") {
        MoveOutcome::Accepted(commit) => commit,
        other => panic!("expected acceptance, got {other:?}"),
    };
    assert!(commit.reparented);
    assert_eq!(commit.new_parent.as_ref(), Some(&plan));
    store.set(TASKS_KEY, &commit.tasks).expect("save move");

    let reloaded = store.get(TASKS_KEY).expect("reload");
    let listing = Listing::build(&reloaded, today(), SortPreference::Time, &tz);
    let levels: Vec<(&str, usize)> = listing
        .rows()
        .map(|row| (row.task.title.as_str(), row.level))
        .collect();
    assert_eq!(
        levels,
        vec![("Plan sprint", 0), ("Write notes", 1), ("Someday", 0)]
    );

    let written = std::fs::read_to_string(store.path_for(TASKS_KEY).expect("path"))
        .expect("read jsonl");
    assert_eq!(written.lines().count(), 3);
}

#[test]
fn moves_that_break_the_hierarchy_are_refused() {
    let mut tasks = Vec::new();
    let mut parent = None;
    let mut chain = Vec::new();
    for title in ["a", "b", "c", "d"] {
        let id = add(
            &mut tasks,
            NewTask {
                title: title.to_string(),
                parent: parent.clone(),
                ..NewTask::default()
            },
        );
        chain.push(id.clone());
        parent = Some(id);
    }
    let x = add(
        &mut tasks,
        NewTask {
            title: "x".to_string(),
            ..NewTask::default()
        },
    );
    let y = add(
        &mut tasks,
        NewTask {
            title: "y".to_string(),
            parent: Some(x.clone()),
            ..NewTask::default()
        },
    );

    let mut ordering: Vec<Placement> = chain
        .iter()
        .enumerate()
        .map(|(level, id)| Placement::new(id.clone(), level))
        .collect();
    ordering.push(Placement::new(x.clone(), 4));
    ordering.push(Placement::new(y.clone(), 5));

    let intent = MoveIntent::new(x.clone(), ordering);
    match resolve_reparent(&tasks, &intent, &chrono_tz::UTC, now()).expect("resolve") {
        MoveOutcome::Rejected {
            task_id,
            attempted_parent,
            reason,
        } => {
            assert_eq!(task_id, x);
            assert_eq!(attempted_parent.as_ref(), chain.last());
            assert_eq!(
                reason,
                Rejection::DepthExceeded {
                    parent_depth: 3,
                    required: 5,
                    max: 4,
                }
            );
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let deepest = add(
        &mut tasks,
        NewTask {
            title: "leaf".to_string(),
            parent: chain.last().cloned(),
            ..NewTask::default()
        },
    );
    let too_deep = NewTask {
        title: "below leaf".to_string(),
        parent: Some(deepest),
        ..NewTask::default()
    };
    assert!(create_task(&tasks, too_deep, now()).is_err());
}
