use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::bucket::{Bucket, SortPreference, bucketize};
use crate::datetime::LocalNow;
use crate::schedule::{LoadReport, compute_load, task_span_minutes};
use crate::task::Task;

/// Raised once per day when the current day is over-committed.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadSignal<'a> {
    pub day: NaiveDate,
    pub overload_minutes: u32,
    /// Candidates, longest planned first.
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeReading<'a> {
    pub load: LoadReport<'a>,
    pub buckets: Vec<Bucket<'a>>,
    pub signal: Option<OverloadSignal<'a>>,
}

#[derive(Debug, Clone)]
pub struct GaugeEngine {
    tz: Tz,
    signalled: HashSet<NaiveDate>,
}

impl GaugeEngine {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            signalled: HashSet::new(),
        }
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    /// Load for `target_day` plus the active (incomplete) tasks grouped by day.
    ///
    /// Merged runs are clipped to the rest of the day, so a report built here
    /// never overflows; the signal fires only for reports passed to
    /// [`GaugeEngine::raise_signal`] by the caller.
    #[tracing::instrument(skip(self, tasks, now), fields(day = %target_day))]
    pub fn evaluate<'a>(
        &mut self,
        tasks: &'a [Task],
        target_day: NaiveDate,
        now: Option<LocalNow>,
        sort: SortPreference,
    ) -> GaugeReading<'a> {
        let load = compute_load(tasks, target_day, now, &self.tz);
        let buckets = bucketize(
            tasks.iter().filter(|task| !task.is_completed),
            now.map_or(target_day, |now| now.day),
            sort,
            &self.tz,
        );
        let signal = self.raise_signal(&load, now.map(|now| now.day));

        GaugeReading {
            load,
            buckets,
            signal,
        }
    }

    /// Emits the overload signal when `load` is over-committed on `current_day`
    /// and nothing was raised for that day yet.
    pub fn raise_signal<'a>(
        &mut self,
        load: &LoadReport<'a>,
        current_day: Option<NaiveDate>,
    ) -> Option<OverloadSignal<'a>> {
        if !load.is_overloaded() || current_day != Some(load.day) {
            return None;
        }
        if !self.signalled.insert(load.day) {
            debug!(day = %load.day, "overload already signalled");
            return None;
        }

        let mut tasks = load.candidates.clone();
        tasks.sort_by_key(|task| Reverse(task_span_minutes(task)));
        info!(
            day = %load.day,
            overload_minutes = load.overload_minutes,
            tasks = tasks.len(),
            "day is over-committed"
        );
        Some(OverloadSignal {
            day: load.day,
            overload_minutes: load.overload_minutes,
            tasks,
        })
    }

    pub fn is_latched(&self, day: NaiveDate) -> bool {
        self.signalled.contains(&day)
    }

    pub fn clear_overload_latch(&mut self) {
        self.signalled.clear();
    }
}
