use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;

use crate::bucket::day_label;
use crate::config::Config;
use crate::gauge::GaugeReading;
use crate::listing::Listing;
use crate::schedule::{Interval, format_minutes, hour_steps};
use crate::task::Task;

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, listing))]
    pub fn print_listing(&mut self, listing: &Listing<'_>, show_past: bool) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_listing(&mut out, listing, show_past)
    }

    pub fn write_listing<W: Write>(
        &self,
        out: &mut W,
        listing: &Listing<'_>,
        show_past: bool,
    ) -> anyhow::Result<()> {
        if listing.sections.is_empty() {
            writeln!(out, "No open tasks.")?;
            return Ok(());
        }

        let hidden = listing.past_task_count();
        if !show_past && hidden > 0 {
            let note = format!("Past: {hidden} task(s) hidden (use --past to show)");
            writeln!(out, "{}", self.paint(&note, "2"))?;
            writeln!(out)?;
        }

        for section in &listing.sections {
            if section.past && !show_past {
                continue;
            }

            let code = if section.past { "31" } else { "1" };
            writeln!(out, "{}", self.paint(&section.label, code))?;

            let headers = vec![
                "#".to_string(),
                "ID".to_string(),
                "Time".to_string(),
                "Title".to_string(),
            ];
            let rows = section
                .rows
                .iter()
                .map(|row| {
                    let mut title = format!("{}{}", "  ".repeat(row.level), row.task.title);
                    if row.task.is_completed {
                        title = self.paint(&format!("{title} (done)"), "2");
                    } else if row.task.urgent {
                        title = format!("{title} {}", self.paint("!", "31"));
                    }
                    vec![
                        row.position.to_string(),
                        self.paint(short_id(row.task), "33"),
                        time_cell(row.task),
                        title,
                    ]
                })
                .collect();
            write_table(&mut *out, headers, rows)?;
            writeln!(out)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, reading, slot))]
    pub fn print_gauge(
        &mut self,
        reading: &GaugeReading<'_>,
        today: NaiveDate,
        slot: Option<(u32, &[&Task])>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_gauge(&mut out, reading, today, slot)
    }

    pub fn write_gauge<W: Write>(
        &self,
        out: &mut W,
        reading: &GaugeReading<'_>,
        today: NaiveDate,
        slot: Option<(u32, &[&Task])>,
    ) -> anyhow::Result<()> {
        let load = &reading.load;
        writeln!(
            out,
            "{} ({})",
            self.paint(&day_label(load.day, today), "1"),
            load.day.format("%Y-%m-%d")
        )?;

        let free = if load.free_minutes < 0 {
            self.paint(&format!("over by {}", format_minutes(load.overload_minutes)), "31")
        } else {
            format_minutes(u32::try_from(load.free_minutes).unwrap_or(0))
        };
        writeln!(
            out,
            "committed {}  free {}  from {}",
            format_minutes(load.committed_minutes),
            free,
            clock_label(load.cutoff)
        )?;

        let runs = load
            .merged_intervals
            .iter()
            .map(|iv| interval_label(*iv))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "runs      {}", if runs.is_empty() { "-" } else { &runs })?;

        let bar: String = hour_steps(&load.merged_intervals)
            .iter()
            .map(|busy| if *busy { '#' } else { '.' })
            .collect();
        writeln!(out, "0h |{bar}| 24h")?;

        if let Some(signal) = &reading.signal {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                self.paint(
                    &format!(
                        "Too much planned: {} over. Longest first:",
                        format_minutes(signal.overload_minutes)
                    ),
                    "31"
                )
            )?;
            for task in &signal.tasks {
                writeln!(out, "  {}  {}  {}", short_id(task), time_cell(task), task.title)?;
            }
        }

        if let Some((hour, tasks)) = slot {
            writeln!(out)?;
            writeln!(out, "{:02}:00-{:02}:00", hour, hour + 1)?;
            if tasks.is_empty() {
                writeln!(out, "  (nothing scheduled)")?;
            }
            for task in tasks {
                writeln!(out, "  {}  {}  {}", short_id(task), time_cell(task), task.title)?;
            }
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(task: &Task) -> &str {
    let id = task.id.as_str();
    id.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(id, |(idx, _)| &id[..idx])
}

fn time_cell(task: &Task) -> String {
    match (task.start_time, task.end_time, task.duration) {
        (Some(start), Some(end), _) => format!("{start}-{end}"),
        (Some(start), None, _) => format!("{start}-"),
        (None, Some(end), _) => format!("-{end}"),
        (None, None, Some(minutes)) if minutes > 0 => format_minutes(minutes),
        _ => String::new(),
    }
}

fn clock_label(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn interval_label(interval: Interval) -> String {
    format!("{}-{}", clock_label(interval.start), clock_label(interval.end))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let padding = width.saturating_sub(display_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn display_width(cell: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Renderer, short_id, write_table};
    use crate::bucket::SortPreference;
    use crate::datetime::LocalNow;
    use crate::forest::fixtures::task;
    use crate::gauge::GaugeEngine;
    use crate::listing::Listing;
    use crate::task::{ClockTime, Task};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid day")
    }

    fn due(mut task: Task, day: NaiveDate) -> Task {
        task.due_date = Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).expect("midnight")));
        task
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["#".to_string(), "Title".to_string()],
            vec![vec!["0".to_string(), "日本語".to_string()]],
        )
        .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Title  ");
        assert_eq!(lines[2], "0 日本語 ");
    }

    #[test]
    fn listing_collapses_past_section() {
        let old = due(task("old-task-0001", None), today().pred_opt().expect("day"));
        let mut now = due(task("now-task-0002", None), today());
        now.start_time = ClockTime::new(9, 0);
        now.end_time = ClockTime::new(10, 0);
        let sub = task("sub-task-0003", Some("now-task-0002"));
        let mut done = task("done-task-0004", Some("now-task-0002"));
        done.is_completed = true;
        let leaf = task("leaf-task-0005", Some("done-task-0004"));
        let tasks = vec![old, now, sub, done, leaf];
        let listing = Listing::build(&tasks, today(), SortPreference::Time, &chrono_tz::UTC);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_listing(&mut buf, &listing, false)
            .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Past: 1 task(s) hidden"));
        assert!(!text.contains("Yesterday"));
        assert!(text.contains("Today · Sun Oct 18"));
        assert!(text.contains("09:00-10:00"));
        assert!(text.contains("  task sub-task-0003"));
        assert!(text.contains("  task done-task-0004 (done)"));
        assert!(text.contains("    task leaf-task-0005"));

        let mut buf = Vec::new();
        Renderer::plain()
            .write_listing(&mut buf, &listing, true)
            .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Yesterday · Sat Oct 17"));
    }

    #[test]
    fn gauge_shows_runs_and_hour_bar() {
        let mut meeting = due(task("meeting", None), today());
        meeting.start_time = ClockTime::new(9, 0);
        meeting.end_time = ClockTime::new(11, 0);
        let tasks = vec![meeting];

        let mut engine = GaugeEngine::new(chrono_tz::UTC);
        let now = LocalNow {
            day: today(),
            minute: 480,
        };
        let reading = engine.evaluate(&tasks, today(), Some(now), SortPreference::Time);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_gauge(&mut buf, &reading, today(), None)
            .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Today (2026-10-18)"));
        assert!(text.contains("committed 2h  free 14h  from 08:00"));
        assert!(text.contains("runs      09:00-11:00"));
        assert!(text.contains("|.........##.............|"));
    }

    #[test]
    fn short_ids_truncate_long_uuids() {
        let mut long = task("x", None);
        long.id = "0123456789abcdef".into();
        assert_eq!(short_id(&long), "01234567");
        assert_eq!(short_id(&task("abc", None)), "abc");
    }
}
